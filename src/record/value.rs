use super::error::{RecordError, RecordResult};

/// Represents a field data type with a fixed byte width
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Int,         // 4 bytes
    Float,       // 8 bytes
    Char(usize), // n bytes (fixed length)
}

impl DataType {
    /// Get the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Float => 8,
            DataType::Char(n) => *n,
        }
    }
}

/// Represents a single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    String(String),
}

impl Value {
    /// Serialize value to bytes
    /// For String, the value is padded with zeros to the fixed length
    pub fn serialize(&self, data_type: &DataType) -> RecordResult<Vec<u8>> {
        match (self, data_type) {
            (Value::Int(i), DataType::Int) => Ok(i.to_le_bytes().to_vec()),
            (Value::Float(f), DataType::Float) => Ok(f.to_le_bytes().to_vec()),
            (Value::String(s), DataType::Char(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len {
                    return Err(RecordError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        bytes.len(),
                        max_len
                    )));
                }
                let mut result = vec![0u8; *max_len];
                result[..bytes.len()].copy_from_slice(bytes);
                Ok(result)
            }
            _ => Err(RecordError::TypeMismatch {
                expected: format!("{:?}", data_type),
                actual: format!("{:?}", self),
            }),
        }
    }

    /// Deserialize value from bytes
    pub fn deserialize(bytes: &[u8], data_type: &DataType) -> RecordResult<Self> {
        match data_type {
            DataType::Int => {
                if bytes.len() != 4 {
                    return Err(RecordError::Deserialization(format!(
                        "Expected 4 bytes for INT, got {}",
                        bytes.len()
                    )));
                }
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Value::Int(i32::from_le_bytes(buf)))
            }
            DataType::Float => {
                if bytes.len() != 8 {
                    return Err(RecordError::Deserialization(format!(
                        "Expected 8 bytes for FLOAT, got {}",
                        bytes.len()
                    )));
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Ok(Value::Float(f64::from_le_bytes(buf)))
            }
            DataType::Char(max_len) => {
                if bytes.len() != *max_len {
                    return Err(RecordError::Deserialization(format!(
                        "Expected {} bytes for CHAR({}), got {}",
                        max_len,
                        max_len,
                        bytes.len()
                    )));
                }
                // Find the first null byte (string terminator)
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s = String::from_utf8(bytes[..end].to_vec())
                    .map_err(|e| RecordError::Deserialization(format!("Invalid UTF-8: {}", e)))?;
                Ok(Value::String(s))
            }
        }
    }
}
