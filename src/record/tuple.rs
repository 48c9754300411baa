use super::error::{RecordError, RecordResult};
use super::schema::TupleDesc;
use super::value::Value;
use crate::file::PageId;

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical identity of a stored tuple (owning page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }
}

/// A single tuple (row) with typed values. Once stored, the tuple carries
/// the record id assigned by its owning page.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Create a new, unstored tuple
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            record_id: None,
        }
    }

    /// Get the number of values
    pub fn field_count(&self) -> usize {
        self.values.len()
    }

    /// Get a value by index; `None` if the index is out of range
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Set a value by index
    pub fn set(&mut self, idx: usize, value: Value) {
        if idx < self.values.len() {
            self.values[idx] = value;
        }
    }

    /// Where this tuple is stored, if it is stored
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Serialize the tuple to its fixed-width byte layout
    /// Format: [field0 data] [field1 data] ...
    pub fn serialize(&self, desc: &TupleDesc) -> RecordResult<Vec<u8>> {
        if self.values.len() != desc.field_count() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} fields, got {}",
                desc.field_count(),
                self.values.len()
            )));
        }

        let mut result = Vec::with_capacity(desc.tuple_size());
        for (value, field) in self.values.iter().zip(desc.fields()) {
            let bytes = value.serialize(&field.data_type)?;
            result.extend_from_slice(&bytes);
        }
        Ok(result)
    }

    /// Deserialize a tuple from its fixed-width byte layout
    pub fn deserialize(data: &[u8], desc: &TupleDesc) -> RecordResult<Self> {
        if data.len() != desc.tuple_size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes, got {}",
                desc.tuple_size(),
                data.len()
            )));
        }

        let mut offset = 0;
        let mut values = Vec::with_capacity(desc.field_count());
        for field in desc.fields() {
            let size = field.size();
            let value = Value::deserialize(&data[offset..offset + size], &field.data_type)?;
            values.push(value);
            offset += size;
        }

        Ok(Self {
            values,
            record_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, FieldDef};

    fn create_test_desc() -> TupleDesc {
        TupleDesc::new(vec![
            FieldDef::new("id", DataType::Int),
            FieldDef::new("name", DataType::Char(10)),
            FieldDef::new("score", DataType::Float),
        ])
    }

    #[test]
    fn test_tuple_creation() {
        let tuple = Tuple::new(vec![
            Value::Int(1),
            Value::String("Alice".to_string()),
            Value::Float(95.5),
        ]);
        assert_eq!(tuple.field_count(), 3);
        assert_eq!(tuple.get(0), Some(&Value::Int(1)));
        assert_eq!(tuple.get(1), Some(&Value::String("Alice".to_string())));
        assert_eq!(tuple.get(2), Some(&Value::Float(95.5)));
        assert_eq!(tuple.get(3), None);
        assert_eq!(tuple.record_id(), None);
    }

    #[test]
    fn test_tuple_round_trip() {
        let desc = create_test_desc();
        let original = Tuple::new(vec![
            Value::Int(123),
            Value::String("hello".to_string()),
            Value::Float(99.9),
        ]);

        let bytes = original.serialize(&desc).unwrap();
        assert_eq!(bytes.len(), desc.tuple_size());

        let restored = Tuple::deserialize(&bytes, &desc).unwrap();
        assert_eq!(original.values(), restored.values());
    }

    #[test]
    fn test_tuple_field_count_mismatch() {
        let desc = create_test_desc();
        let tuple = Tuple::new(vec![Value::Int(1), Value::String("x".to_string())]);
        assert!(tuple.serialize(&desc).is_err());
    }

    #[test]
    fn test_tuple_type_mismatch() {
        let desc = create_test_desc();
        let tuple = Tuple::new(vec![
            Value::String("not_an_int".to_string()),
            Value::String("Alice".to_string()),
            Value::Float(95.5),
        ]);
        assert!(tuple.serialize(&desc).is_err());
    }
}
