use super::value::DataType;

/// Field definition: a name plus a fixed-width type
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
}

impl FieldDef {
    /// Create a new field definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Get the size of this field in bytes
    pub fn size(&self) -> usize {
        self.data_type.size()
    }
}

/// Ordered field layout of one table's tuples. Per-field byte widths are
/// fixed, so the total tuple width is a constant derived once.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDesc {
    fields: Vec<FieldDef>,
    tuple_size: usize,
}

impl TupleDesc {
    /// Create a new tuple descriptor
    pub fn new(fields: Vec<FieldDef>) -> Self {
        let tuple_size = fields.iter().map(|f| f.size()).sum();
        Self { fields, tuple_size }
    }

    /// Get all fields
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Get field count
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Get a specific field; `None` if the index is out of range
    pub fn field(&self, idx: usize) -> Option<&FieldDef> {
        self.fields.get(idx)
    }

    /// Find field index by name
    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Get total tuple size in bytes
    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    /// Get the byte offset of a field within a serialized tuple
    pub fn field_offset(&self, field_idx: usize) -> usize {
        self.fields[..field_idx].iter().map(|f| f.size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_desc() -> TupleDesc {
        TupleDesc::new(vec![
            FieldDef::new("id", DataType::Int),
            FieldDef::new("name", DataType::Char(20)),
            FieldDef::new("score", DataType::Float),
        ])
    }

    #[test]
    fn test_desc_creation() {
        let desc = create_test_desc();
        assert_eq!(desc.field_count(), 3);
        assert_eq!(desc.tuple_size(), 4 + 20 + 8);
    }

    #[test]
    fn test_field_offset() {
        let desc = create_test_desc();
        assert_eq!(desc.field_offset(0), 0);
        assert_eq!(desc.field_offset(1), 4);
        assert_eq!(desc.field_offset(2), 4 + 20);
    }

    #[test]
    fn test_find_field() {
        let desc = create_test_desc();
        assert_eq!(desc.find_field("id"), Some(0));
        assert_eq!(desc.find_field("name"), Some(1));
        assert_eq!(desc.find_field("score"), Some(2));
        assert_eq!(desc.find_field("nonexistent"), None);
    }

    #[test]
    fn test_field_index_out_of_range() {
        let desc = create_test_desc();
        assert!(desc.field(2).is_some());
        assert!(desc.field(3).is_none());
    }
}
