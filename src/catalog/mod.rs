use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::file::TableId;
use crate::record::{HeapFile, TupleDesc};

struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
}

/// Registry of the tables known to the engine, keyed by table id. The
/// buffer pool resolves a PageId to its backing heap file through here.
#[derive(Default)]
pub struct Catalog {
    tables: Mutex<AHashMap<TableId, TableEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table under a name. Re-adding a name replaces nothing;
    /// each heap file carries its own unique id.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        let id = file.id();
        self.tables.lock().insert(
            id,
            TableEntry {
                file,
                name: name.to_string(),
            },
        );
    }

    /// Look up a table's heap file by id
    pub fn table(&self, id: TableId) -> Option<Arc<HeapFile>> {
        self.tables.lock().get(&id).map(|e| e.file.clone())
    }

    /// Look up a table's tuple layout by id
    pub fn tuple_desc(&self, id: TableId) -> Option<TupleDesc> {
        self.tables
            .lock()
            .get(&id)
            .map(|e| e.file.tuple_desc().clone())
    }

    /// Find a table id by name
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables
            .lock()
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| *id)
    }

    /// Look up a table's name by id
    pub fn table_name(&self, id: TableId) -> Option<String> {
        self.tables.lock().get(&id).map(|e| e.name.clone())
    }

    /// Ids of every registered table
    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.lock().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, FieldDef};
    use tempfile::TempDir;

    fn test_file(dir: &TempDir, name: &str) -> Arc<HeapFile> {
        let desc = TupleDesc::new(vec![FieldDef::new("id", DataType::Int)]);
        Arc::new(HeapFile::open(dir.path().join(name), desc).unwrap())
    }

    #[test]
    fn test_add_and_lookup() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new();
        let file = test_file(&dir, "users.dat");
        let id = file.id();

        catalog.add_table(file, "users");

        assert!(catalog.table(id).is_some());
        assert_eq!(catalog.table_id("users"), Some(id));
        assert_eq!(catalog.table_name(id), Some("users".to_string()));
        assert_eq!(catalog.tuple_desc(id).unwrap().field_count(), 1);
    }

    #[test]
    fn test_unknown_table() {
        let catalog = Catalog::new();
        assert!(catalog.table(999).is_none());
        assert!(catalog.table_id("nope").is_none());
        assert!(catalog.tuple_desc(999).is_none());
    }

    #[test]
    fn test_multiple_tables() {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::new();
        let a = test_file(&dir, "a.dat");
        let b = test_file(&dir, "b.dat");
        let (a_id, b_id) = (a.id(), b.id());

        catalog.add_table(a, "a");
        catalog.add_table(b, "b");

        assert_eq!(catalog.table_ids().len(), 2);
        assert_ne!(catalog.table_id("a"), catalog.table_id("b"));
        assert_eq!(catalog.table_id("a"), Some(a_id));
        assert_eq!(catalog.table_id("b"), Some(b_id));
    }
}
