pub mod catalog;
pub mod file;
pub mod record;
pub mod tx;

pub use catalog::Catalog;
pub use file::{
    BUFFER_POOL_SIZE, BufferManager, FileError, FileResult, PAGE_SIZE, PageHandle, PageId, TableId,
};
pub use record::{
    DataType, FieldDef, HeapFile, HeapFileIterator, HeapPage, RecordError, RecordId, RecordResult,
    SlotId, Tuple, TupleDesc, Value,
};
pub use tx::{LockError, LockManager, Permission, TransactionId};
