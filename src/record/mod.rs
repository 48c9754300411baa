mod error;
mod heap_file;
mod page;
mod schema;
mod tuple;
mod value;

pub use error::{RecordError, RecordResult};
pub use heap_file::{HeapFile, HeapFileIterator};
pub use page::HeapPage;
pub use schema::{FieldDef, TupleDesc};
pub use tuple::{RecordId, SlotId, Tuple};
pub use value::{DataType, Value};
