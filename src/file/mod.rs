mod buffer_manager;
mod error;

pub use buffer_manager::{BufferManager, PageHandle};
pub use error::{FileError, FileResult};

use std::fmt;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages in the buffer pool
pub const BUFFER_POOL_SIZE: usize = 50;

/// Table identifier
pub type TableId = u32;

/// Identifies one page by the table it belongs to and its position within
/// that table's backing file. Used as both the cache key and the lock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: usize) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {} page {}", self.table_id, self.page_no)
    }
}
