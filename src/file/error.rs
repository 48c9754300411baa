use std::io;
use thiserror::Error;

use super::{PageId, TableId};
use crate::tx::LockError;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Buffer pool is full: every cached page is dirty")]
    BufferPoolFull,

    #[error("Unknown table: table_id={0}")]
    UnknownTable(TableId),

    #[error(transparent)]
    Lock(#[from] LockError),
}

pub type FileResult<T> = Result<T, FileError>;
