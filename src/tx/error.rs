use thiserror::Error;

use super::TransactionId;
use crate::file::{PageId, TableId};

/// Errors raised by the lock manager. Every variant is the
/// transaction-abort signal: the requesting transaction cannot make
/// progress and its caller must abort it.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("transaction {tid} timed out waiting for a lock on {pid}")]
    PageWaitTimeout { tid: TransactionId, pid: PageId },

    #[error("transaction {tid} timed out waiting for the file lock on table {table_id}")]
    FileWaitTimeout { tid: TransactionId, table_id: TableId },
}
