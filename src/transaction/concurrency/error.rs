use thiserror::Error;
use crate::common::types::{PageId, TransactionId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Transaction {tid} does not hold a lock on page {pid}")]
    LockNotHeld { tid: TransactionId, pid: PageId },

    #[error("Deadlock detected, transaction {0} aborted")]
    Deadlock(TransactionId),
}

pub type Result<T> = std::result::Result<T, LockError>;
