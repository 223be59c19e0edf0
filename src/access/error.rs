use thiserror::Error;

use crate::common::types::TransactionId;
use crate::storage::buffer::BufferPoolError;
use crate::transaction::concurrency::LockError;
use crate::transaction::wal::{LogManagerError, RecoveryError};

#[derive(Error, Debug)]
pub enum AccessError {
    /// The transaction lost a deadlock and must be retried from the start
    #[error("Transaction {0} aborted")]
    TransactionAborted(TransactionId),

    #[error("Transaction {0} is not active")]
    UnknownTransaction(TransactionId),

    #[error("Lock error: {0}")]
    LockError(LockError),

    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),

    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),

    #[error("Recovery error: {0}")]
    RecoveryError(#[from] RecoveryError),
}

impl From<LockError> for AccessError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Deadlock(tid) => AccessError::TransactionAborted(tid),
            other => AccessError::LockError(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
