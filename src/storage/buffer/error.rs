use thiserror::Error;
use crate::common::types::PageId;
use crate::storage::disk::DiskManagerError;
use crate::transaction::wal::log_manager::LogManagerError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("Page {0} not found in buffer pool")]
    PageNotFound(PageId),
    #[error("Page {0} is not pinned")]
    PageNotPinned(PageId),
    #[error("No unpinned page available for eviction")]
    NoEvictableFrame,
    #[error("All unpinned pages are dirty and dirty eviction is disabled")]
    AllUnpinnedPagesDirty,
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),
    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),
}

pub type Result<T> = std::result::Result<T, BufferPoolError>;
