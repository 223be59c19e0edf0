// PageCore: buffer cache, page locking and write-ahead logging for a page-based storage engine

pub mod access;
pub mod common;
pub mod database;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use access::{AccessError, AccessManager};
pub use common::{EngineConfig, Page, PageId, PagePtr, Permissions, TransactionId};
pub use database::{Database, DatabaseError};
pub use storage::buffer::BufferManager;
pub use storage::buffer::BufferPoolError;
pub use storage::disk::{DiskManager, FileDiskManager};
pub use storage::page::PageManager;
pub use storage::page::PageError;
pub use transaction::concurrency::{LockError, LockManager};
pub use transaction::wal::{LogManager, RecoveryManager};
