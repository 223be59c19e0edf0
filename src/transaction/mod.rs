// Transaction support: locking, logging and recovery

pub mod concurrency;
pub mod wal;

// Public exports
pub use concurrency::{LockError, LockManager};
pub use wal::log_manager::LogManager;
pub use wal::log_record::{LogRecord, LogRecordType};
pub use wal::recovery::RecoveryManager;
