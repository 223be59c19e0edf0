// Write-ahead logging and recovery

pub mod log_iterator;
pub mod log_manager;
pub mod log_record;
pub mod recovery;

pub use log_iterator::{LogIterator, ScanDirection};
pub use log_manager::{LogManager, LogManagerConfig, LogManagerError, Result, LOG_HEADER_SIZE};
pub use log_record::{LogPayload, LogRecord, LogRecordError, LogRecordType};
pub use recovery::{RecoveryError, RecoveryManager, RecoveryReport};
