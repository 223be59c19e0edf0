use std::path::PathBuf;

use crate::common::types::DEFAULT_PAGE_SIZE;
use crate::transaction::wal::log_manager::LogManagerConfig;

/// Default number of frames in the buffer pool
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64;

/// Configuration for a database instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the table files and the log
    pub data_dir: PathBuf,

    /// Size of every page in bytes
    pub page_size: usize,

    /// Maximum number of pages cached at once
    pub buffer_pool_size: usize,

    /// Flush a transaction's dirty pages when it commits
    pub force_policy: bool,

    /// Whether dirty pages may be chosen as eviction victims
    pub evict_dirty: bool,

    /// File name of the write-ahead log inside `data_dir`
    pub log_file_name: String,

    /// Whether to fsync the log every time it is forced
    pub sync_log: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_size: DEFAULT_BUFFER_POOL_SIZE,
            force_policy: true,
            evict_dirty: false,
            log_file_name: "pagecore.wal".to_string(),
            sync_log: true,
        }
    }
}

impl EngineConfig {
    /// Default configuration rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file_name)
    }

    /// Log manager settings derived from this configuration
    pub fn log_config(&self) -> LogManagerConfig {
        LogManagerConfig {
            log_path: self.log_path(),
            sync_on_force: self.sync_log,
        }
    }
}
