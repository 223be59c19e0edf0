use std::sync::Arc;
use log::info;
use thiserror::Error;

use crate::access::{AccessError, AccessManager};
use crate::common::config::EngineConfig;
use crate::storage::buffer::BufferManager;
use crate::storage::disk::{DiskManagerError, FileDiskManager};
use crate::transaction::concurrency::LockManager;
use crate::transaction::wal::{LogManager, LogManagerError, RecoveryError, RecoveryManager, RecoveryReport};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Disk manager error: {0}")]
    DiskManagerError(#[from] DiskManagerError),

    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),

    #[error("Recovery failed: {0}")]
    RecoveryError(#[from] RecoveryError),

    #[error("Access manager error: {0}")]
    AccessError(#[from] AccessError),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// One database instance: every component, wired together explicitly.
///
/// Opening runs crash recovery before any transaction can start.
pub struct Database {
    config: EngineConfig,
    disk_manager: Arc<FileDiskManager>,
    buffer_pool: Arc<BufferManager>,
    lock_manager: Arc<LockManager>,
    log_manager: Arc<LogManager>,
    access_manager: AccessManager,
    recovery_report: RecoveryReport,
}

impl Database {
    pub fn open(config: EngineConfig) -> Result<Self> {
        let disk_manager = Arc::new(FileDiskManager::new(&config.data_dir, config.page_size)?);
        let log_manager = Arc::new(LogManager::open(config.log_config())?);

        let buffer_pool = Arc::new(BufferManager::new_with_wal(
            config.buffer_pool_size,
            disk_manager.clone(),
            log_manager.clone(),
        ));
        buffer_pool.evict_dirty(config.evict_dirty);

        let recovery_report = RecoveryManager::new(log_manager.clone(), buffer_pool.clone()).recover()?;

        let lock_manager = Arc::new(LockManager::new());
        let access_manager = AccessManager::new(
            buffer_pool.clone(),
            lock_manager.clone(),
            log_manager.clone(),
        )?;
        access_manager.set_force(config.force_policy);

        info!(
            "Opened database at {} ({} losers rolled back)",
            config.data_dir.display(),
            recovery_report.losers.len()
        );

        Ok(Self {
            config,
            disk_manager,
            buffer_pool,
            lock_manager,
            log_manager,
            access_manager,
            recovery_report,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn access_manager(&self) -> &AccessManager {
        &self.access_manager
    }

    pub fn buffer_pool(&self) -> &Arc<BufferManager> {
        &self.buffer_pool
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn disk_manager(&self) -> &Arc<FileDiskManager> {
        &self.disk_manager
    }

    /// What crash recovery did when this instance was opened
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery_report
    }
}
