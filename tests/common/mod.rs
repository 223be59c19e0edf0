#![allow(dead_code)]

pub mod schedule;

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use anyhow::Result;

use pagecore::storage::buffer::BufferManager;
use pagecore::storage::disk::{DiskManager, DiskManagerError, FileDiskManager};
use pagecore::transaction::wal::{LogManager, LogManagerConfig};
use pagecore::{Database, EngineConfig, Page, PageId};

/// Small pages keep the log and the table files readable in failures
pub const TEST_PAGE_SIZE: usize = 256;

// Create a buffer pool over a temporary directory, without a log
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferManager>, Arc<FileDiskManager>, TempDir)> {
    let dir = TempDir::new()?;
    let disk = Arc::new(FileDiskManager::new(dir.path(), TEST_PAGE_SIZE)?);
    let buffer_pool = Arc::new(BufferManager::new(pool_size, disk.clone()));
    Ok((buffer_pool, disk, dir))
}

// Create a log manager writing to a temporary directory
pub fn create_test_log_manager() -> Result<(Arc<LogManager>, TempDir)> {
    let dir = TempDir::new()?;
    let log_manager = open_test_log_manager(dir.path())?;
    Ok((log_manager, dir))
}

pub fn open_test_log_manager(dir: &Path) -> Result<Arc<LogManager>> {
    let config = LogManagerConfig {
        log_path: dir.join("test.wal"),
        sync_on_force: false, // No need to sync for tests
    };
    Ok(Arc::new(LogManager::open(config)?))
}

pub fn test_config(dir: &Path, pool_size: usize) -> EngineConfig {
    EngineConfig {
        page_size: TEST_PAGE_SIZE,
        buffer_pool_size: pool_size,
        sync_log: false,
        ..EngineConfig::with_data_dir(dir)
    }
}

// Open (and recover) a database stored in `dir`
pub fn open_test_database(dir: &Path, pool_size: usize) -> Result<Database> {
    Ok(Database::open(test_config(dir, pool_size))?)
}

// Allocate pages 0..count of a table
pub fn allocate_pages(disk: &dyn DiskManager, table_id: u32, count: u32) -> Result<Vec<PageId>> {
    let mut pids = Vec::new();
    for page_no in 0..count {
        let pid = PageId::new(table_id, page_no);
        disk.allocate_page(pid)?;
        pids.push(pid);
    }
    Ok(pids)
}

// Generate test data of specified size
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// File-backed disk manager whose writes can be switched to fail
pub struct FlakyDiskManager {
    inner: FileDiskManager,
    fail_writes: AtomicBool,
}

impl FlakyDiskManager {
    pub fn new(dir: &Path) -> Result<Self> {
        Ok(Self {
            inner: FileDiskManager::new(dir, TEST_PAGE_SIZE)?,
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DiskManager for FlakyDiskManager {
    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn read_page(&self, pid: PageId) -> std::result::Result<Page, DiskManagerError> {
        self.inner.read_page(pid)
    }

    fn write_page(&self, page: &Page) -> std::result::Result<(), DiskManagerError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure").into());
        }
        self.inner.write_page(page)
    }

    fn allocate_page(&self, pid: PageId) -> std::result::Result<(), DiskManagerError> {
        self.inner.allocate_page(pid)
    }
}
