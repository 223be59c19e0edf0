use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Page, PageId};

#[derive(Error, Debug)]
pub enum DiskManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Page {0} has not been allocated")]
    PageNotAllocated(PageId),
    #[error("Page {pid} has {actual} bytes, expected {expected}")]
    PageSizeMismatch {
        pid: PageId,
        expected: usize,
        actual: usize,
    },
}

/// Block storage keyed by page id. Implementations must be reliable and synchronous:
/// a `write_page` that returns `Ok` is on stable storage.
pub trait DiskManager: Send + Sync {
    /// Size in bytes of every page handled by this manager
    fn page_size(&self) -> usize;

    /// Read a page from disk
    fn read_page(&self, pid: PageId) -> Result<Page, DiskManagerError>;

    /// Write a page to disk
    fn write_page(&self, page: &Page) -> Result<(), DiskManagerError>;

    /// Make `pid` readable, zero-filling it (and any gap before it) if needed
    fn allocate_page(&self, pid: PageId) -> Result<(), DiskManagerError>;
}

/// DiskManager storing each table in its own file inside a directory
pub struct FileDiskManager {
    data_dir: PathBuf,
    page_size: usize,
    files: Mutex<HashMap<u32, File>>,
}

impl FileDiskManager {
    /// Create a new FileDiskManager rooted at `data_dir`
    pub fn new(data_dir: impl AsRef<Path>, page_size: usize) -> Result<Self, DiskManagerError> {
        std::fs::create_dir_all(data_dir.as_ref())?;

        Ok(Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            page_size,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Number of allocated pages in a table
    pub fn num_pages(&self, table_id: u32) -> Result<u32, DiskManagerError> {
        let mut files = self.files.lock();
        let file = self.table_file(&mut files, table_id)?;
        let len = file.metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    pub fn table_path(&self, table_id: u32) -> PathBuf {
        self.data_dir.join(format!("table_{}.dat", table_id))
    }

    fn table_file<'a>(
        &self,
        files: &'a mut HashMap<u32, File>,
        table_id: u32,
    ) -> Result<&'a mut File, DiskManagerError> {
        if !files.contains_key(&table_id) {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(self.table_path(table_id))?;
            files.insert(table_id, file);
        }
        // the entry was inserted above if it was missing
        files
            .get_mut(&table_id)
            .ok_or_else(|| DiskManagerError::IoError(std::io::Error::other("table file vanished")))
    }

    /// Calculate the offset of a page in its table file
    fn page_offset(&self, pid: PageId) -> u64 {
        pid.page_no as u64 * self.page_size as u64
    }
}

impl DiskManager for FileDiskManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn read_page(&self, pid: PageId) -> Result<Page, DiskManagerError> {
        let offset = self.page_offset(pid);
        let mut buffer = vec![0u8; self.page_size];

        {
            let mut files = self.files.lock();
            let file = self.table_file(&mut files, pid.table_id)?;

            let file_size = file.metadata()?.len();
            if offset + self.page_size as u64 > file_size {
                return Err(DiskManagerError::PageNotAllocated(pid));
            }

            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
        }

        Ok(Page::from_bytes(pid, buffer))
    }

    fn write_page(&self, page: &Page) -> Result<(), DiskManagerError> {
        if page.page_size() != self.page_size {
            return Err(DiskManagerError::PageSizeMismatch {
                pid: page.id(),
                expected: self.page_size,
                actual: page.page_size(),
            });
        }

        let offset = self.page_offset(page.id());

        let mut files = self.files.lock();
        let file = self.table_file(&mut files, page.id().table_id)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        file.sync_data()?;

        Ok(())
    }

    fn allocate_page(&self, pid: PageId) -> Result<(), DiskManagerError> {
        let required = self.page_offset(pid) + self.page_size as u64;

        let mut files = self.files.lock();
        let file = self.table_file(&mut files, pid.table_id)?;
        if file.metadata()?.len() < required {
            // set_len zero-fills the extension
            file.set_len(required)?;
            file.sync_all()?;
        }

        Ok(())
    }
}
