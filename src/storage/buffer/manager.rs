use std::collections::HashMap;
use std::sync::Arc;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::common::types::{FrameId, Page, PageId, PagePtr};
use crate::storage::buffer::error::{BufferPoolError, Result};
use crate::storage::buffer::replacer::LRUReplacer;
use crate::storage::disk::DiskManager;
use crate::transaction::wal::log_manager::LogManager;

mod frame_management;

use frame_management::allocate_frame;

/// A cache slot owning one page
pub(crate) struct Frame {
    pub(crate) page: PagePtr,
    pub(crate) pin_count: u32,
    pub(crate) is_dirty: bool,
}

/// Everything guarded by the buffer manager's single mutex: the page table,
/// the frame arena and the eviction order are always updated together.
pub(crate) struct BufferState {
    pub(crate) page_table: HashMap<PageId, FrameId>,
    pub(crate) frames: Vec<Option<Frame>>,
    pub(crate) free_list: Vec<FrameId>,
    pub(crate) replacer: LRUReplacer,
    pub(crate) evict_dirty: bool,
}

impl BufferState {
    fn frame(&self, page_id: PageId) -> Option<&Frame> {
        let frame_id = *self.page_table.get(&page_id)?;
        self.frames[frame_id as usize].as_ref()
    }

    fn frame_mut(&mut self, page_id: PageId) -> Option<(FrameId, &mut Frame)> {
        let frame_id = *self.page_table.get(&page_id)?;
        self.frames[frame_id as usize]
            .as_mut()
            .map(|frame| (frame_id, frame))
    }
}

/// Fixed-capacity page cache. The only component that reads or writes pages on disk.
pub struct BufferManager {
    pool_size: usize,
    state: Mutex<BufferState>,
    disk_manager: Arc<dyn DiskManager>,
    log_manager: Option<Arc<LogManager>>,
}

impl BufferManager {
    pub fn new(pool_size: usize, disk_manager: Arc<dyn DiskManager>) -> Self {
        // frames are handed out from the back of the free list
        let free_list = (0..pool_size as FrameId).rev().collect();
        let frames = (0..pool_size).map(|_| None).collect();

        Self {
            pool_size,
            state: Mutex::new(BufferState {
                page_table: HashMap::with_capacity(pool_size),
                frames,
                free_list,
                replacer: LRUReplacer::new(pool_size),
                evict_dirty: false,
            }),
            disk_manager,
            log_manager: None,
        }
    }

    /// Create a buffer manager that forces the log before any dirty page reaches disk
    pub fn new_with_wal(
        pool_size: usize,
        disk_manager: Arc<dyn DiskManager>,
        log_manager: Arc<LogManager>,
    ) -> Self {
        let mut pool = Self::new(pool_size, disk_manager);
        pool.log_manager = Some(log_manager);
        pool
    }

    /// Pin a page, reading it from disk (and evicting a victim) if it is not cached
    pub fn pin_page(&self, page_id: PageId) -> Result<PagePtr> {
        let mut state = self.state.lock();

        if let Some((frame_id, frame)) = state.frame_mut(page_id) {
            frame.pin_count += 1;
            let page = frame.page.clone();
            // Page is pinned, so it's not an eviction candidate
            state.replacer.remove(frame_id);
            return Ok(page);
        }

        let frame_id = allocate_frame(self, &mut state)?;

        let page = match self.disk_manager.read_page(page_id) {
            Ok(page) => page,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e.into());
            }
        };

        let page = Arc::new(RwLock::new(page));
        state.frames[frame_id as usize] = Some(Frame {
            page: page.clone(),
            pin_count: 1,
            is_dirty: false,
        });
        state.page_table.insert(page_id, frame_id);

        Ok(page)
    }

    /// Unpin a page, marking it dirty if requested. A dirty mark is never cleared by an unpin.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let mut state = self.state.lock();

        let (frame_id, frame) = state
            .frame_mut(page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        if frame.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }

        frame.pin_count -= 1;
        if is_dirty {
            frame.is_dirty = true;
        }

        if frame.pin_count == 0 {
            state.replacer.record_unpinned(frame_id);
        }

        Ok(())
    }

    /// Write a page to disk if it is dirty
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state, page_id)
    }

    /// Flush all dirty pages to disk
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock();

        let page_ids: Vec<PageId> = state.page_table.keys().copied().collect();
        for page_id in page_ids {
            self.flush_locked(&mut state, page_id)?;
        }

        Ok(())
    }

    fn flush_locked(&self, state: &mut BufferState, page_id: PageId) -> Result<()> {
        let (_, frame) = state
            .frame_mut(page_id)
            .ok_or(BufferPoolError::PageNotFound(page_id))?;

        if frame.is_dirty {
            self.write_back(frame)?;
            frame.is_dirty = false;
        }

        Ok(())
    }

    /// Write a frame's page to disk, honouring the write-ahead rule
    pub(crate) fn write_back(&self, frame: &Frame) -> Result<()> {
        if let Some(ref log_manager) = self.log_manager {
            log_manager.force()?;
        }

        let page = frame.page.read();
        debug!("Writing page {} to disk", page.id());
        self.disk_manager.write_page(&page)?;
        Ok(())
    }

    /// Toggle whether dirty pages are eviction candidates
    pub fn evict_dirty(&self, allow: bool) {
        self.state.lock().evict_dirty = allow;
    }

    /// Drop a page from the cache without writing it, pinned or not
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();

        if let Some(frame_id) = state.page_table.remove(&page_id) {
            state.frames[frame_id as usize] = None;
            state.replacer.remove(frame_id);
            state.free_list.push(frame_id);
            debug!("Discarded page {} from frame {}", page_id, frame_id);
        }
    }

    /// Write a page image straight to disk, dropping any cached copy of it.
    ///
    /// Used by rollback and recovery to install before and after images.
    pub fn write_through(&self, page: &Page) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(frame_id) = state.page_table.remove(&page.id()) {
            state.frames[frame_id as usize] = None;
            state.replacer.remove(frame_id);
            state.free_list.push(frame_id);
        }

        if let Some(ref log_manager) = self.log_manager {
            log_manager.force()?;
        }
        self.disk_manager.write_page(page)?;
        Ok(())
    }

    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.state
            .lock()
            .frame(page_id)
            .is_some_and(|frame| frame.is_dirty)
    }

    pub fn in_buffer_pool(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Get a cached page without pinning it
    pub fn get_page(&self, page_id: PageId) -> Result<PagePtr> {
        self.state
            .lock()
            .frame(page_id)
            .map(|frame| frame.page.clone())
            .ok_or(BufferPoolError::PageNotFound(page_id))
    }

    /// Current pin count of a cached page
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.state.lock().frame(page_id).map(|frame| frame.pin_count)
    }

    /// Allocate a page on disk so that it can be pinned
    pub fn allocate_page(&self, page_id: PageId) -> Result<()> {
        let _state = self.state.lock();
        self.disk_manager.allocate_page(page_id)?;
        Ok(())
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.state.lock().page_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get a reference to the log manager, if available
    pub fn log_manager(&self) -> Option<Arc<LogManager>> {
        self.log_manager.clone()
    }

    /// Get a reference to the disk manager
    pub fn disk_manager(&self) -> Arc<dyn DiskManager> {
        self.disk_manager.clone()
    }
}
