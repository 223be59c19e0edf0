use log::debug;

use crate::common::types::FrameId;
use crate::storage::buffer::error::{BufferPoolError, Result};
use super::{BufferManager, BufferState};

/// Allocate a frame for a page about to be read in
pub(super) fn allocate_frame(bpm: &BufferManager, state: &mut BufferState) -> Result<FrameId> {
    // Try to get a frame from the free list first
    if let Some(frame_id) = state.free_list.pop() {
        return Ok(frame_id);
    }

    // No frames in free list, need to evict a page
    let frame_id = choose_victim(state)?;

    let frame = state.frames[frame_id as usize]
        .as_mut()
        .ok_or(BufferPoolError::NoEvictableFrame)?;
    let page_id = frame.page.read().id();

    // the victim stays cached at its place in the eviction order until it is written
    if frame.is_dirty {
        bpm.write_back(frame)?;
        frame.is_dirty = false;
    }

    state.replacer.remove(frame_id);
    state.frames[frame_id as usize] = None;
    state.page_table.remove(&page_id);
    debug!("Evicted page {} from frame {}", page_id, frame_id);

    Ok(frame_id)
}

fn choose_victim(state: &BufferState) -> Result<FrameId> {
    if state.replacer.is_empty() {
        return Err(BufferPoolError::NoEvictableFrame);
    }

    let BufferState { frames, replacer, evict_dirty, .. } = state;

    if *evict_dirty {
        return replacer.peek_victim(|_| true).ok_or(BufferPoolError::NoEvictableFrame);
    }

    replacer
        .peek_victim(|frame_id| {
            frames[frame_id as usize]
                .as_ref()
                .is_some_and(|frame| !frame.is_dirty)
        })
        .ok_or(BufferPoolError::AllUnpinnedPagesDirty)
}
