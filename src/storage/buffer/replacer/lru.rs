use crate::common::types::FrameId;

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<FrameId>,
    next: Option<FrameId>,
    linked: bool,
}

/// Least-recently-unpinned replacement order.
///
/// Evictable frames form a doubly linked list threaded through an arena indexed by
/// frame id. Newly unpinned frames join the head; victims are taken from the tail.
pub struct LRUReplacer {
    links: Vec<Link>,
    head: Option<FrameId>,
    tail: Option<FrameId>,
    len: usize,
}

impl LRUReplacer {
    pub fn new(pool_size: usize) -> Self {
        Self {
            links: vec![Link::default(); pool_size],
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.links
            .get(frame_id as usize)
            .is_some_and(|link| link.linked)
    }

    /// Mark a frame evictable as the most recently unpinned one
    pub fn record_unpinned(&mut self, frame_id: FrameId) {
        if self.contains(frame_id) {
            self.remove(frame_id);
        }

        let old_head = self.head;
        self.links[frame_id as usize] = Link {
            prev: None,
            next: old_head,
            linked: true,
        };
        match old_head {
            Some(h) => self.links[h as usize].prev = Some(frame_id),
            None => self.tail = Some(frame_id),
        }
        self.head = Some(frame_id);
        self.len += 1;
    }

    /// Remove a frame from the replacer
    pub fn remove(&mut self, frame_id: FrameId) {
        if !self.contains(frame_id) {
            return;
        }

        let Link { prev, next, .. } = self.links[frame_id as usize];
        match prev {
            Some(p) => self.links[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.links[n as usize].prev = prev,
            None => self.tail = prev,
        }
        self.links[frame_id as usize] = Link::default();
        self.len -= 1;
    }

    /// Victim selection: the least recently unpinned frame accepted by `eligible`.
    ///
    /// Scans from the tail toward the head and stops at the first accepted frame,
    /// so the cost is proportional to the number of frames skipped. The frame
    /// stays in the replacer.
    pub fn peek_victim(&self, mut eligible: impl FnMut(FrameId) -> bool) -> Option<FrameId> {
        self.iter_lru().find(|&frame_id| eligible(frame_id))
    }

    /// Like `peek_victim`, but detaches the chosen frame
    pub fn victim(&mut self, eligible: impl FnMut(FrameId) -> bool) -> Option<FrameId> {
        let frame_id = self.peek_victim(eligible)?;
        self.remove(frame_id);
        Some(frame_id)
    }

    /// Frames from least to most recently unpinned
    pub fn iter_lru(&self) -> impl Iterator<Item = FrameId> + '_ {
        std::iter::successors(self.tail, move |&id| self.links[id as usize].prev)
    }
}
