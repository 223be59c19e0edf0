use std::collections::{HashSet, VecDeque};

use crate::common::types::{Permissions, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub tid: TransactionId,
    pub mode: LockMode,
}

/// Lock state of one page.
///
/// `mode` is `None` when the page is free. A shared mode always has at least one
/// holder; an exclusive mode has exactly one.
#[derive(Debug, Default)]
pub struct LockTableEntry {
    mode: Option<LockMode>,
    holders: HashSet<TransactionId>,
    requests: VecDeque<LockRequest>,
}

impl LockTableEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<LockMode> {
        self.mode
    }

    pub fn holders(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.holders.iter().copied()
    }

    pub fn is_holder(&self, tid: TransactionId) -> bool {
        self.holders.contains(&tid)
    }

    /// Transactions with an outstanding request, in queue order
    pub fn waiting(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.requests.iter().map(|req| req.tid)
    }

    /// True if nobody holds or waits for the page
    pub fn is_unused(&self) -> bool {
        self.holders.is_empty() && self.requests.is_empty()
    }

    /// Whether `tid` already holds a lock at least as strong as `mode`
    pub fn holds(&self, tid: TransactionId, mode: LockMode) -> bool {
        if !self.holders.contains(&tid) {
            return false;
        }
        match mode {
            LockMode::Shared => true,
            LockMode::Exclusive => self.mode == Some(LockMode::Exclusive),
        }
    }

    /// Queue a request. A shared holder asking for exclusive goes to the front.
    pub fn enqueue(&mut self, tid: TransactionId, mode: LockMode) {
        let request = LockRequest { tid, mode };
        if mode == LockMode::Exclusive && self.holders.contains(&tid) {
            self.requests.push_front(request);
        } else {
            self.requests.push_back(request);
        }
    }

    /// A request is grantable when it heads the queue and is compatible with the holders
    pub fn is_grantable(&self, tid: TransactionId, mode: LockMode) -> bool {
        let at_head = self
            .requests
            .front()
            .is_some_and(|req| req.tid == tid && req.mode == mode);
        if !at_head {
            return false;
        }

        match mode {
            LockMode::Shared => self.mode != Some(LockMode::Exclusive),
            LockMode::Exclusive => {
                self.holders.is_empty() || (self.holders.len() == 1 && self.holders.contains(&tid))
            }
        }
    }

    /// Move the head request into the holder set
    pub fn grant(&mut self, tid: TransactionId, mode: LockMode) {
        self.requests.pop_front();
        self.holders.insert(tid);
        self.mode = Some(match (self.mode, mode) {
            (_, LockMode::Exclusive) | (Some(LockMode::Exclusive), _) => LockMode::Exclusive,
            _ => LockMode::Shared,
        });
    }

    /// Drop a pending request of `tid`, if any
    pub fn withdraw(&mut self, tid: TransactionId) {
        self.requests.retain(|req| req.tid != tid);
    }

    /// Remove `tid` from the holders. Returns false if it was not a holder.
    pub fn release(&mut self, tid: TransactionId) -> bool {
        if !self.holders.remove(&tid) {
            return false;
        }
        if self.holders.is_empty() {
            self.mode = None;
        }
        true
    }
}
