use std::collections::HashMap;
use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::common::types::{PageId, Permissions, TransactionId};
use crate::transaction::concurrency::error::{LockError, Result};
use crate::transaction::concurrency::lock_table::{LockMode, LockTableEntry};
use crate::transaction::concurrency::wait_for_graph::WaitForGraph;

#[derive(Default)]
struct LockTable {
    entries: HashMap<PageId, LockTableEntry>,
    pages_by_tid: HashMap<TransactionId, Vec<PageId>>,
    wait_for: WaitForGraph,
}

impl LockTable {
    fn release(&mut self, tid: TransactionId, pid: PageId) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&pid)
            .ok_or(LockError::LockNotHeld { tid, pid })?;

        if !entry.release(tid) {
            return Err(LockError::LockNotHeld { tid, pid });
        }

        // waiters on this page no longer wait for tid
        for waiter in entry.waiting() {
            self.wait_for.remove_edge(waiter, tid);
        }

        if entry.is_unused() {
            self.entries.remove(&pid);
        }

        if let Some(pages) = self.pages_by_tid.get_mut(&tid) {
            pages.retain(|&p| p != pid);
            if pages.is_empty() {
                self.pages_by_tid.remove(&tid);
            }
        }

        Ok(())
    }
}

/// Page-granularity shared/exclusive lock manager with deadlock detection.
///
/// One mutex guards every lock table entry and the wait-for graph; blocked
/// requesters sleep on a single condition variable that is broadcast whenever
/// the table changes.
pub struct LockManager {
    table: Mutex<LockTable>,
    changed: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            changed: Condvar::new(),
        }
    }

    /// Block until `tid` holds a lock on `pid` compatible with `perm`.
    ///
    /// Fails with `LockError::Deadlock` if waiting would close a cycle in the
    /// wait-for graph; the request is withdrawn before returning.
    pub fn acquire_lock(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<()> {
        let mode = LockMode::from(perm);
        let mut table = self.table.lock();

        {
            let entry = table.entries.entry(pid).or_default();
            if entry.holds(tid, mode) {
                return Ok(());
            }
            entry.enqueue(tid, mode);
        }

        loop {
            let LockTable { entries, pages_by_tid, wait_for } = &mut *table;
            let entry = entries.entry(pid).or_default();

            if entry.is_grantable(tid, mode) {
                entry.grant(tid, mode);
                wait_for.remove_waiter(tid);

                let pages = pages_by_tid.entry(tid).or_default();
                if !pages.contains(&pid) {
                    pages.push(pid);
                }

                debug!("Granted {:?} lock on page {} to {}", mode, pid, tid);
                self.changed.notify_all();
                return Ok(());
            }

            wait_for.set_waits(tid, entry.holders());
            if wait_for.has_cycle() {
                entry.withdraw(tid);
                wait_for.remove_waiter(tid);
                if entry.is_unused() {
                    entries.remove(&pid);
                }

                warn!("Deadlock detected: {} aborted waiting for page {}", tid, pid);
                self.changed.notify_all();
                return Err(LockError::Deadlock(tid));
            }

            self.changed.wait(&mut table);
        }
    }

    /// True iff `tid` holds a lock on `pid` at a mode that satisfies `perm`
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> bool {
        let table = self.table.lock();
        table
            .entries
            .get(&pid)
            .is_some_and(|entry| entry.holds(tid, LockMode::from(perm)))
    }

    pub fn release_lock(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        let mut table = self.table.lock();
        table.release(tid, pid)?;
        self.changed.notify_all();
        Ok(())
    }

    /// Release every lock `tid` holds and return the pages that were unlocked
    pub fn release_all_locks(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock();
        let pages = table.pages_by_tid.get(&tid).cloned().unwrap_or_default();

        for &pid in &pages {
            let released = table.release(tid, pid);
            debug_assert!(released.is_ok(), "{} listed for {} without a lock entry", pid, tid);
            if let Err(e) = released {
                warn!("Lock table out of sync while releasing {}: {}", tid, e);
            }
        }

        if !pages.is_empty() {
            self.changed.notify_all();
        }
        pages
    }

    /// Pages currently locked by `tid`, in acquisition order
    pub fn pages_for_tid(&self, tid: TransactionId) -> Vec<PageId> {
        self.table
            .lock()
            .pages_by_tid
            .get(&tid)
            .cloned()
            .unwrap_or_default()
    }

    /// Current holders of `pid`
    pub fn tids_for_page(&self, pid: PageId) -> Vec<TransactionId> {
        let table = self.table.lock();
        let mut tids: Vec<TransactionId> = table
            .entries
            .get(&pid)
            .map(|entry| entry.holders().collect())
            .unwrap_or_default();
        tids.sort();
        tids
    }

    /// Transactions `tid` is currently blocked on
    pub fn waits_for(&self, tid: TransactionId) -> Vec<TransactionId> {
        self.table.lock().wait_for.waits_for(tid)
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
