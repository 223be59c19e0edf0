use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::access::error::{AccessError, Result};
use crate::common::types::{LogOffset, PageId, PagePtr, Permissions, TransactionId};
use crate::storage::buffer::BufferManager;
use crate::transaction::concurrency::LockManager;
use crate::transaction::wal::{LogManager, RecoveryManager};

/// Per-transaction bookkeeping
#[derive(Debug, Default)]
struct TransactionPages {
    /// One entry per outstanding pin
    pins: Vec<PageId>,
    /// Every page pinned at least once, in first-touch order
    touched: Vec<PageId>,
}

/// Facade composing locking, caching and logging for transactions.
///
/// Every page access locks first, then pins. Dirty unpins log an update record
/// before the frame is marked dirty, so the buffer manager can always honour
/// the write-ahead rule.
pub struct AccessManager {
    buffer_pool: Arc<BufferManager>,
    lock_manager: Arc<LockManager>,
    log_manager: Arc<LogManager>,
    recovery: RecoveryManager,
    transactions: Mutex<HashMap<TransactionId, TransactionPages>>,
    force: AtomicBool,
    next_tid: AtomicU64,
}

impl AccessManager {
    /// Transaction ids continue after the largest one found in the log
    pub fn new(
        buffer_pool: Arc<BufferManager>,
        lock_manager: Arc<LockManager>,
        log_manager: Arc<LogManager>,
    ) -> Result<Self> {
        let next_tid = log_manager.max_txn_id()?.map_or(1, |tid| tid.id() + 1);
        let recovery = RecoveryManager::new(log_manager.clone(), buffer_pool.clone());

        Ok(Self {
            buffer_pool,
            lock_manager,
            log_manager,
            recovery,
            transactions: Mutex::new(HashMap::new()),
            force: AtomicBool::new(true),
            next_tid: AtomicU64::new(next_tid),
        })
    }

    /// Flush a committing transaction's dirty pages (force) or leave them cached (no-force)
    pub fn set_force(&self, force: bool) {
        self.force.store(force, Ordering::SeqCst);
    }

    pub fn is_force(&self) -> bool {
        self.force.load(Ordering::SeqCst)
    }

    /// Start a transaction with a fresh id
    pub fn begin_transaction(&self) -> Result<TransactionId> {
        let tid = TransactionId::new(self.next_tid.fetch_add(1, Ordering::SeqCst));
        self.ensure_active(tid)?;
        Ok(tid)
    }

    /// Register `tid` and log its Begin record the first time it is seen
    fn ensure_active(&self, tid: TransactionId) -> Result<()> {
        let mut transactions = self.transactions.lock();
        if !transactions.contains_key(&tid) {
            self.log_manager.log_begin(tid)?;
            transactions.insert(tid, TransactionPages::default());
            self.next_tid.fetch_max(tid.id() + 1, Ordering::SeqCst);
            debug!("Began transaction {}", tid);
        }
        Ok(())
    }

    /// Transactions begun but not yet completed
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        let mut tids: Vec<TransactionId> = self.transactions.lock().keys().copied().collect();
        tids.sort();
        tids
    }

    /// Block until the lock is granted. A deadlock surfaces as `AccessError::TransactionAborted`.
    pub fn acquire_lock(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<()> {
        self.ensure_active(tid)?;
        self.lock_manager.acquire_lock(tid, pid, perm)?;
        Ok(())
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> bool {
        self.lock_manager.holds_lock(tid, pid, perm)
    }

    pub fn release_lock(&self, tid: TransactionId, pid: PageId) -> Result<()> {
        self.lock_manager.release_lock(tid, pid)?;
        Ok(())
    }

    /// Lock the page for `perm`, then pin it
    pub fn pin_page(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<PagePtr> {
        self.acquire_lock(tid, pid, perm)?;
        let page = self.buffer_pool.pin_page(pid)?;

        let mut transactions = self.transactions.lock();
        let pages = transactions.entry(tid).or_default();
        pages.pins.push(pid);
        if !pages.touched.contains(&pid) {
            pages.touched.push(pid);
        }

        Ok(page)
    }

    /// Unpin a page. A dirty unpin first logs an update record (before-image to current contents).
    pub fn unpin_page(&self, tid: TransactionId, pid: PageId, is_dirty: bool) -> Result<()> {
        if is_dirty {
            let page = self.buffer_pool.get_page(pid)?;
            let page = page.read();
            self.log_manager.log_update(tid, &page.before_image(), &page)?;
        }

        self.buffer_pool.unpin_page(pid, is_dirty)?;

        let mut transactions = self.transactions.lock();
        if let Some(pages) = transactions.get_mut(&tid) {
            if let Some(pos) = pages.pins.iter().position(|&p| p == pid) {
                pages.pins.swap_remove(pos);
            }
        }

        Ok(())
    }

    /// Allocate a page on disk so that it can be pinned
    pub fn allocate_page(&self, pid: PageId) -> Result<()> {
        self.buffer_pool.allocate_page(pid)?;
        Ok(())
    }

    /// Commit or abort `tid`, then release all of its locks.
    ///
    /// Commit flushes the transaction's dirty pages under the force policy, logs
    /// Commit and freezes the new contents as before-images. Abort rolls the
    /// transaction back from the log and drops its uncommitted cached pages.
    /// On error the transaction stays active with its locks held, so the call
    /// can be retried.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        let touched = self
            .transactions
            .lock()
            .get(&tid)
            .map(|pages| pages.touched.clone())
            .ok_or(AccessError::UnknownTransaction(tid))?;

        // pages this transaction could have modified and still holds
        let writable: Vec<PageId> = touched
            .into_iter()
            .filter(|&pid| self.lock_manager.holds_lock(tid, pid, Permissions::ReadWrite))
            .collect();

        let pages = if commit {
            self.commit(tid, &writable)?
        } else {
            self.abort(tid, &writable)?
        };

        for pid in pages.pins {
            if self.buffer_pool.pin_count(pid).is_some_and(|count| count > 0) {
                if let Err(e) = self.buffer_pool.unpin_page(pid, false) {
                    warn!("Could not unpin page {} left pinned by {}: {}", pid, tid, e);
                }
            }
        }

        let released = self.lock_manager.release_all_locks(tid);
        debug!(
            "{} {} and released {} locks",
            if commit { "Committed" } else { "Aborted" },
            tid,
            released.len()
        );
        Ok(())
    }

    fn commit(&self, tid: TransactionId, writable: &[PageId]) -> Result<TransactionPages> {
        if self.is_force() {
            for &pid in writable {
                if self.buffer_pool.is_dirty(pid) {
                    self.buffer_pool.flush_page(pid)?;
                }
            }
        }

        let pages = self.retire(tid, true)?;

        // pages released early may already carry another transaction's changes
        for &pid in writable {
            if let Ok(page) = self.buffer_pool.get_page(pid) {
                page.write().set_before_image();
            }
        }
        Ok(pages)
    }

    fn abort(&self, tid: TransactionId, writable: &[PageId]) -> Result<TransactionPages> {
        self.recovery.undo_transaction(tid)?;

        for &pid in writable {
            let Ok(page) = self.buffer_pool.get_page(pid) else {
                continue;
            };
            let modified = page.read().is_modified();
            if !modified && !self.buffer_pool.is_dirty(pid) {
                continue;
            }

            if self.is_force() {
                // committed data never stays dirty under force, so the changes are ours
                self.buffer_pool.discard_page(pid);
            } else {
                // may also hold committed but unflushed data: revert only our changes
                let mut page = page.write();
                let before = page.before_image();
                page.set_data(before.data());
            }
        }

        self.retire(tid, false)
    }

    /// Log the final Commit or Abort record and forget `tid` in one step.
    ///
    /// Checkpoints read the active set under the same lock, so a transaction is
    /// either listed as active or has its final record before the checkpoint.
    fn retire(&self, tid: TransactionId, commit: bool) -> Result<TransactionPages> {
        let mut transactions = self.transactions.lock();
        if commit {
            self.log_manager.log_commit(tid)?;
        } else {
            self.log_manager.log_abort(tid)?;
        }
        transactions
            .remove(&tid)
            .ok_or(AccessError::UnknownTransaction(tid))
    }

    /// Force the log, flush every dirty page, then log a checkpoint naming the active transactions
    pub fn checkpoint(&self) -> Result<LogOffset> {
        self.log_manager.force()?;
        self.buffer_pool.flush_all_pages()?;

        let transactions = self.transactions.lock();
        let mut active: Vec<TransactionId> = transactions.keys().copied().collect();
        active.sort();
        let offset = self.log_manager.log_checkpoint(&active)?;
        drop(transactions);

        info!("Checkpoint taken with {} active transactions", active.len());
        Ok(offset)
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
}
