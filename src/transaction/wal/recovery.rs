use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use log::{debug, info};
use thiserror::Error;

use crate::common::types::{LogOffset, TransactionId};
use crate::storage::buffer::{BufferManager, BufferPoolError};
use crate::transaction::wal::log_manager::{LogManager, LogManagerError, LOG_HEADER_SIZE};
use crate::transaction::wal::log_record::LogPayload;

/// Error type for recovery operations
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Log manager error: {0}")]
    LogManagerError(#[from] LogManagerError),

    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),

    #[error("Inconsistent log: {0}")]
    Inconsistent(String),

    #[error("Transaction {0} has already committed")]
    AlreadyCommitted(TransactionId),
}

/// Result type for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Outcome of a crash recovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Transactions that were in flight at the crash, in id order
    pub losers: Vec<TransactionId>,
    /// Update and compensation records whose after-image was reinstalled
    pub redone: usize,
    /// Updates rolled back during undo
    pub undone: usize,
}

/// Rolls back single transactions and repairs the database after a crash.
///
/// All page images are installed through the buffer manager, which drops any
/// cached copy and forces the log before touching the disk.
pub struct RecoveryManager {
    log_manager: Arc<LogManager>,
    buffer_pool: Arc<BufferManager>,
}

impl RecoveryManager {
    pub fn new(log_manager: Arc<LogManager>, buffer_pool: Arc<BufferManager>) -> Self {
        Self {
            log_manager,
            buffer_pool,
        }
    }

    /// Undo every update of a running transaction and log its abort.
    pub fn rollback(&self, tid: TransactionId) -> Result<()> {
        self.undo_transaction(tid)?;
        self.log_manager.log_abort(tid)?;
        Ok(())
    }

    /// Undo every update of a running transaction without logging its abort.
    /// Returns the number of updates undone.
    ///
    /// Updates that already have a compensation record (from an interrupted
    /// rollback) are skipped.
    pub fn undo_transaction(&self, tid: TransactionId) -> Result<usize> {
        let mut updates = Vec::new();
        let mut compensated = 0usize;
        let mut began = false;

        for record in self.log_manager.iter_forward(LOG_HEADER_SIZE)? {
            let record = record?;
            if record.txn_id != Some(tid) {
                continue;
            }
            match record.payload {
                LogPayload::Begin => began = true,
                LogPayload::Update { .. } => updates.push(record.offset),
                LogPayload::Clr { .. } => compensated += 1,
                LogPayload::Commit => return Err(RecoveryError::AlreadyCommitted(tid)),
                LogPayload::Abort => {
                    return Err(RecoveryError::Inconsistent(format!(
                        "{} rolled back twice",
                        tid
                    )))
                }
                LogPayload::Checkpoint { .. } => {}
            }
        }

        if !began {
            return Err(RecoveryError::Inconsistent(format!(
                "no begin record for {}",
                tid
            )));
        }

        let mut undone = 0;
        for &offset in updates.iter().rev().skip(compensated) {
            self.undo_update(tid, offset)?;
            undone += 1;
        }

        debug!("Rolled back {}: {} updates undone", tid, undone);
        Ok(undone)
    }

    /// Restore the before-image of the update at `offset`, compensation record first
    fn undo_update(&self, tid: TransactionId, offset: LogOffset) -> Result<()> {
        let record = self.log_manager.read_record_at(offset)?;
        let LogPayload::Update { before, .. } = record.payload else {
            return Err(RecoveryError::Inconsistent(format!(
                "expected an update record at offset {}",
                offset
            )));
        };

        self.log_manager.log_clr(tid, &before)?;
        self.buffer_pool.write_through(&before)?;
        debug!("Undid update of {} on page {} (offset {})", tid, before.id(), offset);
        Ok(())
    }

    /// Run analysis, redo and undo. Safe to repeat after a crash in the middle of recovery.
    pub fn recover(&self) -> Result<RecoveryReport> {
        info!("Starting database recovery process");
        let start = self.log_manager.last_checkpoint().unwrap_or(LOG_HEADER_SIZE);

        info!("Analysis phase: scanning from offset {}", start);
        let losers = self.analysis_phase(start)?;

        info!("Redo phase: reinstalling after-images from offset {}", start);
        let redone = self.redo_phase(start)?;

        info!("Undo phase: rolling back {} uncommitted transactions", losers.len());
        let undone = self.undo_phase(&losers)?;

        info!("Recovery complete: {} redone, {} undone", redone, undone);
        Ok(RecoveryReport {
            losers: losers.into_iter().collect(),
            redone,
            undone,
        })
    }

    /// Transactions begun (or active at the checkpoint) without a commit or abort
    fn analysis_phase(&self, start: LogOffset) -> Result<BTreeSet<TransactionId>> {
        let mut losers = BTreeSet::new();

        for record in self.log_manager.iter_forward(start)? {
            let record = record?;
            match (&record.payload, record.txn_id) {
                (LogPayload::Checkpoint { active }, _) => losers.extend(active.iter().copied()),
                (LogPayload::Begin, Some(tid)) => {
                    losers.insert(tid);
                }
                (LogPayload::Commit | LogPayload::Abort, Some(tid)) => {
                    if !losers.remove(&tid) {
                        return Err(RecoveryError::Inconsistent(format!(
                            "{} at offset {} for a transaction that never began",
                            record, record.offset
                        )));
                    }
                }
                (LogPayload::Update { .. } | LogPayload::Clr { .. }, _) => {}
                (_, None) => {
                    return Err(RecoveryError::Inconsistent(format!(
                        "record at offset {} has no transaction",
                        record.offset
                    )));
                }
            }
        }

        debug!("Analysis phase completed: losers {:?}", losers);
        Ok(losers)
    }

    /// Reinstall the after-image of every update and compensation record, winners and losers alike
    fn redo_phase(&self, start: LogOffset) -> Result<usize> {
        let mut redone = 0;

        for record in self.log_manager.iter_forward(start)? {
            let record = record?;
            if let Some(image) = record.redo_image() {
                debug!("Redoing {} at offset {}", record, record.offset);
                self.buffer_pool.write_through(image)?;
                redone += 1;
            }
        }

        Ok(redone)
    }

    /// Undo losers newest-first over the whole log, emitting CLRs and finally Abort records
    fn undo_phase(&self, losers: &BTreeSet<TransactionId>) -> Result<usize> {
        if losers.is_empty() {
            debug!("No uncommitted transactions found - skipping undo phase");
            return Ok(0);
        }

        // (offset, tid, is_begin) in log order
        let mut todo: Vec<(LogOffset, TransactionId, bool)> = Vec::new();
        let mut compensated: HashMap<TransactionId, usize> = HashMap::new();

        for record in self.log_manager.iter_forward(LOG_HEADER_SIZE)? {
            let record = record?;
            let Some(tid) = record.txn_id.filter(|tid| losers.contains(tid)) else {
                continue;
            };
            match record.payload {
                LogPayload::Begin => todo.push((record.offset, tid, true)),
                LogPayload::Update { .. } => todo.push((record.offset, tid, false)),
                LogPayload::Clr { .. } => *compensated.entry(tid).or_default() += 1,
                _ => {}
            }
        }

        let mut aborted = BTreeSet::new();
        let mut undone = 0;
        for (offset, tid, is_begin) in todo.into_iter().rev() {
            if is_begin {
                self.log_manager.log_abort(tid)?;
                aborted.insert(tid);
                debug!("Logged abort for loser {}", tid);
                continue;
            }

            match compensated.get_mut(&tid) {
                Some(remaining) if *remaining > 0 => *remaining -= 1,
                _ => {
                    self.undo_update(tid, offset)?;
                    undone += 1;
                }
            }
        }

        // losers named by the checkpoint whose Begin was never logged
        for &tid in losers.difference(&aborted) {
            self.log_manager.log_abort(tid)?;
        }

        Ok(undone)
    }
}
