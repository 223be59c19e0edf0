use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{LogOffset, Page, TransactionId};
use crate::transaction::wal::log_iterator::LogIterator;
use crate::transaction::wal::log_record::{LogPayload, LogRecord, LogRecordError};

/// The log starts with the offset of the most recent checkpoint record
pub const LOG_HEADER_SIZE: LogOffset = 8;

const NO_CHECKPOINT: i64 = -1;

/// Error type for log manager operations
#[derive(Error, Debug)]
pub enum LogManagerError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Log record error: {0}")]
    LogRecordError(#[from] LogRecordError),

    #[error("No log record starts at offset {0}")]
    InvalidOffset(LogOffset),
}

impl LogManagerError {
    /// A record cut short by a crash in the middle of an append
    fn is_torn_record(&self) -> bool {
        matches!(
            self,
            LogManagerError::LogRecordError(LogRecordError::IoError(e))
                if e.kind() == io::ErrorKind::UnexpectedEof
        )
    }

    /// A record that is complete but does not decode
    fn is_corrupt_record(&self) -> bool {
        matches!(
            self,
            LogManagerError::LogRecordError(
                LogRecordError::UnknownType(_) | LogRecordError::OffsetMismatch { .. }
            )
        )
    }
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, LogManagerError>;

/// Configuration for the log manager
#[derive(Debug, Clone)]
pub struct LogManagerConfig {
    /// Path of the log file
    pub log_path: PathBuf,

    /// Whether to fsync when the log is forced
    pub sync_on_force: bool,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("pagecore.wal"),
            sync_on_force: true,
        }
    }
}

struct LogState {
    file: File,
    /// Offset one past the last appended record
    end: LogOffset,
    /// Everything before this offset has been forced
    forced_end: LogOffset,
    last_checkpoint: Option<LogOffset>,
}

/// Append-only write-ahead log stored in a single file
pub struct LogManager {
    config: LogManagerConfig,
    state: Mutex<LogState>,
}

impl LogManager {
    /// Open the log, creating it if needed. A torn record at the tail is cut off.
    pub fn open(config: LogManagerConfig) -> Result<Self> {
        if let Some(parent) = config.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&config.log_path)?;

        let len = file.metadata()?.len();
        let (end, mut last_checkpoint) = if len < LOG_HEADER_SIZE {
            file.set_len(0)?;
            write_header(&mut file, None)?;
            file.sync_all()?;
            (LOG_HEADER_SIZE, None)
        } else {
            let checkpoint = read_header(&mut file)?;
            (Self::valid_end(&config.log_path, len)?, checkpoint)
        };

        if end < len {
            warn!("Truncating torn log tail: {} -> {} bytes", len, end);
            file.set_len(end)?;
            file.sync_data()?;
        }

        if last_checkpoint.is_some_and(|offset| offset >= end) {
            warn!("Checkpoint pointer beyond end of log, ignoring it");
            last_checkpoint = None;
            write_header(&mut file, None)?;
            file.sync_data()?;
        }

        info!(
            "Opened log {} ({} bytes, last checkpoint {:?})",
            config.log_path.display(),
            end,
            last_checkpoint
        );

        Ok(Self {
            config,
            state: Mutex::new(LogState {
                file,
                end,
                forced_end: end,
                last_checkpoint,
            }),
        })
    }

    fn valid_end(path: &Path, len: LogOffset) -> Result<LogOffset> {
        let mut end = LOG_HEADER_SIZE;
        for record in LogIterator::forward(path, LOG_HEADER_SIZE, len)? {
            match record {
                Ok(record) => end = record.offset + record.encoded_len(),
                Err(e) if e.is_torn_record() => break,
                // an extended but never written tail reads back as zeros
                Err(e) if e.is_corrupt_record() && tail_is_zeroed(path, end)? => break,
                Err(e) => return Err(e),
            }
        }
        Ok(end)
    }

    pub fn log_begin(&self, tid: TransactionId) -> Result<LogOffset> {
        self.append(Some(tid), LogPayload::Begin)
    }

    /// Append a Commit record and force the log
    pub fn log_commit(&self, tid: TransactionId) -> Result<LogOffset> {
        let offset = self.append(Some(tid), LogPayload::Commit)?;
        self.force()?;
        Ok(offset)
    }

    /// Append an Abort record and force the log
    pub fn log_abort(&self, tid: TransactionId) -> Result<LogOffset> {
        let offset = self.append(Some(tid), LogPayload::Abort)?;
        self.force()?;
        Ok(offset)
    }

    pub fn log_update(&self, tid: TransactionId, before: &Page, after: &Page) -> Result<LogOffset> {
        self.append(
            Some(tid),
            LogPayload::Update {
                before: before.clone(),
                after: after.clone(),
            },
        )
    }

    pub fn log_clr(&self, tid: TransactionId, after: &Page) -> Result<LogOffset> {
        self.append(Some(tid), LogPayload::Clr { after: after.clone() })
    }

    /// Append a checkpoint naming the active transactions, point the header at it and force
    pub fn log_checkpoint(&self, active: &[TransactionId]) -> Result<LogOffset> {
        let mut state = self.state.lock();
        let offset = Self::append_locked(
            &mut state,
            None,
            LogPayload::Checkpoint {
                active: active.to_vec(),
            },
        )?;

        write_header(&mut state.file, Some(offset))?;
        state.last_checkpoint = Some(offset);
        self.force_locked(&mut state)?;

        info!("Checkpoint at offset {} with {} active transactions", offset, active.len());
        Ok(offset)
    }

    fn append(&self, txn_id: Option<TransactionId>, payload: LogPayload) -> Result<LogOffset> {
        let mut state = self.state.lock();
        Self::append_locked(&mut state, txn_id, payload)
    }

    fn append_locked(
        state: &mut LogState,
        txn_id: Option<TransactionId>,
        payload: LogPayload,
    ) -> Result<LogOffset> {
        let record = LogRecord::new(state.end, txn_id, payload);
        let bytes = record.encode()?;

        state.file.seek(SeekFrom::Start(state.end))?;
        state.file.write_all(&bytes)?;
        state.end += bytes.len() as LogOffset;

        debug!("Appended {} at offset {}", record, record.offset);
        Ok(record.offset)
    }

    /// Make every appended record durable
    pub fn force(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.force_locked(&mut state)
    }

    fn force_locked(&self, state: &mut LogState) -> Result<()> {
        if state.forced_end < state.end {
            if self.config.sync_on_force {
                state.file.sync_data()?;
            }
            state.forced_end = state.end;
        }
        Ok(())
    }

    /// Offset of the most recent checkpoint record
    pub fn last_checkpoint(&self) -> Option<LogOffset> {
        self.state.lock().last_checkpoint
    }

    /// Offset one past the last record
    pub fn end_offset(&self) -> LogOffset {
        self.state.lock().end
    }

    /// Offset up to which the log is durable
    pub fn forced_offset(&self) -> LogOffset {
        self.state.lock().forced_end
    }

    pub fn path(&self) -> &Path {
        &self.config.log_path
    }

    /// Scan records from `start` to the current end
    pub fn iter_forward(&self, start: LogOffset) -> Result<LogIterator> {
        let end = self.end_offset();
        LogIterator::forward(&self.config.log_path, start, end)
    }

    /// Scan records from the current end back to the start
    pub fn iter_backward(&self) -> Result<LogIterator> {
        let end = self.end_offset();
        LogIterator::backward(&self.config.log_path, end)
    }

    pub fn read_record_at(&self, offset: LogOffset) -> Result<LogRecord> {
        let state = self.state.lock();
        if offset < LOG_HEADER_SIZE || offset >= state.end {
            return Err(LogManagerError::InvalidOffset(offset));
        }

        let mut file = &state.file;
        file.seek(SeekFrom::Start(offset))?;
        let record = LogRecord::read_from(&mut BufReader::new(file), offset)?;
        Ok(record)
    }

    /// Largest transaction id mentioned anywhere in the log
    pub fn max_txn_id(&self) -> Result<Option<TransactionId>> {
        let mut max = None;
        for record in self.iter_forward(LOG_HEADER_SIZE)? {
            let record = record?;
            max = max.max(record.txn_id);
            if let LogPayload::Checkpoint { active } = &record.payload {
                max = max.max(active.iter().copied().max());
            }
        }
        Ok(max)
    }

    /// Human-readable listing of the whole log
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(out, "checkpoint pointer: {:?}", self.last_checkpoint());
        for record in self.iter_forward(LOG_HEADER_SIZE)? {
            let record = record?;
            let _ = writeln!(out, "{:>8}: {}", record.offset, record);
        }
        Ok(out)
    }
}

fn write_header(file: &mut File, checkpoint: Option<LogOffset>) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_i64::<BigEndian>(checkpoint.map_or(NO_CHECKPOINT, |offset| offset as i64))
}

fn tail_is_zeroed(path: &Path, from: LogOffset) -> io::Result<bool> {
    let mut reader = BufReader::new(File::open(path)?);
    reader.seek(SeekFrom::Start(from))?;
    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    Ok(rest.iter().all(|&b| b == 0))
}

fn read_header(file: &mut File) -> io::Result<Option<LogOffset>> {
    file.seek(SeekFrom::Start(0))?;
    let pointer = file.read_i64::<BigEndian>()?;
    Ok((pointer >= 0).then_some(pointer as LogOffset))
}
