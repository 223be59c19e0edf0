use std::fmt;
use std::io::{self, Read, Write};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::common::types::{LogOffset, Page, PageId, TransactionId};

/// Error type for log record operations
#[derive(Error, Debug)]
pub enum LogRecordError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Unknown log record type {0}")]
    UnknownType(u32),

    #[error("Record at offset {expected} ends with start offset {found}")]
    OffsetMismatch { expected: LogOffset, found: LogOffset },
}

/// Result type for log record operations
pub type Result<T> = std::result::Result<T, LogRecordError>;

/// Transaction id written for records that belong to no transaction
pub const NO_TXN: u64 = 0;

/// Types of log records and their on-disk tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogRecordType {
    Abort = 1,
    Commit = 2,
    Update = 3,
    Begin = 4,
    Checkpoint = 5,
    Clr = 6,
}

impl LogRecordType {
    pub fn from_tag(tag: u32) -> Result<Self> {
        Ok(match tag {
            1 => LogRecordType::Abort,
            2 => LogRecordType::Commit,
            3 => LogRecordType::Update,
            4 => LogRecordType::Begin,
            5 => LogRecordType::Checkpoint,
            6 => LogRecordType::Clr,
            other => return Err(LogRecordError::UnknownType(other)),
        })
    }

    fn label(&self) -> &'static str {
        match self {
            LogRecordType::Abort => "ABORT",
            LogRecordType::Commit => "COMMIT",
            LogRecordType::Update => "UPDATE",
            LogRecordType::Begin => "BEGIN",
            LogRecordType::Checkpoint => "CHECKPOINT",
            LogRecordType::Clr => "CLR",
        }
    }
}

/// Type-specific contents of a log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    Begin,
    Commit,
    Abort,
    Update { before: Page, after: Page },
    /// Compensation: the page image produced by undoing one update
    Clr { after: Page },
    Checkpoint { active: Vec<TransactionId> },
}

/// One record of the write-ahead log.
///
/// Wire format (big endian): type tag (u32), transaction id (u64), payload,
/// then the record's own start offset (u64) so the log can be read backwards.
/// A page in a payload is its table id (u32), page number (u32), byte length
/// (u32) and the bytes. A checkpoint payload is a count (u32) of active
/// transaction ids followed by the ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Offset of the first byte of this record in the log
    pub offset: LogOffset,
    /// Owning transaction; checkpoints belong to none
    pub txn_id: Option<TransactionId>,
    pub payload: LogPayload,
}

impl LogRecord {
    pub fn new(offset: LogOffset, txn_id: Option<TransactionId>, payload: LogPayload) -> Self {
        Self {
            offset,
            txn_id,
            payload,
        }
    }

    pub fn record_type(&self) -> LogRecordType {
        match self.payload {
            LogPayload::Begin => LogRecordType::Begin,
            LogPayload::Commit => LogRecordType::Commit,
            LogPayload::Abort => LogRecordType::Abort,
            LogPayload::Update { .. } => LogRecordType::Update,
            LogPayload::Clr { .. } => LogRecordType::Clr,
            LogPayload::Checkpoint { .. } => LogRecordType::Checkpoint,
        }
    }

    /// Page touched by an update or compensation record
    pub fn page_id(&self) -> Option<PageId> {
        match &self.payload {
            LogPayload::Update { after, .. } | LogPayload::Clr { after } => Some(after.id()),
            _ => None,
        }
    }

    /// Image to install when the record is redone
    pub fn redo_image(&self) -> Option<&Page> {
        match &self.payload {
            LogPayload::Update { after, .. } | LogPayload::Clr { after } => Some(after),
            _ => None,
        }
    }

    /// Number of bytes the record occupies in the log
    pub fn encoded_len(&self) -> u64 {
        let page_len = |page: &Page| 12 + page.page_size() as u64;
        let payload = match &self.payload {
            LogPayload::Begin | LogPayload::Commit | LogPayload::Abort => 0,
            LogPayload::Update { before, after } => page_len(before) + page_len(after),
            LogPayload::Clr { after } => page_len(after),
            LogPayload::Checkpoint { active } => 4 + 8 * active.len() as u64,
        };
        4 + 8 + payload + 8
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len() as usize);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(self.record_type() as u32)?;
        writer.write_u64::<BigEndian>(self.txn_id.map_or(NO_TXN, |tid| tid.id()))?;

        match &self.payload {
            LogPayload::Begin | LogPayload::Commit | LogPayload::Abort => {}
            LogPayload::Update { before, after } => {
                write_page(writer, before)?;
                write_page(writer, after)?;
            }
            LogPayload::Clr { after } => write_page(writer, after)?,
            LogPayload::Checkpoint { active } => {
                writer.write_u32::<BigEndian>(active.len() as u32)?;
                for tid in active {
                    writer.write_u64::<BigEndian>(tid.id())?;
                }
            }
        }

        writer.write_u64::<BigEndian>(self.offset)?;
        Ok(())
    }

    /// Decode the record that starts at `offset`; `reader` must be positioned there
    pub fn read_from<R: Read>(reader: &mut R, offset: LogOffset) -> Result<Self> {
        let record_type = LogRecordType::from_tag(reader.read_u32::<BigEndian>()?)?;
        let raw_tid = reader.read_u64::<BigEndian>()?;
        let txn_id = (raw_tid != NO_TXN).then(|| TransactionId::new(raw_tid));

        let payload = match record_type {
            LogRecordType::Begin => LogPayload::Begin,
            LogRecordType::Commit => LogPayload::Commit,
            LogRecordType::Abort => LogPayload::Abort,
            LogRecordType::Update => {
                let before = read_page(reader)?;
                let after = read_page(reader)?;
                LogPayload::Update { before, after }
            }
            LogRecordType::Clr => LogPayload::Clr {
                after: read_page(reader)?,
            },
            LogRecordType::Checkpoint => {
                let count = reader.read_u32::<BigEndian>()?;
                let mut active = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    active.push(TransactionId::new(reader.read_u64::<BigEndian>()?));
                }
                LogPayload::Checkpoint { active }
            }
        };

        let found = reader.read_u64::<BigEndian>()?;
        if found != offset {
            return Err(LogRecordError::OffsetMismatch {
                expected: offset,
                found,
            });
        }

        Ok(Self {
            offset,
            txn_id,
            payload,
        })
    }
}

fn write_page<W: Write>(writer: &mut W, page: &Page) -> Result<()> {
    writer.write_u32::<BigEndian>(page.id().table_id)?;
    writer.write_u32::<BigEndian>(page.id().page_no)?;
    writer.write_u32::<BigEndian>(page.page_size() as u32)?;
    writer.write_all(page.data())?;
    Ok(())
}

fn read_page<R: Read>(reader: &mut R) -> Result<Page> {
    let table_id = reader.read_u32::<BigEndian>()?;
    let page_no = reader.read_u32::<BigEndian>()?;
    let len = reader.read_u32::<BigEndian>()?;

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;
    Ok(Page::from_bytes(PageId::new(table_id, page_no), data))
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.record_type().label();
        match (&self.payload, self.txn_id) {
            (LogPayload::Checkpoint { active }, _) => {
                let tids: Vec<String> = active.iter().map(|tid| tid.to_string()).collect();
                write!(f, "<{} [{}]>", label, tids.join(", "))
            }
            (_, Some(tid)) => match self.page_id() {
                Some(pid) => write!(f, "<{} {} pid={}>", tid, label, pid),
                None => write!(f, "<{} {}>", tid, label),
            },
            (_, None) => write!(f, "<{}>", label),
        }
    }
}
