use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;
use byteorder::{BigEndian, ReadBytesExt};

use crate::common::types::LogOffset;
use crate::transaction::wal::log_manager::{LogManagerError, Result, LOG_HEADER_SIZE};
use crate::transaction::wal::log_record::LogRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

/// Iterator over log records, reading through its own file handle.
///
/// The scan is bounded by the log end observed when the iterator was created;
/// records appended afterwards are not visited.
pub struct LogIterator {
    reader: BufReader<File>,
    position: LogOffset,
    end: LogOffset,
    direction: ScanDirection,
    failed: bool,
}

impl LogIterator {
    /// Scan forward starting at the record beginning at `start`
    pub fn forward(path: &Path, start: LogOffset, end: LogOffset) -> Result<Self> {
        let start = start.max(LOG_HEADER_SIZE);
        let mut reader = BufReader::new(File::open(path)?);
        reader.seek(SeekFrom::Start(start))?;

        Ok(Self {
            reader,
            position: start,
            end,
            direction: ScanDirection::Forward,
            failed: false,
        })
    }

    /// Scan backward from the record that ends at `end`
    pub fn backward(path: &Path, end: LogOffset) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            position: end,
            end,
            direction: ScanDirection::Backward,
            failed: false,
        })
    }

    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    fn next_forward(&mut self) -> Result<Option<LogRecord>> {
        if self.position >= self.end {
            return Ok(None);
        }

        let record = LogRecord::read_from(&mut self.reader, self.position)?;
        self.position += record.encoded_len();
        Ok(Some(record))
    }

    fn next_backward(&mut self) -> Result<Option<LogRecord>> {
        if self.position <= LOG_HEADER_SIZE {
            return Ok(None);
        }

        self.reader.seek(SeekFrom::Start(self.position - 8))?;
        let start = self.reader.read_u64::<BigEndian>()?;
        if start < LOG_HEADER_SIZE || start >= self.position {
            return Err(LogManagerError::InvalidOffset(start));
        }

        self.reader.seek(SeekFrom::Start(start))?;
        let record = LogRecord::read_from(&mut self.reader, start)?;
        self.position = start;
        Ok(Some(record))
    }
}

impl Iterator for LogIterator {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = match self.direction {
            ScanDirection::Forward => self.next_forward(),
            ScanDirection::Backward => self.next_backward(),
        };

        match result {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
