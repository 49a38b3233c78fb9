//! Append-only history store.
//!
//! One CSV file is the sole durable record of history: a header line
//! written once, then one LF-terminated record per logging interval,
//! never rewritten. The durable medium is pluggable so the same
//! append/replay logic runs against an SD card, a host file, or an
//! in-memory buffer in tests.

pub mod csv;
pub mod memory;
pub mod sd_card;

use heapless::{String, Vec};
use log::{debug, warn};
use thiserror_no_std::Error;

use crate::config::MAX_CHANNELS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The medium cannot be opened at all (card removed, file system
    /// gone). Callers degrade to in-memory operation.
    #[error("durable medium unavailable")]
    Unavailable,
    /// The medium opened but an operation on it failed.
    #[error("medium I/O error")]
    Io,
    /// An append committed zero bytes; treated as a missed interval and
    /// retried at the next one.
    #[error("write committed zero bytes")]
    NothingWritten,
}

/// Values persisted for one channel in one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogEntry {
    pub raw: u16,
    pub voltage: f32,
    pub percentage: f32,
}

/// One durable history record. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// `YYYY-MM-DDTHH:MM:SSZ`, or the epoch-zero sentinel when time was
    /// not synchronized at logging time.
    pub timestamp: String<20>,
    pub entries: Vec<LogEntry, MAX_CHANNELS>,
}

/// Byte-level access to the durable medium backing the history log.
pub trait HistoryMedium {
    /// Append raw bytes, reporting how many were committed.
    fn append(&mut self, bytes: &[u8]) -> Result<usize, StorageError>;

    /// True when the medium holds no prior data (so a header is needed).
    fn is_empty(&mut self) -> Result<bool, StorageError>;

    /// Forward-only pass over every stored line, in write order, with
    /// line terminators stripped. A missing backing file reads as no
    /// lines, not as an error.
    fn for_each_line(&mut self, f: &mut dyn FnMut(&str)) -> Result<(), StorageError>;
}

/// The history store: CSV schema on top of a [`HistoryMedium`].
pub struct HistoryLog<M: HistoryMedium> {
    medium: M,
    channel_count: usize,
}

impl<M: HistoryMedium> HistoryLog<M> {
    pub fn new(medium: M, channel_count: usize) -> Self {
        Self {
            medium,
            channel_count,
        }
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    /// Append one record, writing the column header first iff the medium
    /// is empty. Returns the bytes committed for the record line so the
    /// caller can detect a degenerate zero-byte write.
    pub fn append(&mut self, record: &LogRecord) -> Result<usize, StorageError> {
        if self.medium.is_empty()? {
            let header = csv::render_header(self.channel_count);
            self.medium.append(header.as_bytes())?;
            debug!("history header written ({} channels)", self.channel_count);
        }
        let line = csv::render_record(record);
        let written = self.medium.append(line.as_bytes())?;
        if written == 0 {
            return Err(StorageError::NothingWritten);
        }
        Ok(written)
    }

    /// Replay every stored record from the first, oldest first.
    ///
    /// The header line is skipped; a line whose field count does not match
    /// the configured channel count (or that fails numeric parsing) is
    /// skipped rather than aborting the replay. A fresh call always starts
    /// from the first record.
    pub fn replay<F: FnMut(LogRecord)>(&mut self, mut f: F) -> Result<(), StorageError> {
        let channel_count = self.channel_count;
        self.medium.for_each_line(&mut |line| {
            if line.is_empty() || line.starts_with("DateTime_UTC") {
                return;
            }
            match csv::parse_record(line, channel_count) {
                Some(record) => f(record),
                None => debug!("skipping malformed history line"),
            }
        })
    }

    /// Replay everything into an owned list, oldest first.
    ///
    /// A replay that fails outright (medium unavailable) yields an empty
    /// list, so a pulled card degrades whatever is serving the history
    /// instead of erroring it. Callers that hold a lock around the log can
    /// collect under the lock and release it before doing any I/O with the
    /// result.
    pub fn collect(&mut self) -> alloc::vec::Vec<LogRecord> {
        let mut records = alloc::vec::Vec::new();
        if let Err(e) = self.replay(|record| records.push(record)) {
            warn!("history replay failed: {e}");
            records.clear();
        }
        records
    }
}
