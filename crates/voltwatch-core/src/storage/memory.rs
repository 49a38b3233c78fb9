//! In-memory history medium for tests and host demos.

use alloc::string::String;
use alloc::vec::Vec;

use super::{HistoryMedium, StorageError};

/// Growable buffer standing in for the durable medium.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    buf: Vec<u8>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes as text (the log is UTF-8 by construction).
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf).unwrap_or("")
    }
}

impl HistoryMedium for MemoryMedium {
    fn append(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn is_empty(&mut self) -> Result<bool, StorageError> {
        Ok(self.buf.is_empty())
    }

    fn for_each_line(&mut self, f: &mut dyn FnMut(&str)) -> Result<(), StorageError> {
        let text = String::from_utf8_lossy(&self.buf);
        for line in text.lines() {
            f(line.trim_end_matches('\r'));
        }
        Ok(())
    }
}
