//! SD card history medium over `embedded-sdmmc`.
//!
//! Operations here are blocking: every append opens the volume, root
//! directory, and file, writes, flushes, and closes again, so a card
//! pulled mid-run surfaces as an open error on the next interval instead
//! of a stale handle. The explicit flush before close is what guarantees a
//! later power interruption cannot silently lose a committed record.

use alloc::string::String;

use embedded_sdmmc::{Mode, SdCard, SdCardError, TimeSource, VolumeIdx, VolumeManager};
use log::warn;

use super::{HistoryMedium, StorageError};

/// History file name in the card's root directory (8.3 format).
pub const HISTORY_FILE: &str = "battery.csv";

/// Read chunk size for replay. Records are ~100 bytes for ten channels,
/// so this keeps the line assembly loop short without a large buffer.
const READ_CHUNK: usize = 64;

pub struct SdCardMedium<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

impl<S, D, T> SdCardMedium<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(sd_card, ts);
        Self { volume_mgr }
    }
}

fn map_err(e: embedded_sdmmc::Error<SdCardError>) -> StorageError {
    match e {
        embedded_sdmmc::Error::DeviceError(_) | embedded_sdmmc::Error::NoSuchVolume => {
            StorageError::Unavailable
        }
        _ => StorageError::Io,
    }
}

impl<S, D, T> HistoryMedium for SdCardMedium<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    fn append(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(map_err)?;
        let root_dir = volume.open_root_dir().map_err(map_err)?;
        let file = root_dir
            .open_file_in_dir(HISTORY_FILE, Mode::ReadWriteCreateOrAppend)
            .map_err(map_err)?;

        let before = file.length();
        file.write(bytes).map_err(map_err)?;
        // Force the write out before close so power loss cannot lose it.
        file.flush().map_err(map_err)?;
        let after = file.length();

        file.close().map_err(map_err)?;
        root_dir.close().map_err(map_err)?;
        volume.close().map_err(map_err)?;

        Ok(after.saturating_sub(before) as usize)
    }

    fn is_empty(&mut self) -> Result<bool, StorageError> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(map_err)?;
        let root_dir = volume.open_root_dir().map_err(map_err)?;

        // Consume the `File` inside a single statement: a live binding whose
        // type borrows `root_dir` would block the `close()` moves below.
        let open_result = root_dir
            .open_file_in_dir(HISTORY_FILE, Mode::ReadOnly)
            .map(|file| {
                let len = file.length();
                file.close().map(|()| len == 0)
            });
        let empty = match open_result {
            Ok(close_result) => close_result.map_err(map_err)?,
            Err(_e @ embedded_sdmmc::Error::NotFound) => true,
            Err(e) => {
                root_dir.close().ok();
                volume.close().ok();
                return Err(map_err(e));
            }
        };

        root_dir.close().map_err(map_err)?;
        volume.close().map_err(map_err)?;
        Ok(empty)
    }

    fn for_each_line(&mut self, f: &mut dyn FnMut(&str)) -> Result<(), StorageError> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(map_err)?;
        let root_dir = volume.open_root_dir().map_err(map_err)?;

        // Consume the `File` inside a single statement (see `is_empty`): a
        // live binding whose type borrows `root_dir` would block the
        // `close()` moves below. The closure reports errors together with
        // whether the directory and volume still need a best-effort close.
        let open_result = root_dir
            .open_file_in_dir(HISTORY_FILE, Mode::ReadOnly)
            .map(|file| {
                let mut chunk = [0u8; READ_CHUNK];
                let mut line = String::new();
                loop {
                    let n = match file.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) => {
                            file.close().ok();
                            return Err((map_err(e), true));
                        }
                    };
                    for &b in &chunk[..n] {
                        if b == b'\n' {
                            f(line.trim_end_matches('\r'));
                            line.clear();
                        } else if b.is_ascii() {
                            line.push(b as char);
                        } else {
                            // Non-ASCII bytes mean a torn write; poison the line
                            // so the record parser rejects it.
                            warn!("non-ASCII byte in history file");
                            line.push('\u{FFFD}');
                        }
                    }
                }
                // A final unterminated line is a torn tail write; still surface
                // it and let the parser decide.
                if !line.is_empty() {
                    f(line.trim_end_matches('\r'));
                }
                file.close().map_err(|e| (map_err(e), false))
            });

        match open_result {
            Ok(Ok(())) => {}
            Ok(Err((e, close_rest))) => {
                if close_rest {
                    root_dir.close().ok();
                    volume.close().ok();
                }
                return Err(e);
            }
            Err(_e @ embedded_sdmmc::Error::NotFound) => {
                root_dir.close().map_err(map_err)?;
                volume.close().map_err(map_err)?;
                return Ok(());
            }
            Err(e) => {
                root_dir.close().ok();
                volume.close().ok();
                return Err(map_err(e));
            }
        }

        root_dir.close().map_err(map_err)?;
        volume.close().map_err(map_err)?;
        Ok(())
    }
}
