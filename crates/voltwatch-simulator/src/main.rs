//! Desktop simulator for the voltwatch battery monitor.
//!
//! Runs the full cooperative loop on a single host thread: a synthetic
//! ADC stands in for the divider inputs, the OS clock plays the
//! synchronized time source, `battery.csv` in the working directory backs
//! the history store, and the HTTP surface listens on port 8080. At most
//! one connection is serviced per loop pass, exactly like the device.
//!
//! Delete or chmod the CSV file while it runs to watch the degraded mode:
//! the loop keeps sampling and serving and only warns about durability.

use std::io::{Read as _, Write as _};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use embassy_futures::block_on;
use log::{debug, info, warn};

use voltwatch_core::clock::WallClock;
use voltwatch_core::config::MonitorConfig;
use voltwatch_core::http::{Connection, serve};
use voltwatch_core::monitor::Monitor;
use voltwatch_core::sampling::{AdcError, AdcSource};
use voltwatch_core::schedule::Ticks;
use voltwatch_core::storage::{HistoryLog, HistoryMedium, StorageError};

const LISTEN_ADDR: &str = "0.0.0.0:8080";
const HISTORY_PATH: &str = "battery.csv";

/// Loop pacing, matching the device firmware.
const LOOP_PERIOD: Duration = Duration::from_millis(100);

/// How long a connected peer may dawdle before we give up on it.
const PEER_READ_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Synthetic hardware
// ---------------------------------------------------------------------------

/// Deterministic fake divider inputs that drift over time.
///
/// Most channels hover in the healthy band; the last one swings low enough
/// to trip the health threshold periodically so the indicator and alert
/// paths get exercised.
struct SyntheticAdc {
    start: Instant,
}

impl SyntheticAdc {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl AdcSource for SyntheticAdc {
    fn read(&mut self, adc_index: u8) -> Result<u16, AdcError> {
        let t = self.start.elapsed().as_secs_f32();
        let phase = f32::from(adc_index);
        let raw = if adc_index == 9 {
            // Swings between ~8.7 V and ~11.5 V, crossing the threshold.
            860.0 + 120.0 * (t / 45.0 + phase).sin()
        } else {
            // ~10.3 V to ~11.7 V: always healthy.
            940.0 + 60.0 * (t / 30.0 + phase).sin()
        };
        Ok(raw.clamp(0.0, 1023.0) as u16)
    }
}

/// The OS clock: always synchronized on a host.
struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn utc_epoch_if_known(&self) -> Option<u32> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() as u32)
    }
}

// ---------------------------------------------------------------------------
// File-backed history medium
// ---------------------------------------------------------------------------

struct FileMedium {
    path: PathBuf,
}

impl FileMedium {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HistoryMedium for FileMedium {
    fn append(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|_| StorageError::Unavailable)?;
        file.write_all(bytes).map_err(|_| StorageError::Io)?;
        // Push the record to the OS before the handle drops, like the
        // device flushes before close.
        file.flush().map_err(|_| StorageError::Io)?;
        Ok(bytes.len())
    }

    fn is_empty(&mut self) -> Result<bool, StorageError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(_) => Err(StorageError::Unavailable),
        }
    }

    fn for_each_line(&mut self, f: &mut dyn FnMut(&str)) -> Result<(), StorageError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(_) => return Err(StorageError::Unavailable),
        };
        for line in text.lines() {
            f(line.trim_end_matches('\r'));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP over std sockets
// ---------------------------------------------------------------------------

/// Blocking `TcpStream` behind the core connection seam. The read timeout
/// bounds a stalled peer; a timeout reads as peer silence and ends the
/// request.
struct StdConnection {
    stream: TcpStream,
}

impl Connection for StdConnection {
    type Error = std::io::Error;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.stream.write_all(buf)
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    let cfg = MonitorConfig::default();
    let channel_count = cfg.channel_count();
    info!(
        "voltwatch simulator: {} channels, history at {}, http on {}",
        channel_count, HISTORY_PATH, LISTEN_ADDR
    );

    let mut monitor = Monitor::new(cfg);
    let mut adc = SyntheticAdc::new();
    let clock = SystemWallClock;
    let mut history = HistoryLog::new(FileMedium::new(HISTORY_PATH), channel_count);

    let listener = TcpListener::bind(LISTEN_ADDR).expect("bind http listener");
    listener
        .set_nonblocking(true)
        .expect("nonblocking listener");

    let started = Instant::now();
    let mut last_pins = None;

    loop {
        let now: Ticks = started.elapsed().as_millis() as Ticks;

        let out = monitor.tick(now, &mut adc, &clock, &mut history);

        if last_pins != Some(out.indicator) {
            info!(
                "indicator: green={} red={}",
                out.indicator.green, out.indicator.red
            );
            last_pins = Some(out.indicator);
        }
        if let Some(frame) = out.display {
            info!("lcd | {:<16} | {:<16} |", frame.line0, frame.line1);
        }
        if out.time_sync_due {
            // The OS keeps its own clock synced; nothing to refresh here.
            debug!("time sync interval elapsed");
        }

        // One connection per pass, matching the device's single worker.
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("connection from {peer}");
                if stream.set_nonblocking(false).is_ok()
                    && stream.set_read_timeout(Some(PEER_READ_TIMEOUT)).is_ok()
                {
                    let records = history.collect();
                    let mut conn = StdConnection { stream };
                    if let Err(e) = block_on(serve(
                        &mut conn,
                        monitor.snapshot(),
                        monitor.config(),
                        &records,
                    )) {
                        warn!("request from {peer} failed: {e}");
                    }
                }
                // Dropping the stream closes the connection.
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => warn!("accept failed: {e}"),
        }

        std::thread::sleep(LOOP_PERIOD);
    }
}
