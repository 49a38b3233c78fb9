//! The cooperative monitor loop.
//!
//! One [`Monitor::tick`] multiplexes the periodic activities inside a
//! single non-preemptive loop pass, in fixed priority order: sample,
//! indicator, display, log. Request serving is deliberately not in here:
//! connection I/O blocks, so each target isolates it (a dedicated worker
//! task on the device, a non-blocking poll after each tick in the
//! simulator) and reads the snapshot this loop produces. Within one pass
//! the sampler always runs before the aggregator, log, or any consumer of
//! the snapshot, so a served or logged value is never older than the most
//! recent completed sample.

use core::fmt::Write as _;

use heapless::String;
use log::{info, warn};

use crate::clock::{WallClock, format_utc_timestamp};
use crate::config::MonitorConfig;
use crate::health::{IndicatorPins, IndicatorState, aggregate};
use crate::sampling::{AdcSource, SystemSnapshot, sample};
use crate::schedule::{Schedules, Ticks};
use crate::storage::{HistoryLog, HistoryMedium, LogEntry, LogRecord};

/// Two lines for a 16x2 character display, cycling one battery per
/// refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    pub line0: String<16>,
    pub line1: String<16>,
}

/// What one loop pass asks the target to do.
#[derive(Debug, Clone)]
pub struct TickOutput {
    pub indicator: IndicatorPins,
    /// Present when the display refresh interval elapsed.
    pub display: Option<DisplayFrame>,
    /// True when the wall-clock source should be refreshed. The sync
    /// protocol itself is the target's concern.
    pub time_sync_due: bool,
}

pub struct Monitor {
    cfg: MonitorConfig,
    snapshot: SystemSnapshot,
    schedules: Schedules,
    indicator: IndicatorState,
    display_index: usize,
}

impl Monitor {
    pub fn new(cfg: MonitorConfig) -> Self {
        let snapshot = SystemSnapshot::new(&cfg);
        let schedules = Schedules::new(
            cfg.sample_interval_ms,
            cfg.display_interval_ms,
            cfg.log_interval_ms,
            cfg.time_sync_interval_ms,
        );
        Self {
            cfg,
            snapshot,
            schedules,
            indicator: IndicatorState::new(),
            display_index: 0,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.cfg
    }

    pub fn snapshot(&self) -> &SystemSnapshot {
        &self.snapshot
    }

    /// Run one pass of the cooperative loop.
    ///
    /// A history failure (medium gone, zero-byte write) is logged and
    /// otherwise ignored: sampling, serving, and the indicator are
    /// unaffected by lost durability, and the append is retried at the
    /// next logging interval.
    pub fn tick<A: AdcSource, C: WallClock, M: HistoryMedium>(
        &mut self,
        now: Ticks,
        adc: &mut A,
        clock: &C,
        history: &mut HistoryLog<M>,
    ) -> TickOutput {
        if self.schedules.sample.fire_if_due(now) {
            sample(&mut self.snapshot, &self.cfg, adc, clock, now);
        }

        // Health is recomputed fresh every pass, never cached.
        let alert = aggregate(&self.snapshot);
        let indicator = self
            .indicator
            .update(alert, now, self.cfg.indicator_blink_ms);

        let display = self
            .schedules
            .display
            .fire_if_due(now)
            .then(|| self.next_display_frame());

        if self.schedules.log.fire_if_due(now) {
            let record = self.build_record();
            match history.append(&record) {
                Ok(bytes) => info!("history record written ({bytes} bytes)"),
                Err(e) => warn!("history append failed: {e}; continuing without durable log"),
            }
        }

        let time_sync_due = self.schedules.time_sync.fire_if_due(now);

        TickOutput {
            indicator,
            display,
            time_sync_due,
        }
    }

    fn build_record(&self) -> LogRecord {
        let epoch = self.snapshot.time_known.then_some(self.snapshot.utc_epoch);
        let mut record = LogRecord {
            timestamp: format_utc_timestamp(epoch),
            entries: heapless::Vec::new(),
        };
        for r in &self.snapshot.readings {
            let _ = record.entries.push(LogEntry {
                raw: r.raw,
                voltage: r.voltage,
                percentage: r.percentage,
            });
        }
        record
    }

    fn next_display_frame(&mut self) -> DisplayFrame {
        let mut frame = DisplayFrame {
            line0: String::new(),
            line1: String::new(),
        };
        let Some(reading) = self.snapshot.readings.get(self.display_index) else {
            let _ = frame.line0.push_str("No channels");
            return frame;
        };
        let _ = write!(frame.line0, "Bat{}: {:.2}V", reading.id, reading.voltage);
        let _ = write!(
            frame.line1,
            "{:.0}% {}",
            reading.percentage,
            if reading.healthy { "OK" } else { "LOW" }
        );
        self.display_index = (self.display_index + 1) % self.snapshot.readings.len().max(1);
        frame
    }
}
