//! Interval bookkeeping for the cooperative loop.
//!
//! Every periodic activity owns one [`ScheduleEntry`]. Due-ness is decided
//! with wrapping unsigned subtraction, so correctness holds across a tick
//! counter overflow without special-casing: `now.wrapping_sub(last_fired)`
//! is the elapsed interval modulo 2^32 whether or not the counter wrapped
//! in between.
//!
//! The scheduler gives a lower bound only: an activity never fires before
//! its interval has elapsed, and fires as soon as the loop gets to it
//! afterwards.

/// Free-running millisecond counter. Wraps roughly every 49.7 days.
pub type Ticks = u32;

/// Interval state for one periodic activity.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEntry {
    interval: Ticks,
    last_fired: Ticks,
}

impl ScheduleEntry {
    pub const fn new(interval: Ticks) -> Self {
        Self {
            interval,
            last_fired: 0,
        }
    }

    /// True once `interval` ticks have elapsed since the last fire.
    pub fn due(&self, now: Ticks) -> bool {
        now.wrapping_sub(self.last_fired) >= self.interval
    }

    pub fn mark_fired(&mut self, now: Ticks) {
        self.last_fired = now;
    }

    /// Convenience: check and mark in one step.
    pub fn fire_if_due(&mut self, now: Ticks) -> bool {
        if self.due(now) {
            self.mark_fired(now);
            true
        } else {
            false
        }
    }
}

/// The fixed set of periodic activities in the monitor loop.
///
/// When several are due in the same pass they are handled in a fixed
/// priority order: sample, indicator, log, request serve.
#[derive(Debug, Clone, Copy)]
pub struct Schedules {
    pub sample: ScheduleEntry,
    pub display: ScheduleEntry,
    pub log: ScheduleEntry,
    pub time_sync: ScheduleEntry,
}

impl Schedules {
    pub const fn new(
        sample_ms: Ticks,
        display_ms: Ticks,
        log_ms: Ticks,
        time_sync_ms: Ticks,
    ) -> Self {
        Self {
            sample: ScheduleEntry::new(sample_ms),
            display: ScheduleEntry::new(display_ms),
            log: ScheduleEntry::new(log_ms),
            time_sync: ScheduleEntry::new(time_sync_ms),
        }
    }
}
