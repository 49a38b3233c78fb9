//! Health aggregation and the status indicator state machine.
//!
//! Aggregation has no hysteresis: the alert state can flip on every cycle
//! purely from the latest sample. Debouncing is an explicit non-goal.

use crate::sampling::SystemSnapshot;
use crate::schedule::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Normal,
    Alert,
}

/// `Alert` iff at least one channel is unhealthy, recomputed fresh from the
/// snapshot every cycle.
pub fn aggregate(snapshot: &SystemSnapshot) -> AlertState {
    if snapshot.readings.iter().any(|r| !r.healthy) {
        AlertState::Alert
    } else {
        AlertState::Normal
    }
}

/// Desired level of the two status LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorPins {
    pub green: bool,
    pub red: bool,
}

/// Two-state indicator: solid green while everything is healthy, red
/// toggling every blink interval while any channel is unhealthy.
///
/// Transitions follow the aggregator immediately; the machine runs for as
/// long as the device is powered.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorState {
    led_on: bool,
    last_toggle: Ticks,
}

impl IndicatorState {
    pub const fn new() -> Self {
        Self {
            led_on: false,
            last_toggle: 0,
        }
    }

    pub fn update(&mut self, state: AlertState, now: Ticks, blink_ms: Ticks) -> IndicatorPins {
        match state {
            AlertState::Normal => IndicatorPins {
                green: true,
                red: false,
            },
            AlertState::Alert => {
                if now.wrapping_sub(self.last_toggle) >= blink_ms {
                    self.led_on = !self.led_on;
                    self.last_toggle = now;
                }
                IndicatorPins {
                    green: false,
                    red: self.led_on,
                }
            }
        }
    }
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self::new()
    }
}
