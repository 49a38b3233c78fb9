//! Static configuration for a voltwatch deployment.
//!
//! Everything here is fixed at start; there is no runtime reload. The
//! defaults mirror the reference hardware: ten 12 V lead-acid batteries
//! behind voltage dividers on a 10-bit ADC with a 5 V reference.

use core::fmt::Write as _;

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::schedule::Ticks;

/// Upper bound on monitored channels, sized to the reference board's
/// analog input count.
pub const MAX_CHANNELS: usize = 16;

/// One monitored analog input mapped to one battery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Battery identifier as shown on the dashboard (1-based).
    pub id: u8,
    /// Index of the ADC input this channel is wired to.
    pub adc_index: u8,
}

/// Full monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub channels: Vec<ChannelConfig, MAX_CHANNELS>,
    /// Full-scale ADC reading (1023 for a 10-bit converter).
    pub max_adc: u16,
    /// ADC reference voltage in volts.
    pub reference_voltage: f32,
    /// Maximum battery voltage the divider maps onto the reference.
    pub monitored_voltage_max: f32,
    /// Fraction of `monitored_voltage_max` that reads as 0 %.
    pub percent_floor_ratio: f32,
    /// Fraction of `monitored_voltage_max` that reads as 100 %.
    pub percent_ceil_ratio: f32,
    /// A channel strictly above this percentage is healthy.
    pub healthy_threshold: f32,
    pub sample_interval_ms: Ticks,
    pub display_interval_ms: Ticks,
    pub indicator_blink_ms: Ticks,
    pub log_interval_ms: Ticks,
    pub time_sync_interval_ms: Ticks,
    /// Local UTC offset in seconds, used only for the dashboard datetime.
    pub timezone_offset_secs: i32,
    /// Device identifier appended to the advertised network name.
    pub device_id: String<16>,
}

impl MonitorConfig {
    /// Voltage that maps to 0 % state of charge.
    pub fn min_voltage(&self) -> f32 {
        self.monitored_voltage_max * self.percent_floor_ratio
    }

    /// Voltage that maps to 100 % state of charge.
    pub fn max_voltage(&self) -> f32 {
        self.monitored_voltage_max * self.percent_ceil_ratio
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Advertised mDNS hostname, `battery-monitor-<device_id>`.
    pub fn hostname(&self) -> String<36> {
        let mut name = String::new();
        let _ = write!(name, "battery-monitor-{}", self.device_id);
        name
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let mut channels = Vec::new();
        for i in 0..10u8 {
            // Capacity is MAX_CHANNELS >= 10.
            let _ = channels.push(ChannelConfig {
                id: i + 1,
                adc_index: i,
            });
        }
        let mut device_id = String::new();
        let _ = device_id.push_str("3572");
        Self {
            channels,
            max_adc: 1023,
            reference_voltage: 5.0,
            monitored_voltage_max: 12.0,
            percent_floor_ratio: 0.83,
            percent_ceil_ratio: 1.05,
            healthy_threshold: 20.0,
            sample_interval_ms: 1_000,
            display_interval_ms: 2_000,
            indicator_blink_ms: 500,
            log_interval_ms: 60_000,
            time_sync_interval_ms: 3_600_000,
            timezone_offset_secs: -4 * 3600,
            device_id,
        }
    }
}
