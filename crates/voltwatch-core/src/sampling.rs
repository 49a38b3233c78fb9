//! Raw ADC acquisition and conversion to calibrated readings.
//!
//! Conversion is a pure function of the raw input vector: raw counts are
//! linearly rescaled through the divider ratio onto the monitored voltage
//! range, then mapped onto a clamped 0-100 % state-of-charge window.
//! Out-of-range inputs are clamped, never rejected.

use heapless::Vec;
use log::warn;
use thiserror_no_std::Error;

use crate::clock::WallClock;
use crate::config::{MAX_CHANNELS, MonitorConfig};
use crate::schedule::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdcError {
    /// The converter did not produce a sample for this input.
    #[error("ADC read failed")]
    ReadFailed,
    /// The configured input index does not exist on this board.
    #[error("no such ADC input")]
    NoSuchInput,
}

/// Source of raw converter counts, one per wired analog input.
pub trait AdcSource {
    fn read(&mut self, adc_index: u8) -> Result<u16, AdcError>;
}

/// Latest calibrated state of one monitored channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    pub id: u8,
    pub raw: u16,
    pub voltage: f32,
    pub percentage: f32,
    pub healthy: bool,
    pub sampled_at: Ticks,
}

impl ChannelReading {
    const fn idle(id: u8) -> Self {
        Self {
            id,
            raw: 0,
            voltage: 0.0,
            percentage: 0.0,
            healthy: true,
            sampled_at: 0,
        }
    }
}

/// The full current state served and logged by the rest of the system.
///
/// One slot, rewritten once per sample cycle. The loop is single threaded,
/// so no consumer ever observes a partial update.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    pub readings: Vec<ChannelReading, MAX_CHANNELS>,
    pub time_known: bool,
    pub utc_epoch: u32,
}

impl SystemSnapshot {
    pub fn new(cfg: &MonitorConfig) -> Self {
        let mut readings = Vec::new();
        for ch in &cfg.channels {
            let _ = readings.push(ChannelReading::idle(ch.id));
        }
        Self {
            readings,
            time_known: false,
            utc_epoch: 0,
        }
    }
}

/// Rescale a raw count onto the monitored voltage range.
///
/// `raw / max_adc * reference * (monitored_max / reference)`, kept in the
/// configured form rather than algebraically reduced so a non-unity divider
/// calibration stays visible.
pub fn raw_to_voltage(raw: u16, cfg: &MonitorConfig) -> f32 {
    let scaled = f32::from(raw) * cfg.reference_voltage / f32::from(cfg.max_adc);
    scaled * (cfg.monitored_voltage_max / cfg.reference_voltage)
}

/// Linear map from the configured `[min_voltage, max_voltage]` window onto
/// `[0, 100]`, clamped at both ends.
pub fn voltage_to_percentage(voltage: f32, cfg: &MonitorConfig) -> f32 {
    let lo = cfg.min_voltage();
    let hi = cfg.max_voltage();
    let pct = (voltage - lo) / (hi - lo) * 100.0;
    pct.clamp(0.0, 100.0)
}

/// Read every configured channel and rewrite the snapshot in place.
///
/// A channel whose ADC read fails keeps its previous values; the partial
/// failure is logged and the rest of the cycle continues. The wall clock is
/// captured in the same pass so logged and served timestamps agree with the
/// readings they accompany.
pub fn sample<A: AdcSource, C: WallClock>(
    snapshot: &mut SystemSnapshot,
    cfg: &MonitorConfig,
    adc: &mut A,
    clock: &C,
    now: Ticks,
) {
    for (reading, ch) in snapshot.readings.iter_mut().zip(&cfg.channels) {
        match adc.read(ch.adc_index) {
            Ok(raw) => {
                let voltage = raw_to_voltage(raw, cfg);
                let percentage = voltage_to_percentage(voltage, cfg);
                reading.raw = raw;
                reading.voltage = voltage;
                reading.percentage = percentage;
                reading.healthy = percentage > cfg.healthy_threshold;
                reading.sampled_at = now;
            }
            Err(e) => {
                warn!("channel {} read failed: {:?}", ch.id, e);
            }
        }
    }

    match clock.utc_epoch_if_known() {
        Some(epoch) => {
            snapshot.time_known = true;
            snapshot.utc_epoch = epoch;
        }
        None => {
            snapshot.time_known = false;
            snapshot.utc_epoch = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests_support::FixedClock;
    use crate::config::ChannelConfig;

    pub(crate) struct TableAdc {
        pub values: [Result<u16, AdcError>; MAX_CHANNELS],
    }

    impl AdcSource for TableAdc {
        fn read(&mut self, adc_index: u8) -> Result<u16, AdcError> {
            self.values
                .get(usize::from(adc_index))
                .copied()
                .unwrap_or(Err(AdcError::NoSuchInput))
        }
    }

    fn three_channel_config() -> MonitorConfig {
        let mut cfg = MonitorConfig::default();
        cfg.channels.clear();
        for i in 0..3u8 {
            let _ = cfg.channels.push(ChannelConfig {
                id: i + 1,
                adc_index: i,
            });
        }
        cfg
    }

    #[test]
    fn voltage_matches_fixed_numeric_table() {
        // 3 channels, raw [0, 511, 1023], ref 5.0, monitored max 12.0:
        // voltage = raw * 5.0 / 1023 * (12.0 / 5.0)
        let cfg = three_channel_config();
        assert_eq!(raw_to_voltage(0, &cfg), 0.0);
        assert!((raw_to_voltage(511, &cfg) - 5.9941349).abs() < 1e-4);
        assert!((raw_to_voltage(1023, &cfg) - 12.0).abs() < 1e-5);
    }

    #[test]
    fn voltage_is_monotone_in_raw() {
        let cfg = MonitorConfig::default();
        let mut prev = -1.0f32;
        for raw in 0..=cfg.max_adc {
            let v = raw_to_voltage(raw, &cfg);
            assert!(v >= prev, "voltage decreased at raw={raw}");
            prev = v;
        }
    }

    #[test]
    fn percentage_is_clamped_for_all_raw_inputs() {
        let cfg = MonitorConfig::default();
        for raw in 0..=cfg.max_adc {
            let pct = voltage_to_percentage(raw_to_voltage(raw, &cfg), &cfg);
            assert!((0.0..=100.0).contains(&pct), "pct out of range at raw={raw}");
        }
    }

    #[test]
    fn percentage_floors_below_window_and_caps_above() {
        let cfg = MonitorConfig::default();
        // Below 9.96 V floors at 0, above 12.6 V caps at 100.
        assert_eq!(voltage_to_percentage(4.0, &cfg), 0.0);
        assert_eq!(voltage_to_percentage(9.96, &cfg), 0.0);
        assert_eq!(voltage_to_percentage(13.0, &cfg), 100.0);
        let mid = voltage_to_percentage(11.28, &cfg);
        assert!((mid - 50.0).abs() < 0.01);
    }

    #[test]
    fn sample_rewrites_snapshot_in_place() {
        let cfg = three_channel_config();
        let mut snapshot = SystemSnapshot::new(&cfg);
        let mut adc = TableAdc {
            values: [Ok(0); MAX_CHANNELS],
        };
        adc.values[0] = Ok(0);
        adc.values[1] = Ok(511);
        adc.values[2] = Ok(1023);

        sample(&mut snapshot, &cfg, &mut adc, &FixedClock(Some(1_700_000_000)), 42);

        assert_eq!(snapshot.readings.len(), 3);
        assert_eq!(snapshot.readings[2].raw, 1023);
        assert_eq!(snapshot.readings[2].percentage, 100.0);
        assert!(snapshot.readings[2].healthy);
        assert_eq!(snapshot.readings[0].percentage, 0.0);
        assert!(!snapshot.readings[0].healthy);
        assert_eq!(snapshot.readings[1].sampled_at, 42);
        assert!(snapshot.time_known);
        assert_eq!(snapshot.utc_epoch, 1_700_000_000);
    }

    #[test]
    fn failed_channel_keeps_previous_reading() {
        let cfg = three_channel_config();
        let mut snapshot = SystemSnapshot::new(&cfg);
        let mut adc = TableAdc {
            values: [Ok(1023); MAX_CHANNELS],
        };
        sample(&mut snapshot, &cfg, &mut adc, &FixedClock(None), 10);
        assert_eq!(snapshot.readings[1].raw, 1023);

        adc.values[1] = Err(AdcError::ReadFailed);
        sample(&mut snapshot, &cfg, &mut adc, &FixedClock(None), 20);

        // Channel 2 keeps its old values and timestamp, neighbours advance.
        assert_eq!(snapshot.readings[1].raw, 1023);
        assert_eq!(snapshot.readings[1].sampled_at, 10);
        assert_eq!(snapshot.readings[0].sampled_at, 20);
        assert!(!snapshot.time_known);
        assert_eq!(snapshot.utc_epoch, 0);
    }
}
