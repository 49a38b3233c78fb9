//! ESP32-S3 glue for the voltwatch battery monitor.
//!
//! Everything platform-specific lives here: the ADC pin mapping, Wi-Fi
//! and HTTP worker tasks, the SNTP client, and the SD card plumbing. All
//! monitoring logic comes from `voltwatch-core`.

#![no_std]

extern crate alloc;

pub mod adc;
pub mod net;
pub mod sntp;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

use voltwatch_core::sampling::SystemSnapshot;
use voltwatch_core::storage::HistoryLog;
use voltwatch_core::storage::sd_card::SdCardMedium;

use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_hal_bus::spi::NoDelay;
use esp_hal::Blocking;
use esp_hal::gpio::Output;
use esp_hal::spi::master::Spi;

/// SPI device the SD card sits on (shared bus, exclusive chip select).
pub type SdSpiDevice = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, NoDelay>;

/// Concrete history log type for this board.
pub type BoardHistoryLog =
    HistoryLog<SdCardMedium<SdSpiDevice, embassy_time::Delay, sntp::SdTimeSource>>;

/// Snapshot shared between the monitor loop and the HTTP worker. The
/// worker clones it under the lock, so the lock is never held across
/// socket I/O.
pub type SharedSnapshot = Mutex<CriticalSectionRawMutex, SystemSnapshot>;

/// History log shared between the monitor loop (appends) and the HTTP
/// worker (replays). The lock covers card access only: the worker collects
/// the records under it and releases it before writing to the peer, so the
/// longest stall either side sees is one blocking SD operation.
pub type SharedHistory = Mutex<CriticalSectionRawMutex, BoardHistoryLog>;
