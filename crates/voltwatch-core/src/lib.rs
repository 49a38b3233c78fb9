//! Hardware-independent core library for voltwatch
//!
//! This crate contains all platform-agnostic logic for the voltwatch
//! multi-channel battery monitor: sampling math, health aggregation, the
//! cooperative scheduler, the CSV history store, wall-clock formatting,
//! and the HTTP request router.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and
//! tests).

#![no_std]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod health;
pub mod http;
pub mod monitor;
pub mod sampling;
pub mod schedule;
pub mod storage;
