//! Hand-rendered JSON bodies for the API routes.
//!
//! No JSON crate: the two documents are small, the shapes are fixed, and
//! the float precision (voltage 3 dp, percentage 1 dp) must match the
//! durable log exactly.

use alloc::string::String;
use core::fmt::Write as _;

use crate::clock::format_local_datetime;
use crate::config::MonitorConfig;
use crate::sampling::SystemSnapshot;
use crate::storage::LogRecord;

/// Body of `GET /api/current`.
pub fn render_current(snapshot: &SystemSnapshot, cfg: &MonitorConfig) -> String {
    let epoch = snapshot.time_known.then_some(snapshot.utc_epoch);
    let datetime = format_local_datetime(epoch, cfg.timezone_offset_secs);

    let mut body = String::new();
    let _ = write!(
        body,
        "{{\"timestamp\":{},\"datetime\":\"{}\",\"batteries\":[",
        epoch.unwrap_or(0),
        datetime
    );
    for (i, r) in snapshot.readings.iter().enumerate() {
        if i > 0 {
            body.push(',');
        }
        let _ = write!(
            body,
            "{{\"id\":{},\"raw\":{},\"voltage\":{:.3},\"percentage\":{:.1},\"healthy\":{}}}",
            r.id, r.raw, r.voltage, r.percentage, r.healthy
        );
    }
    body.push_str("]}");
    body
}

/// One element of the `history` array in `GET /api/history`.
pub fn render_history_record(record: &LogRecord) -> String {
    let mut chunk = String::new();
    let _ = write!(chunk, "{{\"timestamp\":\"{}\",\"data\":[", record.timestamp);
    for (i, entry) in record.entries.iter().enumerate() {
        if i > 0 {
            chunk.push(',');
        }
        let _ = write!(
            chunk,
            "{{\"raw\":{},\"voltage\":{},\"percentage\":{}}}",
            entry.raw, entry.voltage, entry.percentage
        );
    }
    chunk.push_str("]}");
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LogEntry;

    #[test]
    fn current_reports_zero_timestamp_before_sync() {
        let cfg = MonitorConfig::default();
        let snapshot = SystemSnapshot::new(&cfg);
        let body = render_current(&snapshot, &cfg);
        assert!(body.starts_with("{\"timestamp\":0,\"datetime\":\"Time not synced\""));
        assert_eq!(body.matches("\"id\":").count(), cfg.channel_count());
    }

    #[test]
    fn history_record_preserves_written_precision() {
        let mut record = LogRecord {
            timestamp: heapless::String::try_from("2023-11-14T22:13:20Z").unwrap(),
            entries: heapless::Vec::new(),
        };
        let _ = record.entries.push(LogEntry {
            raw: 511,
            voltage: 5.994,
            percentage: 13.2,
        });
        assert_eq!(
            render_history_record(&record),
            "{\"timestamp\":\"2023-11-14T22:13:20Z\",\
             \"data\":[{\"raw\":511,\"voltage\":5.994,\"percentage\":13.2}]}"
        );
    }
}
