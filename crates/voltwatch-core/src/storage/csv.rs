//! Line-level CSV schema of the history log.
//!
//! Header: `DateTime_UTC,Channel1_Raw,Channel1_Voltage,Channel1_Percentage,...`
//! Record: ISO-8601 UTC timestamp, then `raw,voltage,percentage` per
//! channel, comma separated with no trailing delimiter, LF terminated.
//! Voltage is written at 3 decimal places and percentage at 1.

use alloc::string::String;
use core::fmt::Write as _;

use heapless::Vec;

use super::{LogEntry, LogRecord};

/// Column header line, LF terminated.
pub fn render_header(channel_count: usize) -> String {
    let mut line = String::new();
    line.push_str("DateTime_UTC");
    for i in 1..=channel_count {
        let _ = write!(
            line,
            ",Channel{i}_Raw,Channel{i}_Voltage,Channel{i}_Percentage"
        );
    }
    line.push('\n');
    line
}

/// One record line, LF terminated.
pub fn render_record(record: &LogRecord) -> String {
    let mut line = String::new();
    line.push_str(&record.timestamp);
    for entry in &record.entries {
        let _ = write!(
            line,
            ",{},{:.3},{:.1}",
            entry.raw, entry.voltage, entry.percentage
        );
    }
    line.push('\n');
    line
}

/// Parse one record line (terminator already stripped).
///
/// Returns `None` when the field count does not match the expected channel
/// count or any numeric field fails to parse; the caller skips such lines.
pub fn parse_record(line: &str, channel_count: usize) -> Option<LogRecord> {
    let mut fields = line.split(',');
    let timestamp = fields.next()?;
    let timestamp = heapless::String::try_from(timestamp).ok()?;

    let mut entries = Vec::new();
    for _ in 0..channel_count {
        let raw = fields.next()?.trim().parse::<u16>().ok()?;
        let voltage = fields.next()?.trim().parse::<f32>().ok()?;
        let percentage = fields.next()?.trim().parse::<f32>().ok()?;
        entries
            .push(LogEntry {
                raw,
                voltage,
                percentage,
            })
            .ok()?;
    }
    // Extra trailing fields mean the channel count does not match.
    if fields.next().is_some() {
        return None;
    }
    Some(LogRecord {
        timestamp,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> LogRecord {
        let mut record = LogRecord {
            timestamp: heapless::String::try_from("2023-11-14T22:13:20Z").unwrap(),
            entries: Vec::new(),
        };
        record
            .entries
            .push(LogEntry {
                raw: 1023,
                voltage: 12.0,
                percentage: 100.0,
            })
            .unwrap();
        record
            .entries
            .push(LogEntry {
                raw: 511,
                voltage: 5.9941,
                percentage: 0.0,
            })
            .unwrap();
        record
    }

    #[test]
    fn header_names_each_channel() {
        assert_eq!(
            render_header(2),
            "DateTime_UTC,Channel1_Raw,Channel1_Voltage,Channel1_Percentage,\
             Channel2_Raw,Channel2_Voltage,Channel2_Percentage\n"
        );
    }

    #[test]
    fn record_renders_at_fixed_precision() {
        assert_eq!(
            render_record(&sample_record()),
            "2023-11-14T22:13:20Z,1023,12.000,100.0,511,5.994,0.0\n"
        );
    }

    #[test]
    fn parse_inverts_render() {
        let rendered = render_record(&sample_record());
        let parsed = parse_record(rendered.trim_end(), 2).unwrap();
        assert_eq!(parsed.timestamp.as_str(), "2023-11-14T22:13:20Z");
        assert_eq!(parsed.entries[0].raw, 1023);
        assert!((parsed.entries[0].voltage - 12.0).abs() < 1e-6);
        assert!((parsed.entries[1].voltage - 5.994).abs() < 1e-6);
        assert_eq!(parsed.entries[1].percentage, 0.0);
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        // One field short.
        assert!(parse_record("2023-11-14T22:13:20Z,1023,12.000,100.0,511,5.994", 2).is_none());
        // One channel too many.
        assert!(
            parse_record(
                "2023-11-14T22:13:20Z,1,0.0,0.0,2,0.0,0.0,3,0.0,0.0",
                2
            )
            .is_none()
        );
        // Bare timestamp.
        assert!(parse_record("2023-11-14T22:13:20Z", 2).is_none());
    }

    #[test]
    fn non_numeric_fields_are_rejected() {
        assert!(parse_record("2023-11-14T22:13:20Z,abc,12.0,100.0", 1).is_none());
        assert!(parse_record("2023-11-14T22:13:20Z,1,volts,100.0", 1).is_none());
    }
}
