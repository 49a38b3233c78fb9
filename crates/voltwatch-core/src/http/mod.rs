//! Minimal HTTP/1.1 request router.
//!
//! One request per connection, `Connection: close` always, no keep-alive,
//! no chunked transfer. The server accumulates bytes until the blank-line
//! terminator (or peer close, or a 1 KiB cap), parses the request line
//! into a typed [`Route`], writes exactly one response, and returns; the
//! caller closes the socket.
//!
//! The history comes in as a pre-collected record list, not as the live
//! store: the caller replays under whatever lock guards the log, releases
//! it, and only then lets this module write to the peer. A stalled peer
//! therefore never holds up anything but its own connection.

mod dashboard;
mod json;

use log::debug;

use crate::config::MonitorConfig;
use crate::sampling::SystemSnapshot;
use crate::storage::LogRecord;

pub use dashboard::DASHBOARD_HTML;

/// Longest request this server reads. Anything beyond a GET line plus a
/// handful of headers is not ours to answer.
pub const MAX_REQUEST_SIZE: usize = 1024;

const NOT_FOUND_BODY: &str = "<h1>404 - Not Found</h1>\n";

/// The fixed route surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Current,
    History,
    NotFound,
}

/// Parse the request line into a route. Query strings are ignored for
/// routing; any non-GET method or unknown path is `NotFound`.
pub fn parse_request(buf: &[u8]) -> Route {
    let Ok(text) = core::str::from_utf8(buf) else {
        return Route::NotFound;
    };
    let request_line = text.lines().next().unwrap_or("");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");

    if method != "GET" {
        return Route::NotFound;
    }
    match target.split('?').next().unwrap_or("") {
        "/" => Route::Dashboard,
        "/api/current" => Route::Current,
        "/api/history" => Route::History,
        _ => Route::NotFound,
    }
}

/// Byte stream of one accepted connection.
///
/// `read` returning 0 means the peer closed. The embedded target backs
/// this with an embassy-net socket, the simulator with a `std` stream
/// under a read timeout.
pub trait Connection {
    type Error: core::fmt::Debug;

    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, Self::Error>>;
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;
}

async fn write_response<C: Connection>(
    conn: &mut C,
    status: &str,
    content_type: &str,
    body: &str,
) -> Result<(), C::Error> {
    conn.write_all(b"HTTP/1.1 ").await?;
    conn.write_all(status.as_bytes()).await?;
    conn.write_all(b"\r\nContent-Type: ").await?;
    conn.write_all(content_type.as_bytes()).await?;
    // Close-delimited bodies; the connection never outlives the response.
    conn.write_all(b"\r\nConnection: close\r\n\r\n").await?;
    conn.write_all(body.as_bytes()).await
}

/// Read one request and answer it.
///
/// Partial requests (peer closed before the terminator) are still routed,
/// matching the reference behaviour; a connection that sends nothing gets
/// no response.
pub async fn serve<C: Connection>(
    conn: &mut C,
    snapshot: &SystemSnapshot,
    cfg: &MonitorConfig,
    history: &[LogRecord],
) -> Result<(), C::Error> {
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0usize;

    loop {
        let n = conn.read(&mut buf[total..]).await?;
        if n == 0 {
            if total == 0 {
                return Ok(());
            }
            break;
        }
        total += n;
        if total >= MAX_REQUEST_SIZE {
            break;
        }
        if buf[..total].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let route = parse_request(&buf[..total]);
    debug!("serving {:?}", route);

    match route {
        Route::Dashboard => write_response(conn, "200 OK", "text/html", DASHBOARD_HTML).await,
        Route::Current => {
            let body = json::render_current(snapshot, cfg);
            write_response(conn, "200 OK", "application/json", &body).await
        }
        Route::History => serve_history(conn, history).await,
        Route::NotFound => {
            write_response(conn, "404 Not Found", "text/html", NOT_FOUND_BODY).await
        }
    }
}

/// Stream the history array record by record, oldest first.
///
/// Lines that failed to parse were already dropped when the caller
/// collected the records; a collection that failed outright (medium
/// unavailable) arrives as an empty list, so a pulled card degrades the
/// endpoint instead of breaking it.
async fn serve_history<C: Connection>(
    conn: &mut C,
    records: &[LogRecord],
) -> Result<(), C::Error> {
    write_response(conn, "200 OK", "application/json", "").await?;
    conn.write_all(b"{\"history\":[").await?;
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            conn.write_all(b",").await?;
        }
        let chunk = json::render_history_record(record);
        conn.write_all(chunk.as_bytes()).await?;
    }
    conn.write_all(b"]}").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::tests_support::FixedClock;
    use crate::config::ChannelConfig;
    use crate::sampling::{AdcError, AdcSource, sample};
    use crate::storage::memory::MemoryMedium;
    use crate::storage::{HistoryLog, LogEntry, LogRecord};
    use alloc::string::String;
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    /// Connection fed from a byte script, delivered in small chunks to
    /// exercise the accumulation loop.
    struct MockConnection {
        input: Vec<u8>,
        pos: usize,
        chunk: usize,
        output: Vec<u8>,
    }

    impl MockConnection {
        fn new(input: &[u8], chunk: usize) -> Self {
            Self {
                input: input.to_vec(),
                pos: 0,
                chunk,
                output: Vec::new(),
            }
        }

        fn response(&self) -> &str {
            core::str::from_utf8(&self.output).unwrap()
        }
    }

    impl Connection for MockConnection {
        type Error = core::convert::Infallible;

        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let remaining = &self.input[self.pos..];
            let n = remaining.len().min(self.chunk).min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }

        async fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
            self.output.extend_from_slice(buf);
            Ok(())
        }
    }

    struct RampAdc;
    impl AdcSource for RampAdc {
        fn read(&mut self, adc_index: u8) -> Result<u16, AdcError> {
            Ok(u16::from(adc_index) * 500)
        }
    }

    fn test_config() -> MonitorConfig {
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

    fn test_snapshot(cfg: &MonitorConfig) -> SystemSnapshot {
        let mut snapshot = SystemSnapshot::new(cfg);
        sample(
            &mut snapshot,
            cfg,
            &mut RampAdc,
            &FixedClock(Some(1_700_000_000)),
            0,
        );
        snapshot
    }

    fn test_history() -> HistoryLog<MemoryMedium> {
        let mut log = HistoryLog::new(MemoryMedium::new(), 3);
        for minute in 0..2u32 {
            let mut rec = LogRecord {
                timestamp: heapless::String::try_from("2023-11-14T22:13:20Z").unwrap(),
                entries: heapless::Vec::new(),
            };
            for ch in 0..3u16 {
                let _ = rec.entries.push(LogEntry {
                    raw: ch * 100 + minute as u16,
                    voltage: 10.5,
                    percentage: 42.0,
                });
            }
            log.append(&rec).unwrap();
        }
        log
    }

    fn run(request: &[u8], chunk: usize) -> String {
        let cfg = test_config();
        let snapshot = test_snapshot(&cfg);
        let records = test_history().collect();
        let mut conn = MockConnection::new(request, chunk);
        block_on(serve(&mut conn, &snapshot, &cfg, &records)).unwrap();
        String::from(conn.response())
    }

    #[test]
    fn root_serves_dashboard_html() {
        let response = run(b"GET / HTTP/1.1\r\nHost: monitor\r\n\r\n", 16);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html"));
        assert!(response.contains("Connection: close"));
        assert!(response.contains("Battery Monitor Dashboard"));
    }

    #[test]
    fn current_serves_one_entry_per_channel() {
        let response = run(b"GET /api/current HTTP/1.1\r\n\r\n", 7);
        assert!(response.contains("Content-Type: application/json"));
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        assert!(body.starts_with("{\"timestamp\":1700000000,"));
        assert!(body.contains("\"datetime\":\"11/14/2023 6:13:20 PM\""));
        assert_eq!(body.matches("\"id\":").count(), 3);
        // adc_index 2 reads 1000 raw: 11.730 V, healthy.
        assert!(body.contains("\"raw\":1000,\"voltage\":11.730,\"percentage\":67.1,\"healthy\":true"));
        // adc_index 0 reads 0 raw: floored and unhealthy.
        assert!(body.contains("\"raw\":0,\"voltage\":0.000,\"percentage\":0.0,\"healthy\":false"));
        assert!(body.ends_with("]}"));
    }

    #[test]
    fn history_replays_the_store_in_order() {
        let response = run(b"GET /api/history HTTP/1.1\r\n\r\n", 64);
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        assert!(body.starts_with("{\"history\":["));
        assert_eq!(body.matches("\"timestamp\":").count(), 2);
        assert_eq!(body.matches("\"raw\":").count(), 6);
        // Oldest record first.
        let first = body.find("\"raw\":0,").unwrap();
        let second = body.find("\"raw\":1,").unwrap();
        assert!(first < second);
        assert!(body.ends_with("]}"));
    }

    #[test]
    fn history_response_uses_only_the_pre_collected_records() {
        // The store is out of the picture once the records are collected:
        // the monitor may keep appending while the response is written and
        // the peer sees the state from collection time.
        let mut log = test_history();
        let records = log.collect();

        let mut late = LogRecord {
            timestamp: heapless::String::try_from("2023-11-14T22:15:20Z").unwrap(),
            entries: heapless::Vec::new(),
        };
        for _ in 0..3 {
            let _ = late.entries.push(LogEntry {
                raw: 999,
                voltage: 11.7,
                percentage: 66.0,
            });
        }
        log.append(&late).unwrap();

        let cfg = test_config();
        let snapshot = test_snapshot(&cfg);
        let mut conn = MockConnection::new(b"GET /api/history HTTP/1.1\r\n\r\n", 64);
        block_on(serve(&mut conn, &snapshot, &cfg, &records)).unwrap();

        let response = String::from(conn.response());
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        assert_eq!(body.matches("\"timestamp\":").count(), 2);
        assert!(!body.contains("\"raw\":999"));
    }

    #[test]
    fn unknown_path_and_method_get_404() {
        let response = run(b"GET /api/nope HTTP/1.1\r\n\r\n", 32);
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        let response = run(b"POST /api/current HTTP/1.1\r\n\r\n", 32);
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn partial_request_is_still_routed_on_peer_close() {
        // Peer disconnects before sending the blank-line terminator.
        let response = run(b"GET /api/current HTTP/1.1\r\n", 8);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn silent_peer_gets_no_response() {
        let response = run(b"", 8);
        assert!(response.is_empty());
    }

    #[test]
    fn query_string_does_not_change_the_route() {
        let response = run(b"GET /api/current?pretty=1 HTTP/1.1\r\n\r\n", 32);
        assert!(response.contains("application/json"));
    }

    #[test]
    fn route_parser_is_exact() {
        assert_eq!(parse_request(b"GET / HTTP/1.1\r\n"), Route::Dashboard);
        assert_eq!(parse_request(b"GET /api/current HTTP/1.1\r\n"), Route::Current);
        assert_eq!(parse_request(b"GET /api/history HTTP/1.1\r\n"), Route::History);
        assert_eq!(parse_request(b"GET /api/currently HTTP/1.1\r\n"), Route::NotFound);
        assert_eq!(parse_request(b"PUT / HTTP/1.1\r\n"), Route::NotFound);
        assert_eq!(parse_request(b"\xff\xfe"), Route::NotFound);
    }
}
