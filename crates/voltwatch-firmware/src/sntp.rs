//! SNTP wall-clock source.
//!
//! A single 48-byte UDP exchange against pool.ntp.org per refresh. The
//! synchronized epoch is held as (epoch at sync, uptime at sync) so the
//! clock keeps counting between refreshes from the monotonic timer alone.
//! Until the first successful exchange the clock reports unknown and the
//! rest of the system runs on the epoch-zero sentinel.

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use log::{info, warn};

use voltwatch_core::clock::{CivilDateTime, WallClock};

const NTP_SERVER: &str = "pool.ntp.org";
const NTP_PORT: u16 = 123;
/// Seconds between the NTP era (1900) and the Unix epoch.
const NTP_UNIX_OFFSET: u32 = 2_208_988_800;
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);
/// Retry cadence while unsynchronized.
const RETRY_INTERVAL: Duration = Duration::from_secs(15);

/// Shared synchronized-clock state. Epoch 0 means "never synced".
pub struct NetworkTime {
    epoch_at_sync: AtomicU32,
    uptime_at_sync_secs: AtomicU32,
}

impl NetworkTime {
    pub const fn new() -> Self {
        Self {
            epoch_at_sync: AtomicU32::new(0),
            uptime_at_sync_secs: AtomicU32::new(0),
        }
    }

    fn set(&self, epoch: u32) {
        self.uptime_at_sync_secs
            .store(Instant::now().as_secs() as u32, Ordering::Relaxed);
        self.epoch_at_sync.store(epoch, Ordering::Relaxed);
    }
}

impl WallClock for NetworkTime {
    fn utc_epoch_if_known(&self) -> Option<u32> {
        let base = self.epoch_at_sync.load(Ordering::Relaxed);
        if base == 0 {
            return None;
        }
        let since = (Instant::now().as_secs() as u32)
            .wrapping_sub(self.uptime_at_sync_secs.load(Ordering::Relaxed));
        Some(base.wrapping_add(since))
    }
}

/// `embedded-sdmmc` time source fed from the synchronized clock, so file
/// metadata on the card carries real dates once time is known.
pub struct SdTimeSource(pub &'static NetworkTime);

impl embedded_sdmmc::TimeSource for SdTimeSource {
    fn get_timestamp(&self) -> embedded_sdmmc::Timestamp {
        let t = CivilDateTime::from_epoch(i64::from(
            self.0.utc_epoch_if_known().unwrap_or(0),
        ));
        embedded_sdmmc::Timestamp {
            year_since_1970: (t.year - 1970).clamp(0, 255) as u8,
            zero_indexed_month: (t.month - 1) as u8,
            zero_indexed_day: (t.day - 1) as u8,
            hours: t.hour as u8,
            minutes: t.minute as u8,
            seconds: t.second as u8,
        }
    }
}

async fn exchange(stack: Stack<'_>) -> Option<u32> {
    let addrs = stack
        .dns_query(NTP_SERVER, DnsQueryType::A)
        .await
        .map_err(|e| warn!("NTP DNS lookup failed: {e:?}"))
        .ok()?;
    let server = *addrs.first()?;

    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buf = [0u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buf = [0u8; 128];
    let mut socket = UdpSocket::new(stack, &mut rx_meta, &mut rx_buf, &mut tx_meta, &mut tx_buf);
    socket.bind(0).ok()?;

    // Client request: leap unknown, version 4, mode 3; the rest zero.
    let mut packet = [0u8; 48];
    packet[0] = 0x23;
    socket
        .send_to(&packet, (server, NTP_PORT))
        .await
        .map_err(|e| warn!("NTP send failed: {e:?}"))
        .ok()?;

    let mut response = [0u8; 48];
    let (n, _) = with_timeout(EXCHANGE_TIMEOUT, socket.recv_from(&mut response))
        .await
        .map_err(|_| warn!("NTP response timed out"))
        .ok()?
        .map_err(|e| warn!("NTP receive failed: {e:?}"))
        .ok()?;
    if n < 48 {
        warn!("short NTP response ({n} bytes)");
        return None;
    }

    // Transmit timestamp, seconds field.
    let ntp_secs = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    ntp_secs.checked_sub(NTP_UNIX_OFFSET)
}

/// Keep the shared clock fresh: retry quickly until the first sync, then
/// refresh on the configured interval.
#[embassy_executor::task]
pub async fn sntp_task(stack: Stack<'static>, time: &'static NetworkTime, interval_ms: u32) {
    loop {
        stack.wait_config_up().await;
        match exchange(stack).await {
            Some(epoch) => {
                time.set(epoch);
                info!("time synchronized: epoch {epoch}");
                Timer::after(Duration::from_millis(u64::from(interval_ms))).await;
            }
            None => {
                Timer::after(RETRY_INTERVAL).await;
            }
        }
    }
}
