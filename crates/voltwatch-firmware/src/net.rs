//! Wi-Fi bring-up and the HTTP worker.
//!
//! One worker services one connection at a time on port 80: accept, let
//! the core router read and answer the single request, abort the socket,
//! accept again. Serving never blocks the monitor loop: the worker clones
//! the snapshot and replays the history under their locks, releases both,
//! and only then touches the socket, so a stalled peer stalls nothing but
//! its own connection.

use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Timer};
use embedded_io_async::Write as _;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiEvent, WifiState};
use log::{info, warn};

use voltwatch_core::config::MonitorConfig;
use voltwatch_core::http::{Connection, serve};

use crate::{SharedHistory, SharedSnapshot};

const HTTP_PORT: u16 = 80;
/// Bounds a stalled or silent peer so it cannot pin the worker forever.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

pub const WIFI_SSID: &str = match option_env!("VOLTWATCH_WIFI_SSID") {
    Some(s) => s,
    None => "voltwatch",
};
pub const WIFI_PASSWORD: &str = match option_env!("VOLTWATCH_WIFI_PASSWORD") {
    Some(s) => s,
    None => "",
};

/// Keep the station associated; esp-radio drops us back here on
/// disconnect.
#[embassy_executor::task]
pub async fn wifi_task(mut controller: WifiController<'static>) {
    loop {
        if esp_radio::wifi::sta_state() == WifiState::StaConnected {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("Wi-Fi disconnected");
            Timer::after(Duration::from_secs(5)).await;
        }
        if !matches!(controller.is_started(), Ok(true)) {
            let config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(WIFI_SSID.into())
                    .with_password(WIFI_PASSWORD.into()),
            );
            if let Err(e) = controller.set_config(&config) {
                warn!("Wi-Fi config rejected: {e:?}");
            }
            if let Err(e) = controller.start_async().await {
                warn!("Wi-Fi start failed: {e:?}");
                Timer::after(Duration::from_secs(5)).await;
                continue;
            }
        }
        match controller.connect_async().await {
            Ok(()) => info!("Wi-Fi connected to {WIFI_SSID}"),
            Err(e) => {
                warn!("Wi-Fi connect failed: {e:?}");
                Timer::after(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Adapter from an accepted embassy-net socket to the core router's
/// connection seam.
struct SocketConnection<'a, 'b> {
    socket: &'a mut TcpSocket<'b>,
}

impl Connection for SocketConnection<'_, '_> {
    type Error = embassy_net::tcp::Error;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.socket.read(buf).await {
            Ok(n) => Ok(n),
            // Peer half-close ends the request, it is not a failure.
            Err(embassy_net::tcp::Error::ConnectionReset) => Ok(0),
            Err(e) => Err(e),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.socket.write_all(buf).await
    }
}

#[embassy_executor::task]
pub async fn http_worker(
    stack: Stack<'static>,
    snapshot: &'static SharedSnapshot,
    history: &'static SharedHistory,
    cfg: &'static MonitorConfig,
) {
    let mut rx_buf = [0u8; 1024];
    let mut tx_buf = [0u8; 1024];

    info!("HTTP worker starting (port {HTTP_PORT})");

    loop {
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        match socket.accept(HTTP_PORT).await {
            Ok(()) => {
                // Copy everything out before any socket I/O; neither lock
                // is held while the peer is being written to.
                let current = snapshot.lock().await.clone();
                let records = history.lock().await.collect();
                let mut conn = SocketConnection {
                    socket: &mut socket,
                };
                if let Err(e) = serve(&mut conn, &current, cfg, &records).await {
                    warn!("connection handling error: {e:?}");
                }
                let _ = socket.flush().await;
            }
            Err(e) => {
                warn!("accept error: {e:?}");
                Timer::after(Duration::from_millis(200)).await;
            }
        }

        socket.abort();
    }
}
