#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::{Duration, Instant, Timer};
use embassy_sync::mutex::Mutex;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rng::Rng;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::WifiDevice;
use log::info;
use rtt_target::rprintln;
use static_cell::StaticCell;

use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;

use voltwatch_core::config::MonitorConfig;
use voltwatch_core::monitor::Monitor;
use voltwatch_core::sampling::SystemSnapshot;
use voltwatch_core::storage::HistoryLog;
use voltwatch_core::storage::sd_card::SdCardMedium;

use voltwatch_firmware::adc::BoardAdc;
use voltwatch_firmware::net::{http_worker, wifi_task};
use voltwatch_firmware::sntp::{NetworkTime, SdTimeSource, sntp_task};
use voltwatch_firmware::{SharedHistory, SharedSnapshot};

/// Loop pacing; every scheduled activity is a multiple of this.
const LOOP_PERIOD: Duration = Duration::from_millis(100);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// Default app descriptor required by the esp-idf bootloader.
esp_bootloader_esp_idf::esp_app_desc!();

static NETWORK_TIME: NetworkTime = NetworkTime::new();
static CONFIG: StaticCell<MonitorConfig> = StaticCell::new();
static SNAPSHOT: StaticCell<SharedSnapshot> = StaticCell::new();
static HISTORY: StaticCell<SharedHistory> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("voltwatch firmware starting");

    let cfg: &'static MonitorConfig = CONFIG.init(MonitorConfig::default());
    let channel_count = cfg.channel_count();

    // Status LEDs: green solid when all channels are healthy, red blinking
    // on alert.
    let mut red_led = Output::new(peripherals.GPIO12, Level::Low, OutputConfig::default());
    let mut green_led = Output::new(peripherals.GPIO13, Level::Low, OutputConfig::default());

    // Battery dividers on ADC1.
    let mut adc = BoardAdc::new(
        peripherals.ADC1,
        peripherals.GPIO1,
        peripherals.GPIO2,
        peripherals.GPIO3,
        peripherals.GPIO4,
        peripherals.GPIO5,
        peripherals.GPIO6,
        peripherals.GPIO7,
        peripherals.GPIO8,
        peripherals.GPIO9,
        peripherals.GPIO10,
    );

    // SD card on SPI2. Card access stays blocking; appends happen once a
    // minute and open/write/flush/close per record.
    let spi_bus = Spi::new(peripherals.SPI2, SpiConfig::default())
        .unwrap()
        .with_sck(peripherals.GPIO36)
        .with_mosi(peripherals.GPIO35)
        .with_miso(peripherals.GPIO37);
    let sd_cs = Output::new(peripherals.GPIO34, Level::High, OutputConfig::default());
    let sd_spi = ExclusiveDevice::new_no_delay(spi_bus, sd_cs).unwrap();
    let sd_card = SdCard::new(sd_spi, embassy_time::Delay);
    let medium = SdCardMedium::new(sd_card, SdTimeSource(&NETWORK_TIME));
    let history: &'static SharedHistory =
        HISTORY.init(Mutex::new(HistoryLog::new(medium, channel_count)));

    let snapshot: &'static SharedSnapshot =
        SNAPSHOT.init(Mutex::new(SystemSnapshot::new(cfg)));

    // Wi-Fi and the network stack.
    let radio_init = esp_radio::init().expect("radio controller init");
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(&radio_init, peripherals.WIFI, Default::default())
            .expect("Wi-Fi controller init");

    let mut rng = Rng::new(peripherals.RNG);
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );

    info!("advertised hostname: {}.local", cfg.hostname());

    spawner.spawn(net_task(runner)).expect("net task spawn");
    spawner
        .spawn(wifi_task(wifi_controller))
        .expect("wifi task spawn");
    spawner
        .spawn(sntp_task(stack, &NETWORK_TIME, cfg.time_sync_interval_ms))
        .expect("sntp task spawn");
    spawner
        .spawn(http_worker(stack, snapshot, history, cfg))
        .expect("http worker spawn");

    let mut monitor = Monitor::new(cfg.clone());

    loop {
        let now = Instant::now().as_millis() as u32;

        let out = {
            // Appends happen inside tick; hold the history lock only for
            // the duration of the pass.
            let mut log = history.lock().await;
            monitor.tick(now, &mut adc, &NETWORK_TIME, &mut *log)
        };

        // Publish the fresh snapshot for the HTTP worker.
        *snapshot.lock().await = monitor.snapshot().clone();

        red_led.set_level(if out.indicator.red {
            Level::High
        } else {
            Level::Low
        });
        green_led.set_level(if out.indicator.green {
            Level::High
        } else {
            Level::Low
        });

        if let Some(frame) = out.display {
            // The 16x2 panel is not fitted on this board revision; frames
            // go to the console instead.
            info!("lcd | {:<16} | {:<16} |", frame.line0, frame.line1);
        }
        // The SNTP task keeps its own cadence; the schedule output is
        // only consumed on targets that drive the sync themselves.
        let _ = out.time_sync_due;

        Timer::after(LOOP_PERIOD).await;
    }
}
