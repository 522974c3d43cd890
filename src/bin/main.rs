#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};
use log::{error, info, warn};

use wireless_sensor::{
    clock::{self, SystemClock},
    config::{
        NTP_SERVER, RECEIVE_RETRY_DELAY_SECS, RECEIVE_TIMEOUT_SECS, UNLOCK_AFTER_CONFIGURE,
        UTC_OFFSET_MINUTES, WIFI_PASSWORD, WIFI_SSID,
    },
    display::StatusDisplay,
    hardware::{Cc1101Hardware, SSD1306Hardware},
    model::Model,
    network, radio,
};
use wireless_sensor_core::{Receiver, ReceiverOptions};

const HEART_BEAT_INTERVAL_MS: u64 = 60_000;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn run_heartbeat() {
    loop {
        log::debug!("system is alive");
        Timer::after(Duration::from_millis(HEART_BEAT_INTERVAL_MS)).await;
    }
}

fn halt(reason: &str) -> ! {
    error!("{}", reason);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    // e.g. ESP_LOG=info,wireless_sensor_core::cc1101=warn
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 72 * 1024);

    info!("=== wireless-sensor ===");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    if let Err(e) = spawner.spawn(run_heartbeat()) {
        warn!("failed to spawn heartbeat task: {:?}", e);
    }

    let stack: Option<Stack<'static>> = match WIFI_SSID {
        Some(ssid) => match network::start(&spawner, peripherals.WIFI, ssid, WIFI_PASSWORD) {
            Ok(stack) => {
                if let Err(e) = spawner.spawn(network::time_sync(stack, NTP_SERVER)) {
                    warn!("failed to spawn time sync task: {:?}", e);
                }
                Some(stack)
            }
            Err(e) => {
                error!("network unavailable: {}", e);
                None
            }
        },
        None => {
            info!("WIFI_SSID not set, timestamps count from boot");
            None
        }
    };

    let mut display = match SSD1306Hardware::new(peripherals.I2C1, peripherals.GPIO2, peripherals.GPIO1)
        .and_then(StatusDisplay::new)
    {
        Ok(display) => Some(display),
        Err(e) => {
            warn!("continuing without display: {}", e);
            None
        }
    };

    let cc1101 = match Cc1101Hardware::new(
        peripherals.SPI2,
        peripherals.GPIO10,
        peripherals.GPIO11,
        peripherals.GPIO13,
        peripherals.GPIO12,
        peripherals.GPIO9,
    ) {
        Ok(hardware) => hardware,
        Err(e) => halt(e),
    };

    let mut options = ReceiverOptions::new(RECEIVE_TIMEOUT_SECS);
    options.unlock_after_configure = UNLOCK_AFTER_CONFIGURE;
    let mut receiver = Receiver::new(
        radio::shared_radio(cc1101),
        SystemClock::new(UTC_OFFSET_MINUTES * 60),
        options,
    );

    let mut model = Model::new();
    loop {
        // redrawn before every wait, the first one included
        model.ip_address = stack.as_ref().and_then(network::ip_address);
        model.clock_synchronized = clock::is_synchronized();
        if let Some(display) = display.as_mut()
            && let Err(e) = model.render(display)
        {
            warn!("display update failed: {}", e);
        }

        match receiver.next().await {
            Ok(Some(measurement)) => {
                esp_println::println!("{}", measurement);
                model.record(measurement);
            }
            Ok(None) => model.record_timeout(),
            Err(e) => {
                error!("receiving failed: {}", e);
                Timer::after(Duration::from_secs(RECEIVE_RETRY_DELAY_SECS)).await;
            }
        }
    }
}
