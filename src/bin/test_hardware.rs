#![no_std]
#![no_main]

use core::num::NonZeroU32;
use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use wireless_sensor::{clock::SystemClock, hardware::Cc1101Hardware, radio};
use wireless_sensor_core::{
    Reading, ReceptionLog, Receiver, ReceiverOptions, Timestamp,
    ft017th::{self, Message},
    traits::Transceiver,
};

/// Transmission captured from an FT017TH at 24.0°C and 47.2%
const SIGNAL: [u8; ft017th::TRANSMISSION_LENGTH_BYTES] = [
    0xFF, 0xA8, 0xB3, 0x20, 0x90, 0x05, 0xEF, 0x21, 0xFF, 0xD4, 0x59, 0x90, 0x48, 0x02, 0xF7,
    0x90, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

const LIVE_RECEIVE_TIMEOUT_SECS: NonZeroU32 = match NonZeroU32::new(180) {
    Some(secs) => secs,
    None => panic!("timeout must not be zero"),
};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

// Test result tracking
struct TestResults {
    passed: u32,
    failed: u32,
    skipped: u32,
    total: u32,
}

impl TestResults {
    fn new() -> Self {
        Self {
            passed: 0,
            failed: 0,
            skipped: 0,
            total: 0,
        }
    }

    fn assert(&mut self, condition: bool, test_name: &str) {
        self.total += 1;
        if condition {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED", test_name);
        }
    }

    fn assert_eq<T: PartialEq + core::fmt::Debug>(&mut self, left: T, right: T, test_name: &str) {
        self.total += 1;
        if left == right {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!("  ✗ {} FAILED: {:?} != {:?}", test_name, left, right);
        }
    }

    fn assert_close(&mut self, value: f32, expected: f32, tolerance: f32, test_name: &str) {
        self.total += 1;
        if (value - expected).abs() < tolerance {
            self.passed += 1;
            esp_println::println!("  ✓ {}", test_name);
        } else {
            self.failed += 1;
            esp_println::println!(
                "  ✗ {} FAILED: {:.2} not close to {:.2} (tolerance: {:.2})",
                test_name,
                value,
                expected,
                tolerance
            );
        }
    }

    /// Checks depending on the environment, e.g. a sensor in range
    fn skip(&mut self, test_name: &str, reason: &str) {
        self.total += 1;
        self.skipped += 1;
        esp_println::println!("  - {} skipped: {}", test_name, reason);
    }

    fn print_summary(&self) {
        esp_println::println!("\n==========================================");
        esp_println::println!("Test Summary:");
        esp_println::println!("  Total:  {}", self.total);
        esp_println::println!("  Passed: {}", self.passed);
        esp_println::println!("  Failed: {}", self.failed);
        esp_println::println!("  Skipped: {}", self.skipped);
        if self.failed == 0 {
            esp_println::println!("\n✓ ALL TESTS PASSED!");
        } else {
            esp_println::println!("\n✗ SOME TESTS FAILED");
        }
        esp_println::println!("==========================================");
    }
}

fn test_decoder(results: &mut TestResults) {
    esp_println::println!("\n[TEST] FT017TH Decoder Tests");

    match ft017th::parse_transmission(&SIGNAL) {
        Ok(message) => {
            results.assert_eq(
                message.bits() >> 57,
                0xFF,
                "message prefix is all ones",
            );
            match message.decode() {
                Ok(reading) => {
                    results.assert_close(
                        reading.temperature_degrees_celsius,
                        23.99,
                        0.01,
                        "decoded temperature",
                    );
                    results.assert_close(
                        reading.relative_humidity,
                        0.472,
                        0.001,
                        "decoded relative humidity",
                    );
                }
                Err(e) => {
                    esp_println::println!("    {}", e);
                    results.assert(false, "decode message");
                }
            }
        }
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "parse transmission");
        }
    }

    let mut garbled = SIGNAL;
    garbled[12] = 0x47;
    results.assert(
        ft017th::parse_transmission(&garbled).is_err(),
        "mismatching repeats rejected",
    );
    results.assert(
        Message::from_bits(0).decode().is_err(),
        "invalid prefix rejected",
    );
}

fn reading(temperature: f32) -> Reading {
    Reading {
        temperature_degrees_celsius: temperature,
        relative_humidity: 0.5,
    }
}

fn test_reception_log(results: &mut TestResults) {
    esp_println::println!("\n[TEST] ReceptionLog Tests");
    let at = Timestamp::utc(1_607_335_200);

    let mut log = ReceptionLog::new();
    log.record(reading(22.5).at(at));
    results.assert_eq(
        log.average_temperature(),
        Some(22.5),
        "single measurement average",
    );
    results.assert_eq(
        log.latest_line().as_str(),
        "22.5C 50.0%",
        "latest measurement line",
    );

    // Rolling window of the five latest
    let mut log = ReceptionLog::new();
    for i in 0..5 {
        log.record(reading((i * 10 + 2) as f32).at(at));
    }
    log.record(reading(100.0).at(at));
    if let Some(avg) = log.average_temperature() {
        results.assert_close(avg, 41.6, 0.2, "rolling window average");
    } else {
        results.assert(false, "rolling window average (None returned)");
    }

    log.record_timeout();
    results.assert_eq(log.received(), 6, "received count");
    results.assert_eq(log.timeouts(), 1, "timeout count");
}

async fn test_cc1101(results: &mut TestResults, hardware: Cc1101Hardware) {
    esp_println::println!("\n[TEST] CC1101 Tests");

    let mut radio = radio::shared_radio(hardware);
    match radio.open().await {
        Ok(()) => results.assert(true, "CC1101 reset and identified"),
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "CC1101 reset and identified");
            return;
        }
    }
    results.assert(
        radio::ACCESS_LOCK.try_lock().is_err(),
        "access lock held while open",
    );

    match radio.configure(&ft017th::RADIO_CONFIG).await {
        Ok(settings) => {
            esp_println::println!("    {}", settings);
            results.assert_eq(
                settings.base_frequency_hz,
                433_944_824,
                "base frequency read back",
            );
            results.assert_eq(settings.symbol_rate_baud, 2045, "symbol rate read back");
            results.assert_eq(
                settings.filter_bandwidth_hz,
                58_035,
                "filter bandwidth read back",
            );
            results.assert_eq(
                settings.packet_length_bytes as usize,
                ft017th::PACKET_LENGTH_BYTES,
                "packet length read back",
            );
        }
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "configure CC1101");
        }
    }

    let closed = radio.close().await.is_ok();
    results.assert(closed, "CC1101 closed");
    results.assert(
        radio::ACCESS_LOCK.try_lock().is_ok(),
        "access lock free after close",
    );

    esp_println::println!(
        "  Waiting up to {}s for a transmission...",
        LIVE_RECEIVE_TIMEOUT_SECS
    );
    let mut receiver = Receiver::new(
        radio,
        SystemClock::new(0),
        ReceiverOptions::new(LIVE_RECEIVE_TIMEOUT_SECS),
    );
    match receiver.next().await {
        Ok(Some(measurement)) => {
            esp_println::println!("    {}", measurement);
            results.assert(
                (-40.0..=70.0).contains(&measurement.temperature_degrees_celsius),
                "received temperature in sensor range",
            );
        }
        Ok(None) => results.skip("receive measurement", "no transmission received"),
        Err(e) => {
            esp_println::println!("    {}", e);
            results.assert(false, "receive measurement");
        }
    }
}

#[esp_rtos::main]
async fn main(_spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 32 * 1024);

    esp_println::println!("\n==========================================");
    esp_println::println!("=== Hardware Unit Test Runner ===");
    esp_println::println!("==========================================");

    let mut results = TestResults::new();

    // Run tests that don't need hardware
    test_decoder(&mut results);
    test_reception_log(&mut results);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    match Cc1101Hardware::new(
        peripherals.SPI2,
        peripherals.GPIO10,
        peripherals.GPIO11,
        peripherals.GPIO13,
        peripherals.GPIO12,
        peripherals.GPIO9,
    ) {
        Ok(hardware) => test_cc1101(&mut results, hardware).await,
        Err(e) => {
            esp_println::println!("  {}", e);
            results.assert(false, "CC1101 SPI setup");
        }
    }

    results.print_summary();

    esp_println::println!("\nTest run complete. Looping...");
    loop {
        Timer::after(Duration::from_secs(1)).await;
    }
}
