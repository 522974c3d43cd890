//! Board and application configuration
//!
//! WiFi credentials, NTP server and timezone are read from the build
//! environment, e.g.
//!
//! ```text
//! WIFI_SSID=home WIFI_PASSWORD=secret UTC_OFFSET_MINUTES=60 cargo build -p wireless-sensor
//! ```

use core::num::NonZeroU32;

/// CC1101 SPI clock. The chip accepts up to 6.5 MHz for burst access.
pub const CC1101_SPI_FREQ_KHZ: u32 = 5_000;

pub const SSD1306_I2C_FREQ_KHZ: u32 = 400;

/// Give up receiving (and reopen the transceiver) after one hour without
/// a decoded packet
pub const RECEIVE_TIMEOUT_SECS: NonZeroU32 = match NonZeroU32::new(3600) {
    Some(secs) => secs,
    None => panic!("timeout must not be zero"),
};

/// Let other tasks use the transceiver while receiving
pub const UNLOCK_AFTER_CONFIGURE: bool = false;

/// Pause after a transceiver error before trying again
pub const RECEIVE_RETRY_DELAY_SECS: u64 = 10;

pub const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");

pub const WIFI_PASSWORD: &str = match option_env!("WIFI_PASSWORD") {
    Some(password) => password,
    None => "",
};

pub const NTP_SERVER: &str = match option_env!("NTP_SERVER") {
    Some(server) => server,
    None => "pool.ntp.org",
};

pub const NTP_RESYNC_INTERVAL_SECS: u64 = 6 * 3600;

/// First pause after a failed synchronization, doubled on every further
/// failure until the clock is set
pub const NTP_RETRY_DELAY_SECS: u64 = 10;

pub const NTP_MAX_RETRY_DELAY_SECS: u64 = 300;

/// Local time offset, e.g. `60` for CET or `-300` for EST
pub const UTC_OFFSET_MINUTES: i32 = match option_env!("UTC_OFFSET_MINUTES") {
    Some(minutes) => parse_minutes(minutes),
    None => 0,
};

const fn parse_minutes(value: &str) -> i32 {
    let bytes = value.as_bytes();
    let (negative, start) = match bytes.first() {
        Some(b'-') => (true, 1),
        Some(b'+') => (false, 1),
        _ => (false, 0),
    };
    assert!(start < bytes.len(), "UTC_OFFSET_MINUTES must be a number");
    let mut minutes = 0;
    let mut i = start;
    while i < bytes.len() {
        assert!(
            bytes[i].is_ascii_digit(),
            "UTC_OFFSET_MINUTES must be a number"
        );
        minutes = minutes * 10 + (bytes[i] - b'0') as i32;
        i += 1;
    }
    assert!(minutes <= 14 * 60, "UTC_OFFSET_MINUTES out of range");
    if negative { -minutes } else { minutes }
}
