//! Monotonic and wall clock on top of embassy-time
//!
//! Wall clock time is the boot instant's Unix time (set once SNTP answered)
//! plus the time since boot. Before that, timestamps count from 1970.

use core::cell::Cell;
use core::time::Duration;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Instant, Timer};
use log::info;
use wireless_sensor_core::Timestamp;
use wireless_sensor_core::traits::Clock;

/// Unix time of the boot instant, in microseconds
static BOOT_UNIX_MICROS: Mutex<CriticalSectionRawMutex, Cell<Option<i64>>> =
    Mutex::new(Cell::new(None));

/// Set the wall clock from a Unix time measured at `measured_at`
pub fn set_unix_time(unix_secs: i64, measured_at: Instant) {
    let boot_unix_micros = unix_secs * 1_000_000 - measured_at.as_micros() as i64;
    let previous = BOOT_UNIX_MICROS.lock(|boot| boot.replace(Some(boot_unix_micros)));
    match previous {
        Some(previous) => info!(
            "wall clock adjusted by {}ms",
            (boot_unix_micros - previous) / 1000
        ),
        None => info!("wall clock set, unix time {}", unix_secs),
    }
}

pub fn is_synchronized() -> bool {
    BOOT_UNIX_MICROS.lock(|boot| boot.get().is_some())
}

pub struct SystemClock {
    utc_offset_secs: i32,
}

impl SystemClock {
    pub const fn new(utc_offset_secs: i32) -> Self {
        Self { utc_offset_secs }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        Duration::from_micros(Instant::now().as_micros())
    }

    async fn sleep(&mut self, duration: Duration) {
        Timer::after_micros(duration.as_micros() as u64).await;
    }

    fn timestamp(&self) -> Timestamp {
        let boot = BOOT_UNIX_MICROS.lock(|boot| boot.get()).unwrap_or(0);
        let unix_micros = boot + Instant::now().as_micros() as i64;
        Timestamp::new(unix_micros.div_euclid(1_000_000), self.utc_offset_secs)
    }
}
