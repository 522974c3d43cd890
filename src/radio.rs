//! The board's CC1101 behind the transceiver access lock

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Delay;
use esp_hal::gpio::Input;
use wireless_sensor_core::cc1101::Cc1101;
use wireless_sensor_core::lock::{AccessLock, SharedTransceiver};

use crate::hardware::{Cc1101Hardware, Cc1101Spi};

pub type Radio = Cc1101<Cc1101Spi, Input<'static>, Delay>;

pub type SharedRadio = SharedTransceiver<'static, CriticalSectionRawMutex, Radio>;

/// Held by whichever task currently configures or receives with the CC1101
pub static ACCESS_LOCK: AccessLock<CriticalSectionRawMutex> = Mutex::new(());

pub fn shared_radio(hardware: Cc1101Hardware) -> SharedRadio {
    SharedTransceiver::new(
        Cc1101::new(hardware.spi, hardware.gdo0, Delay),
        &ACCESS_LOCK,
    )
}
