//! Hardware abstraction traits
//!
//! Boards implement these; the [`Receiver`](crate::receiver::Receiver)
//! only talks to them.

use core::fmt;
use core::time::Duration;

use crate::cc1101::{RadioConfig, RadioSettings, ReceivedPacket};
use crate::error::Error;
use crate::time::Timestamp;

/// Packet radio the receiver can take exclusive control of
pub trait Transceiver {
    /// Device error (bus, pins, unexpected chip)
    type Error: fmt::Debug + fmt::Display;

    /// Take control of the transceiver, reset it and load defaults
    ///
    /// Fails with [`Error::Locked`] if another task holds the transceiver.
    async fn open(&mut self) -> Result<(), Error<Self::Error>>;

    /// Give up control; the transceiver is left idle
    async fn close(&mut self) -> Result<(), Error<Self::Error>>;

    /// Apply `config`, returning the settings read back from the device
    async fn configure(&mut self, config: &RadioConfig)
    -> Result<RadioSettings, Error<Self::Error>>;

    /// Let other tasks access the transceiver while still receiving
    async fn release_lock(&mut self);

    /// Enter receive mode and wait up to `timeout` for a packet
    ///
    /// Returns `Ok(None)` on timeout.
    async fn wait_for_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedPacket>, Error<Self::Error>>;
}

/// Time source of the receiver
pub trait Clock {
    /// Monotonic time since an arbitrary origin (usually boot)
    fn now(&self) -> Duration;

    /// Suspend the calling task for `duration`
    async fn sleep(&mut self, duration: Duration);

    /// Current wall-clock time
    fn timestamp(&self) -> Timestamp;
}

/// Text output device, e.g. a small OLED
pub trait TextDisplay {
    fn clear(&mut self) -> Result<(), &'static str>;

    /// Draw text with its top left corner at (`x`, `y`)
    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), &'static str>;

    /// Flush the buffer to the screen
    fn update(&mut self) -> Result<(), &'static str>;
}
