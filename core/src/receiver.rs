//! Continuous reception of FT017TH measurements
//!
//! The [`Receiver`] owns a transceiver session across calls to
//! [`Receiver::next`]: the radio is opened and configured once and kept in
//! receive mode as long as packets keep arriving. Sessions are restarted
//! when the transceiver turns out to have been reconfigured by someone
//! else, and opening is retried with exponential backoff while another
//! task holds the access lock.

use core::num::NonZeroU32;
use core::time::Duration;

use log::{debug, info, warn};

use crate::error::Error;
use crate::ft017th::{
    Measurement, PACKET_LENGTH_BYTES, RADIO_CONFIG, SYNC_WORD, TRANSMISSION_LENGTH_BYTES,
    parse_transmission,
};
use crate::traits::{Clock, Transceiver};

/// Pause before every packet fetch, protects against packet floods
const FLOOD_PROTECTION: Duration = Duration::from_secs(1);
/// Pause before reopening after the transceiver was reconfigured
const REOPEN_DELAY: Duration = Duration::from_secs(1);
const LOCK_WAIT_START: Duration = Duration::from_secs(2);
const LOCK_WAIT_FACTOR: u32 = 2;
const MIN_PACKET_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverOptions {
    /// Give up after this long without a successfully decoded packet
    pub timeout_secs: NonZeroU32,
    /// Release the transceiver's access lock once it is configured
    pub unlock_after_configure: bool,
}

impl ReceiverOptions {
    pub const fn new(timeout_secs: NonZeroU32) -> Self {
        Self {
            timeout_secs,
            unlock_after_configure: false,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.get() as u64)
    }
}

pub struct Receiver<T, C> {
    transceiver: T,
    clock: C,
    options: ReceiverOptions,
    session_open: bool,
    lock_wait: Duration,
}

impl<T: Transceiver, C: Clock> Receiver<T, C> {
    pub fn new(transceiver: T, clock: C, options: ReceiverOptions) -> Self {
        Self {
            transceiver,
            clock,
            options,
            session_open: false,
            lock_wait: LOCK_WAIT_START,
        }
    }

    pub fn is_session_open(&self) -> bool {
        self.session_open
    }

    /// Wait for the next successfully decoded measurement
    ///
    /// Returns `Ok(None)` if nothing could be decoded within the timeout.
    /// The transceiver session is closed in that case and on errors, and
    /// reopened by the next call.
    pub async fn next(&mut self) -> Result<Option<Measurement>, Error<T::Error>> {
        let deadline = self.clock.now() + self.options.timeout();
        self.lock_wait = LOCK_WAIT_START;
        while self.clock.now() < deadline {
            let result = if self.session_open {
                self.receive_measurement(deadline).await
            } else {
                self.start_session().await.map(|()| None)
            };
            match result {
                Ok(Some(measurement)) => return Ok(Some(measurement)),
                Ok(None) => {}
                Err(Error::Locked) => {
                    self.end_session().await;
                    info!(
                        "SPI device locked, waiting {} seconds",
                        self.lock_wait.as_secs()
                    );
                    self.clock.sleep(self.lock_wait).await;
                    self.lock_wait *= LOCK_WAIT_FACTOR;
                }
                Err(Error::UnexpectedPacketLength { .. }) => {
                    self.end_session().await;
                    info!(
                        "unexpected packet length; reconfiguring as transceiver was \
                         potentially accessed by another process"
                    );
                    self.clock.sleep(REOPEN_DELAY).await;
                }
                Err(err) => {
                    self.end_session().await;
                    return Err(err);
                }
            }
        }
        warn!("timeout waiting for packet");
        if self.session_open {
            self.session_open = false;
            self.transceiver.close().await?;
        }
        Ok(None)
    }

    async fn start_session(&mut self) -> Result<(), Error<T::Error>> {
        self.transceiver.open().await?;
        self.session_open = true;
        let settings = self.transceiver.configure(&RADIO_CONFIG).await?;
        debug!(
            "{}, filter_bandwidth={:.0}kHz",
            settings,
            settings.filter_bandwidth_hz as f32 / 1000.0
        );
        if self.options.unlock_after_configure {
            self.transceiver.release_lock().await;
            debug!("unlocked SPI device");
        }
        Ok(())
    }

    /// Close the session, if any, after a failure
    async fn end_session(&mut self) {
        if !self.session_open {
            return;
        }
        self.session_open = false;
        if let Err(err) = self.transceiver.close().await {
            warn!("failed to close transceiver: {}", err);
        }
    }

    async fn receive_measurement(
        &mut self,
        deadline: Duration,
    ) -> Result<Option<Measurement>, Error<T::Error>> {
        self.clock.sleep(FLOOD_PROTECTION).await;
        let remaining = deadline.saturating_sub(self.clock.now());
        // whole seconds, at least one
        let timeout = Duration::from_secs(remaining.as_secs()).max(MIN_PACKET_TIMEOUT);
        let Some(packet) = self.transceiver.wait_for_packet(timeout).await? else {
            debug!("timeout or fetching packet failed");
            return Ok(None);
        };
        if packet.payload.len() != PACKET_LENGTH_BYTES {
            return Err(Error::UnexpectedPacketLength {
                expected: PACKET_LENGTH_BYTES,
                received: packet.payload.len(),
            });
        }
        let mut signal = [0; TRANSMISSION_LENGTH_BYTES];
        signal[..SYNC_WORD.len()].copy_from_slice(&SYNC_WORD);
        signal[SYNC_WORD.len()..].copy_from_slice(&packet.payload);
        match parse_transmission(&signal).and_then(|message| message.decode()) {
            Ok(reading) => Ok(Some(reading.at(self.clock.timestamp()))),
            Err(err) => {
                debug!("failed to decode {}: {}", packet, err);
                Ok(None)
            }
        }
    }
}
