//! Errors surfaced by [`Transceiver`](crate::traits::Transceiver)
//! implementations and the [`Receiver`](crate::receiver::Receiver).

use core::fmt;

/// Transceiver access and reception errors
///
/// `E` is the device error of the underlying transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Another task holds the transceiver's access lock
    Locked,
    /// Received payload does not have the configured length
    ///
    /// Usually means the transceiver was reconfigured by another task.
    UnexpectedPacketLength { expected: usize, received: usize },
    /// Bus, pin or chip error reported by the transceiver
    Device(E),
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Device(e)
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "transceiver locked by another task"),
            Self::UnexpectedPacketLength { expected, received } => write!(
                f,
                "unexpected packet length: expected {} bytes, received {}",
                expected, received
            ),
            Self::Device(e) => write!(f, "transceiver error: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for Error<E> {}
