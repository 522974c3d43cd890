//! Hardware-independent logic for receiving FT017TH thermo/hygrometer
//! transmissions through a CC1101 transceiver.
//!
//! Everything in here is generic over `embedded-hal` traits and the
//! [`traits::Transceiver`] / [`traits::Clock`] seams, so it runs unchanged on
//! the board and under `cargo test` on the host.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![allow(async_fn_in_trait)]

pub mod cc1101;
pub mod error;
pub mod ft017th;
pub mod lock;
pub mod logic;
pub mod ntp;
pub mod receiver;
pub mod time;
pub mod traits;

pub use error::Error;
pub use ft017th::{DecodeError, Measurement, Reading};
pub use logic::ReceptionLog;
pub use receiver::{Receiver, ReceiverOptions};
pub use time::Timestamp;

#[cfg(test)]
pub(crate) mod testing;
