//! FT017TH thermo/hygrometer message format
//!
//! A transmission consists of the 65 bit message repeated three times,
//! Manchester encoded at 2048 baud on 433.945 MHz. The CC1101 matches the
//! first 16 bits as sync word, so the radio hands over the remaining
//! 23 bytes of the 25 byte signal.
//!
//! Message layout (bit 0 = first bit on air):
//!
//! | bits    | content                                   |
//! |---------|-------------------------------------------|
//! | 0..8    | prefix, all ones                          |
//! | 8..32   | undecoded (address, battery state?)       |
//! | 32..44  | temperature index                         |
//! | 44..56  | relative humidity index                   |
//! | 56..65  | undecoded (checksum?)                     |

use core::fmt;

use log::debug;

use crate::cc1101::{FilterBandwidth, PacketLengthMode, RadioConfig, SyncMode};
use crate::time::Timestamp;

pub const MESSAGE_LENGTH_BITS: usize = 65;
pub const MESSAGE_REPEATS: usize = 3;
pub const TRANSMISSION_LENGTH_BYTES: usize = (MESSAGE_LENGTH_BITS * MESSAGE_REPEATS).div_ceil(8);

/// Sync word preceding every transmission
///
/// The second byte might be sender specific.
pub const SYNC_WORD: [u8; 2] = [0xFF, 0xA8];

/// Number of bytes the transceiver has to receive after the sync word
pub const PACKET_LENGTH_BYTES: usize = TRANSMISSION_LENGTH_BYTES - SYNC_WORD.len();

/// Transceiver settings for receiving FT017TH transmissions
pub const RADIO_CONFIG: RadioConfig = RadioConfig {
    base_frequency_hz: 433_945_000,
    symbol_rate_baud: 2048,
    sync_mode: SyncMode::Transmit16Match15Bits,
    carrier_sense_threshold: true,
    sync_word: SYNC_WORD,
    crc: false,
    manchester: true,
    packet_length_mode: PacketLengthMode::Fixed,
    packet_length_bytes: PACKET_LENGTH_BYTES as u8,
    // 58 kHz
    filter_bandwidth: FilterBandwidth {
        mantissa: 3,
        exponent: 3,
    },
};

// Advertised range: [-40°C, +60°C], intercept -40°C (= -40°F).
// Slope estimated by linear regression on reference readings.
const TEMPERATURE_INDEX_SLOPE: f32 = 576.077364;
const TEMPERATURE_INTERCEPT_DEGREES_CELSIUS: f32 = -40.0;
// Advertised range: [10%, 99%], intercept 0%.
const RELATIVE_HUMIDITY_INDEX_SLOPE: f32 = 51451.432435;

/// Reasons a transmission cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The first 8 bits of the message are not all set
    InvalidPrefix(Message),
    /// None of the later repeats matches the first one
    RepeatsDoNotMatch,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrefix(message) => write!(f, "invalid prefix in message: {}", message),
            Self::RepeatsDoNotMatch => write!(f, "repeats do not match"),
        }
    }
}

impl core::error::Error for DecodeError {}

/// One 65 bit FT017TH message, first bit on air is the most significant
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Message(u128);

impl Message {
    const MASK: u128 = (1 << MESSAGE_LENGTH_BITS) - 1;

    pub const fn from_bits(bits: u128) -> Self {
        Self(bits & Self::MASK)
    }

    pub const fn bits(&self) -> u128 {
        self.0
    }

    /// `len` bits starting at message bit `start`, big endian
    fn field(&self, start: usize, len: usize) -> u32 {
        let shift = MESSAGE_LENGTH_BITS - start - len;
        ((self.0 >> shift) & ((1 << len) - 1)) as u32
    }

    /// 12 bit value packed into 16 bits with zero padding at the end
    fn index(&self, start: usize) -> u16 {
        (self.field(start, 12) << 4) as u16
    }

    pub fn decode(&self) -> Result<Reading, DecodeError> {
        if self.field(0, 8) != 0xFF {
            return Err(DecodeError::InvalidPrefix(*self));
        }
        // 12 bits cover 2**12 * 2**4 / slope - 40 = 73.76°C
        let temperature_degrees_celsius = self.index(32) as f32 / TEMPERATURE_INDEX_SLOPE
            + TEMPERATURE_INTERCEPT_DEGREES_CELSIUS;
        // 12 bits cover 2**12 * 2**4 / slope = 127%
        let relative_humidity = self.index(44) as f32 / RELATIVE_HUMIDITY_INDEX_SLOPE;
        debug!(
            "undecoded prefix {:06x}, {:.02}°C, {:.01}%, undecoded suffix {:09b}",
            self.field(8, 24),
            temperature_degrees_celsius,
            relative_humidity * 100.0,
            self.field(56, 9)
        );
        Ok(Reading {
            temperature_degrees_celsius,
            relative_humidity,
        })
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message({})", self)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:065b}", self.0)
    }
}

/// Read `len` (at most 128) bits starting at bit `start` of `signal`, MSB first
fn read_bits(signal: &[u8], start: usize, len: usize) -> u128 {
    (start..start + len).fold(0, |acc, i| {
        (acc << 1) | ((signal[i / 8] >> (7 - i % 8)) & 1) as u128
    })
}

/// Extract the message from a complete transmission (sync word included)
///
/// The transceiver might have skipped the first repeat, so the message is
/// accepted if the first repeat equals either of the others.
pub fn parse_transmission(
    signal: &[u8; TRANSMISSION_LENGTH_BYTES],
) -> Result<Message, DecodeError> {
    let repeat = |index: usize| {
        Message::from_bits(read_bits(
            signal,
            index * MESSAGE_LENGTH_BITS,
            MESSAGE_LENGTH_BITS,
        ))
    };
    let first = repeat(0);
    if first == repeat(1) || first == repeat(2) {
        Ok(first)
    } else {
        Err(DecodeError::RepeatsDoNotMatch)
    }
}

/// Values decoded from a single message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature_degrees_celsius: f32,
    /// Relative humidity in `[0, 1]`
    pub relative_humidity: f32,
}

impl Reading {
    pub fn at(self, decoded_at: Timestamp) -> Measurement {
        Measurement {
            decoded_at,
            temperature_degrees_celsius: self.temperature_degrees_celsius,
            relative_humidity: self.relative_humidity,
        }
    }
}

/// Decoded reading together with the time it was decoded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub decoded_at: Timestamp,
    pub temperature_degrees_celsius: f32,
    /// Relative humidity in `[0, 1]`
    pub relative_humidity: f32,
}

impl Measurement {
    pub fn relative_humidity_percent(&self) -> f32 {
        self.relative_humidity * 100.0
    }
}

/// Tab separated console line: timestamp, temperature, relative humidity
impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{:.1}°C\t{:.1}%",
            self.decoded_at,
            self.temperature_degrees_celsius,
            self.relative_humidity_percent()
        )
    }
}
