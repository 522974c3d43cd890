//! CC1101 register map and value encodings
//!
//! Addresses, strobes and field layouts follow the CC1101 datasheet
//! (SWRS061I). All frequency computations assume the usual 26 MHz crystal.

/// Crystal oscillator frequency
pub const CRYSTAL_FREQUENCY_HZ: u32 = 26_000_000;

/// SPI header bits
pub const READ_SINGLE: u8 = 0x80;
pub const WRITE_BURST: u8 = 0x40;
pub const READ_BURST: u8 = 0xC0;

/// Configuration registers (read/write)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Config {
    Iocfg0 = 0x02,
    /// Start of the SYNC1, SYNC0 burst
    Sync1 = 0x04,
    Sync0 = 0x05,
    Pktlen = 0x06,
    Pktctrl0 = 0x08,
    /// Start of the FREQ2..FREQ0 burst
    Freq2 = 0x0D,
    Freq0 = 0x0F,
    Mdmcfg4 = 0x10,
    Mdmcfg3 = 0x11,
    Mdmcfg2 = 0x12,
    Mcsm0 = 0x18,
    Frend0 = 0x22,
}

/// Command strobes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Strobe {
    /// Reset chip
    Sres = 0x30,
    /// Enable RX
    Srx = 0x34,
    /// Exit RX/TX, turn off frequency synthesizer
    Sidle = 0x36,
    /// Flush the RX FIFO
    Sfrx = 0x3A,
}

/// Status registers (read only, accessed with the burst bit set)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Partnum = 0x30,
    Version = 0x31,
    Marcstate = 0x35,
}

pub const FIFO: u8 = 0x3F;

pub const SUPPORTED_PARTNUM: u8 = 0x00;
pub const SUPPORTED_VERSION: u8 = 0x14;

/// MARCSTATE value of the IDLE state
pub const MARCSTATE_IDLE: u8 = 0x01;
/// MARCSTATE value after an RX FIFO overflow
pub const MARCSTATE_RXFIFO_OVERFLOW: u8 = 0x11;

/// Capacity of the RX FIFO in bytes
pub const FIFO_SIZE: usize = 64;

/// Bytes appended to every received packet (RSSI, LQI/CRC_OK)
pub const APPENDED_STATUS_LEN: usize = 2;

/// GDOx signal: asserts when the RX FIFO is filled at or above the
/// threshold or the end of packet is reached
pub const GDO_RX_FIFO_THRESHOLD_OR_PACKET_END: u8 = 0x01;

// MDMCFG2
pub const MDMCFG2_MOD_FORMAT_MASK: u8 = 0b0111_0000;
pub const MDMCFG2_MOD_FORMAT_ASK_OOK: u8 = 0b0011_0000;
pub const MDMCFG2_MANCHESTER_EN: u8 = 0b0000_1000;
pub const MDMCFG2_SYNC_MODE_MASK: u8 = 0b0000_0111;

// PKTCTRL0
pub const PKTCTRL0_WHITE_DATA: u8 = 0b0100_0000;
pub const PKTCTRL0_CRC_EN: u8 = 0b0000_0100;
pub const PKTCTRL0_LENGTH_CONFIG_MASK: u8 = 0b0000_0011;

// MDMCFG4
pub const MDMCFG4_CHANBW_MASK: u8 = 0b1111_0000;
pub const MDMCFG4_DRATE_E_MASK: u8 = 0b0000_1111;

// FREND0
pub const FREND0_PA_POWER_MASK: u8 = 0b0000_0111;

/// MCSM0: calibrate when going from IDLE to RX or TX, default PO_TIMEOUT
pub const MCSM0_FS_AUTOCAL_FROM_IDLE: u8 = 0b0001_0100;

/// Sync word qualifier mode (MDMCFG2.SYNC_MODE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    NoPreambleNoSync,
    Transmit16Match15Bits,
    Transmit16Match16Bits,
    Transmit32Match30Bits,
}

impl SyncMode {
    /// MDMCFG2 bits 2:0; bit 2 additionally requires carrier sense
    pub const fn bits(self, carrier_sense_threshold: bool) -> u8 {
        let mode = match self {
            Self::NoPreambleNoSync => 0b00,
            Self::Transmit16Match15Bits => 0b01,
            Self::Transmit16Match16Bits => 0b10,
            Self::Transmit32Match30Bits => 0b11,
        };
        if carrier_sense_threshold {
            mode | 0b100
        } else {
            mode
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::NoPreambleNoSync,
            0b01 => Self::Transmit16Match15Bits,
            0b10 => Self::Transmit16Match16Bits,
            _ => Self::Transmit32Match30Bits,
        }
    }
}

/// Packet length handling (PKTCTRL0.LENGTH_CONFIG)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketLengthMode {
    Fixed,
    Variable,
}

impl PacketLengthMode {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Fixed => 0b00,
            Self::Variable => 0b01,
        }
    }
}

/// FREQ2..FREQ0 word for a carrier frequency
pub fn frequency_word(frequency_hz: u32) -> u32 {
    let xosc = CRYSTAL_FREQUENCY_HZ as u64;
    ((((frequency_hz as u64) << 16) + xosc / 2) / xosc) as u32
}

/// Carrier frequency of a FREQ2..FREQ0 word
pub fn frequency_hz(word: u32) -> u32 {
    ((word as u64 * CRYSTAL_FREQUENCY_HZ as u64) >> 16) as u32
}

/// Floating point encoding of a symbol rate: (DRATE_E, DRATE_M)
///
/// `R = (256 + M) * 2^E * f_xosc / 2^28`
pub fn symbol_rate_encoding(baud: u32) -> (u8, u8) {
    let target = (baud as u64) << 28;
    let xosc = CRYSTAL_FREQUENCY_HZ as u64;
    // largest exponent whose minimum mantissa does not exceed the rate
    let mut exponent = (0..=15u32)
        .rev()
        .find(|e| (xosc << (e + 8)) <= target)
        .unwrap_or(0);
    let divisor = xosc << exponent;
    let mut mantissa = (target + divisor / 2) / divisor;
    if mantissa < 256 {
        mantissa = 256;
    }
    mantissa -= 256;
    if mantissa > 255 {
        exponent += 1;
        mantissa = 0;
    }
    (exponent as u8, mantissa as u8)
}

/// Symbol rate of a (DRATE_E, DRATE_M) pair
pub fn symbol_rate_baud(exponent: u8, mantissa: u8) -> u32 {
    (((256 + mantissa as u64) * CRYSTAL_FREQUENCY_HZ as u64) << exponent >> 28) as u32
}

/// Channel filter bandwidth of a (CHANBW_M, CHANBW_E) pair
///
/// `BW = f_xosc / (8 * (4 + M) * 2^E)`; both fields are two bits wide.
pub fn filter_bandwidth_hz(mantissa: u8, exponent: u8) -> u32 {
    CRYSTAL_FREQUENCY_HZ / (8 * (4 + (mantissa & 0b11) as u32) << (exponent & 0b11))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_word() {
        let word = frequency_word(433_945_000);
        assert_eq!(word, 0x10_B0_B0);
        assert!(433_945_000 - frequency_hz(word) < 400);
    }

    #[test]
    fn test_frequency_reset_value() {
        // FREQ reset value 0x1EC4EC = 800 MHz
        assert_eq!(frequency_hz(0x1E_C4_EC), 799_999_877);
    }

    #[test]
    fn test_symbol_rate_encoding() {
        assert_eq!(symbol_rate_encoding(2048), (6, 74));
        assert_eq!(symbol_rate_baud(6, 74), 2045);
    }

    #[test]
    fn test_symbol_rate_reset_value() {
        // MDMCFG4.DRATE_E = 0x0C, MDMCFG3 = 0x22: 115.051 kBaud
        assert_eq!(symbol_rate_baud(0x0C, 0x22), 115_051);
        assert_eq!(symbol_rate_encoding(115_051), (0x0C, 0x22));
    }

    #[test]
    fn test_symbol_rate_mantissa_overflow() {
        // mantissa rounds up to 256, i.e. into the next exponent
        let (exponent, mantissa) = symbol_rate_encoding(3_172);
        assert_eq!((exponent, mantissa), (7, 0));
    }

    #[test]
    fn test_filter_bandwidth() {
        assert_eq!(filter_bandwidth_hz(3, 3), 58_035);
        // reset value: CHANBW_E = 2, CHANBW_M = 0
        assert_eq!(filter_bandwidth_hz(0, 2), 203_125);
    }

    #[test]
    fn test_filter_bandwidth_ignores_bits_outside_the_fields() {
        assert_eq!(filter_bandwidth_hz(3 | 0b100, 3 | 0b1000_0100), 58_035);
        assert_eq!(filter_bandwidth_hz(0, 200), filter_bandwidth_hz(0, 0));
    }

    #[test]
    fn test_sync_mode_bits() {
        assert_eq!(SyncMode::Transmit16Match15Bits.bits(true), 0b101);
        assert_eq!(SyncMode::Transmit16Match16Bits.bits(false), 0b010);
        assert_eq!(
            SyncMode::from_bits(0b101),
            SyncMode::Transmit16Match15Bits
        );
    }
}
