//! CC1101 sub-GHz transceiver driver (receive path only)
//!
//! Generic over an `embedded-hal-async` SPI device, the pin connected to
//! the chip's GDO0 output and a delay provider used for the reset delay and
//! packet timeouts.

pub mod registers;

use core::fmt;
use core::time::Duration;

use embassy_futures::select::{Either, select};
use embedded_hal::digital::ErrorType as PinErrorType;
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiDevice;
use heapless::Vec;
use log::debug;

use crate::error::Error;
use crate::traits::Transceiver;
use registers::*;
pub use registers::{PacketLengthMode, SyncMode};

/// Largest payload that fits the RX FIFO next to the appended status bytes
pub const MAX_PAYLOAD_LEN: usize = FIFO_SIZE - APPENDED_STATUS_LEN;

/// Offset between RSSI register value and dBm at 433 MHz
const RSSI_OFFSET_DB: f32 = 74.0;

/// Channel filter bandwidth as (CHANBW_M, CHANBW_E)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterBandwidth {
    pub mantissa: u8,
    pub exponent: u8,
}

impl FilterBandwidth {
    pub fn hz(&self) -> u32 {
        filter_bandwidth_hz(self.mantissa, self.exponent)
    }
}

/// Receive configuration applied on top of the chip defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioConfig {
    pub base_frequency_hz: u32,
    pub symbol_rate_baud: u32,
    pub sync_mode: SyncMode,
    /// Additionally require the carrier sense threshold to be exceeded
    pub carrier_sense_threshold: bool,
    pub sync_word: [u8; 2],
    pub crc: bool,
    pub manchester: bool,
    pub packet_length_mode: PacketLengthMode,
    pub packet_length_bytes: u8,
    pub filter_bandwidth: FilterBandwidth,
}

/// Settings as read back from the chip's registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioSettings {
    pub base_frequency_hz: u32,
    pub symbol_rate_baud: u32,
    pub ask_ook: bool,
    pub sync_mode: SyncMode,
    pub sync_word: [u8; 2],
    pub crc: bool,
    pub manchester: bool,
    pub packet_length_bytes: u8,
    pub filter_bandwidth_hz: u32,
}

impl fmt::Display for RadioSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CC1101(base_frequency={:.2}MHz, symbol_rate={}Baud, modulation_format={}, \
             sync_mode={:?}, sync_word=0x{:02x}{:02x}, packet_length={}B, crc={}, manchester={})",
            self.base_frequency_hz as f32 / 1_000_000.0,
            self.symbol_rate_baud,
            if self.ask_ook { "ASK_OOK" } else { "FSK" },
            self.sync_mode,
            self.sync_word[0],
            self.sync_word[1],
            self.packet_length_bytes,
            self.crc,
            self.manchester
        )
    }
}

/// Packet read from the RX FIFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    pub rssi_index: u8,
    pub checksum_valid: bool,
    pub link_quality_indicator: u8,
}

impl ReceivedPacket {
    /// Split FIFO content into payload and the two appended status bytes
    pub fn from_fifo(data: &[u8]) -> Self {
        let (payload, status) = match data.len() {
            n if n >= APPENDED_STATUS_LEN => data.split_at(n - APPENDED_STATUS_LEN),
            _ => (&[][..], &[0, 0][..]),
        };
        let payload = &payload[..payload.len().min(MAX_PAYLOAD_LEN)];
        Self {
            payload: Vec::from_slice(payload).unwrap_or_default(),
            rssi_index: status[0],
            checksum_valid: status[1] & 0x80 != 0,
            link_quality_indicator: status[1] & 0x7F,
        }
    }

    pub fn rssi_dbm(&self) -> f32 {
        (self.rssi_index as i8) as f32 / 2.0 - RSSI_OFFSET_DB
    }
}

impl fmt::Display for ReceivedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReceivedPacket(RSSI {:.0}dBm, 0x", self.rssi_dbm())?;
        for byte in &self.payload {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cc1101Error<S, P> {
    /// SPI transfer failed
    Spi(S),
    /// Waiting on the GDO0 pin failed
    Gdo0(P),
    /// PARTNUM/VERSION do not identify a supported CC1101
    UnsupportedChip { partnum: u8, version: u8 },
    /// Main radio control state machine did not reach IDLE after reset
    NotIdle(u8),
}

impl<S: fmt::Debug, P: fmt::Debug> fmt::Display for Cc1101Error<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(e) => write!(f, "SPI error: {:?}", e),
            Self::Gdo0(e) => write!(f, "GDO0 pin error: {:?}", e),
            Self::UnsupportedChip { partnum, version } => write!(
                f,
                "unsupported chip: partnum=0x{:02x}, version=0x{:02x}",
                partnum, version
            ),
            Self::NotIdle(state) => write!(
                f,
                "expected main radio control state machine to be idle, got 0x{:02x}",
                state
            ),
        }
    }
}

impl<S: fmt::Debug, P: fmt::Debug> core::error::Error for Cc1101Error<S, P> {}

type DriverError<SPI, GDO0> =
    Cc1101Error<<SPI as SpiErrorType>::Error, <GDO0 as PinErrorType>::Error>;

/// CC1101 transceiver
pub struct Cc1101<SPI, GDO0, D> {
    spi: SPI,
    gdo0: GDO0,
    delay: D,
}

impl<SPI, GDO0, D> Cc1101<SPI, GDO0, D>
where
    SPI: SpiDevice,
    GDO0: Wait,
    D: DelayNs,
{
    pub fn new(spi: SPI, gdo0: GDO0, delay: D) -> Self {
        Self { spi, gdo0, delay }
    }

    /// Issue a command strobe, returning the chip status byte
    async fn strobe(&mut self, strobe: Strobe) -> Result<u8, DriverError<SPI, GDO0>> {
        let mut buf = [strobe as u8];
        self.spi
            .transfer_in_place(&mut buf)
            .await
            .map_err(Cc1101Error::Spi)?;
        Ok(buf[0])
    }

    async fn read_burst(
        &mut self,
        start: u8,
        buf: &mut [u8],
    ) -> Result<(), DriverError<SPI, GDO0>> {
        self.spi
            .transaction(&mut [Operation::Write(&[start | READ_BURST]), Operation::Read(buf)])
            .await
            .map_err(Cc1101Error::Spi)
    }

    async fn write_burst(&mut self, start: u8, values: &[u8]) -> Result<(), DriverError<SPI, GDO0>> {
        self.spi
            .transaction(&mut [Operation::Write(&[start | WRITE_BURST]), Operation::Write(values)])
            .await
            .map_err(Cc1101Error::Spi)
    }

    async fn read_register(&mut self, register: Config) -> Result<u8, DriverError<SPI, GDO0>> {
        let mut value = [0];
        self.spi
            .transaction(&mut [
                Operation::Write(&[register as u8 | READ_SINGLE]),
                Operation::Read(&mut value),
            ])
            .await
            .map_err(Cc1101Error::Spi)?;
        Ok(value[0])
    }

    async fn write_register(
        &mut self,
        register: Config,
        value: u8,
    ) -> Result<(), DriverError<SPI, GDO0>> {
        self.spi
            .write(&[register as u8, value])
            .await
            .map_err(Cc1101Error::Spi)
    }

    /// Replace the bits selected by `mask` with `bits`
    async fn modify_register(
        &mut self,
        register: Config,
        mask: u8,
        bits: u8,
    ) -> Result<(), DriverError<SPI, GDO0>> {
        let value = self.read_register(register).await?;
        self.write_register(register, (value & !mask) | (bits & mask))
            .await
    }

    /// Status registers share addresses with strobes and need the burst bit
    async fn read_status(&mut self, register: Status) -> Result<u8, DriverError<SPI, GDO0>> {
        let mut value = [0];
        self.read_burst(register as u8, &mut value).await?;
        Ok(value[0])
    }

    pub async fn reset(&mut self) -> Result<(), DriverError<SPI, GDO0>> {
        self.strobe(Strobe::Sres).await?;
        self.delay.delay_ms(1).await;
        Ok(())
    }

    /// Check PARTNUM and VERSION
    pub async fn verify_chip(&mut self) -> Result<(), DriverError<SPI, GDO0>> {
        let partnum = self.read_status(Status::Partnum).await?;
        let version = self.read_status(Status::Version).await?;
        if partnum != SUPPORTED_PARTNUM || version != SUPPORTED_VERSION {
            return Err(Cc1101Error::UnsupportedChip { partnum, version });
        }
        Ok(())
    }

    /// ASK/OOK, power amplifier setting 1, no data whitening, calibration
    /// when leaving IDLE
    pub async fn configure_defaults(&mut self) -> Result<(), DriverError<SPI, GDO0>> {
        self.modify_register(
            Config::Mdmcfg2,
            MDMCFG2_MOD_FORMAT_MASK,
            MDMCFG2_MOD_FORMAT_ASK_OOK,
        )
        .await?;
        self.modify_register(Config::Frend0, FREND0_PA_POWER_MASK, 1)
            .await?;
        self.modify_register(Config::Pktctrl0, PKTCTRL0_WHITE_DATA, 0)
            .await?;
        self.write_register(Config::Mcsm0, MCSM0_FS_AUTOCAL_FROM_IDLE)
            .await
    }

    /// Main radio control state machine state
    pub async fn marcstate(&mut self) -> Result<u8, DriverError<SPI, GDO0>> {
        Ok(self.read_status(Status::Marcstate).await? & 0x1F)
    }

    pub async fn set_base_frequency(&mut self, hz: u32) -> Result<(), DriverError<SPI, GDO0>> {
        let word = frequency_word(hz);
        self.write_burst(
            Config::Freq2 as u8,
            &[(word >> 16) as u8, (word >> 8) as u8, word as u8],
        )
        .await
    }

    pub async fn set_symbol_rate(&mut self, baud: u32) -> Result<(), DriverError<SPI, GDO0>> {
        let (exponent, mantissa) = symbol_rate_encoding(baud);
        self.modify_register(Config::Mdmcfg4, MDMCFG4_DRATE_E_MASK, exponent)
            .await?;
        self.write_register(Config::Mdmcfg3, mantissa).await
    }

    pub async fn set_filter_bandwidth(
        &mut self,
        bandwidth: FilterBandwidth,
    ) -> Result<(), DriverError<SPI, GDO0>> {
        self.modify_register(
            Config::Mdmcfg4,
            MDMCFG4_CHANBW_MASK,
            ((bandwidth.exponent & 0b11) << 6) | ((bandwidth.mantissa & 0b11) << 4),
        )
        .await
    }

    /// Apply a receive configuration
    pub async fn apply(&mut self, config: &RadioConfig) -> Result<(), DriverError<SPI, GDO0>> {
        self.set_base_frequency(config.base_frequency_hz).await?;
        self.set_symbol_rate(config.symbol_rate_baud).await?;
        let manchester = if config.manchester {
            MDMCFG2_MANCHESTER_EN
        } else {
            0
        };
        self.modify_register(
            Config::Mdmcfg2,
            MDMCFG2_MANCHESTER_EN | MDMCFG2_SYNC_MODE_MASK,
            manchester | config.sync_mode.bits(config.carrier_sense_threshold),
        )
        .await?;
        self.write_burst(Config::Sync1 as u8, &config.sync_word)
            .await?;
        let crc = if config.crc { PKTCTRL0_CRC_EN } else { 0 };
        self.modify_register(
            Config::Pktctrl0,
            PKTCTRL0_CRC_EN | PKTCTRL0_LENGTH_CONFIG_MASK,
            crc | config.packet_length_mode.bits(),
        )
        .await?;
        self.write_register(Config::Pktlen, config.packet_length_bytes)
            .await?;
        self.set_filter_bandwidth(config.filter_bandwidth).await
    }

    /// Read the current settings back from the registers
    pub async fn settings(&mut self) -> Result<RadioSettings, DriverError<SPI, GDO0>> {
        let mut freq = [0; 3];
        self.read_burst(Config::Freq2 as u8, &mut freq).await?;
        let mut sync_word = [0; 2];
        self.read_burst(Config::Sync1 as u8, &mut sync_word).await?;
        let mdmcfg4 = self.read_register(Config::Mdmcfg4).await?;
        let mdmcfg3 = self.read_register(Config::Mdmcfg3).await?;
        let mdmcfg2 = self.read_register(Config::Mdmcfg2).await?;
        let pktctrl0 = self.read_register(Config::Pktctrl0).await?;
        let pktlen = self.read_register(Config::Pktlen).await?;
        let word = u32::from_be_bytes([0, freq[0], freq[1], freq[2]]);
        Ok(RadioSettings {
            base_frequency_hz: frequency_hz(word),
            symbol_rate_baud: symbol_rate_baud(mdmcfg4 & MDMCFG4_DRATE_E_MASK, mdmcfg3),
            ask_ook: mdmcfg2 & MDMCFG2_MOD_FORMAT_MASK == MDMCFG2_MOD_FORMAT_ASK_OOK,
            sync_mode: SyncMode::from_bits(mdmcfg2),
            sync_word,
            crc: pktctrl0 & PKTCTRL0_CRC_EN != 0,
            manchester: mdmcfg2 & MDMCFG2_MANCHESTER_EN != 0,
            packet_length_bytes: pktlen,
            filter_bandwidth_hz: filter_bandwidth_hz((mdmcfg4 >> 4) & 0b11, mdmcfg4 >> 6),
        })
    }

    /// Enter RX and wait for GDO0 to signal a complete packet
    pub async fn receive(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedPacket>, DriverError<SPI, GDO0>> {
        self.write_register(Config::Iocfg0, GDO_RX_FIFO_THRESHOLD_OR_PACKET_END)
            .await?;
        if self.marcstate().await? == MARCSTATE_RXFIFO_OVERFLOW {
            debug!("RX FIFO overflowed, flushing");
            self.strobe(Strobe::Sfrx).await?;
        }
        self.strobe(Strobe::Srx).await?;
        let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;
        match select(self.gdo0.wait_for_rising_edge(), self.delay.delay_ms(timeout_ms)).await {
            Either::First(result) => result.map_err(Cc1101Error::Gdo0)?,
            Either::Second(()) => return Ok(None),
        }
        self.read_packet().await.map(Some)
    }

    /// Read PKTLEN payload bytes plus the appended status from the RX FIFO
    ///
    /// PKTLEN is read from the chip so that a length changed behind our back
    /// shows up as a payload of unexpected length.
    async fn read_packet(&mut self) -> Result<ReceivedPacket, DriverError<SPI, GDO0>> {
        let packet_length = self.read_register(Config::Pktlen).await? as usize;
        let len = (packet_length + APPENDED_STATUS_LEN).min(FIFO_SIZE);
        let mut fifo = [0; FIFO_SIZE];
        self.read_burst(FIFO, &mut fifo[..len]).await?;
        Ok(ReceivedPacket::from_fifo(&fifo[..len]))
    }
}

impl<SPI, GDO0, D> Transceiver for Cc1101<SPI, GDO0, D>
where
    SPI: SpiDevice,
    GDO0: Wait,
    D: DelayNs,
{
    type Error = DriverError<SPI, GDO0>;

    async fn open(&mut self) -> Result<(), Error<Self::Error>> {
        self.reset().await?;
        self.verify_chip().await?;
        self.configure_defaults().await?;
        let marcstate = self.marcstate().await?;
        if marcstate != MARCSTATE_IDLE {
            return Err(Error::Device(Cc1101Error::NotIdle(marcstate)));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), Error<Self::Error>> {
        self.strobe(Strobe::Sidle).await?;
        Ok(())
    }

    async fn configure(
        &mut self,
        config: &RadioConfig,
    ) -> Result<RadioSettings, Error<Self::Error>> {
        self.apply(config).await?;
        Ok(self.settings().await?)
    }

    async fn release_lock(&mut self) {}

    async fn wait_for_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedPacket>, Error<Self::Error>> {
        Ok(self.receive(timeout).await?)
    }
}
