//! Test doubles: a register level CC1101 fake and scripted transceiver/clock

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::spi::{ErrorType as SpiErrorType, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::SpiDevice;

use crate::cc1101::registers::*;
use crate::cc1101::{Cc1101, RadioConfig, RadioSettings, ReceivedPacket, SyncMode};
use crate::error::Error;
use crate::time::Timestamp;
use crate::traits::{Clock, Transceiver};

/// Transmission recorded from an FT017TH, sync word included
pub const SIGNAL: [u8; 25] = [
    0xFF, 0xA8, 0xB3, 0x20, 0x90, 0x05, 0xEF, 0x21, 0xFF, 0xD4, 0x59, 0x90, 0x48, 0x02, 0xF7,
    0x90, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

/// Configuration register values after reset (0x00..=0x2E)
const RESET_VALUES: [u8; 0x2F] = [
    0x29, 0x2E, 0x3F, 0x07, 0xD3, 0x91, 0xFF, 0x04, 0x45, 0x00, 0x00, 0x0F, 0x00, 0x1E, 0xC4,
    0xEC, 0x8C, 0x22, 0x02, 0x22, 0xF8, 0x47, 0x07, 0x30, 0x04, 0x36, 0x6C, 0x03, 0x40, 0x91,
    0x87, 0x6B, 0xF8, 0x56, 0x10, 0xA9, 0x0A, 0x20, 0x0D, 0x41, 0x00, 0x59, 0x7F, 0x3F, 0x88,
    0x31, 0x0B,
];

const MARCSTATE_RX: u8 = 0x0D;

/// Observable state of the fake chip
pub struct ChipState {
    pub config: [u8; 0x2F],
    pub partnum: u8,
    pub version: u8,
    pub marcstate: u8,
    /// Overrides MARCSTATE reads
    pub stuck_marcstate: Option<u8>,
    pub strobes: Vec<u8>,
    pub delays_ms: Vec<u32>,
    pub rx_fifo: VecDeque<u8>,
    /// Packets (status bytes included) delivered one per SRX
    pub air: VecDeque<Vec<u8>>,
}

impl ChipState {
    /// Queue a packet to be "received" on the next SRX
    pub fn queue_packet(&mut self, payload: &[u8], rssi: u8, lqi_crc_ok: u8) {
        let mut data = payload.to_vec();
        data.extend([rssi, lqi_crc_ok]);
        self.air.push_back(data);
    }

    fn strobe(&mut self, strobe: u8) {
        self.strobes.push(strobe);
        match strobe {
            s if s == Strobe::Sres as u8 => {
                self.config = RESET_VALUES;
                self.marcstate = MARCSTATE_IDLE;
                self.rx_fifo.clear();
            }
            s if s == Strobe::Srx as u8 => {
                self.marcstate = MARCSTATE_RX;
                if let Some(packet) = self.air.pop_front() {
                    self.rx_fifo.extend(packet);
                }
            }
            s if s == Strobe::Sidle as u8 => self.marcstate = MARCSTATE_IDLE,
            s if s == Strobe::Sfrx as u8 => self.rx_fifo.clear(),
            _ => {}
        }
    }

    fn read(&mut self, address: u8, burst: bool) -> u8 {
        match address {
            FIFO => self.rx_fifo.pop_front().unwrap_or(0),
            a if burst && a == Status::Partnum as u8 => self.partnum,
            a if burst && a == Status::Version as u8 => self.version,
            a if burst && a == Status::Marcstate as u8 => {
                self.stuck_marcstate.unwrap_or(self.marcstate)
            }
            a if (a as usize) < self.config.len() => self.config[a as usize],
            _ => 0,
        }
    }

    fn write(&mut self, address: u8, value: u8) {
        if let Some(register) = self.config.get_mut(address as usize) {
            *register = value;
        }
    }
}

/// Fake CC1101 shared between the SPI device, GDO0 pin and delay handles
#[derive(Clone)]
pub struct FakeChip(Rc<RefCell<ChipState>>);

impl FakeChip {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(ChipState {
            config: RESET_VALUES,
            partnum: SUPPORTED_PARTNUM,
            version: SUPPORTED_VERSION,
            marcstate: MARCSTATE_IDLE,
            stuck_marcstate: None,
            strobes: Vec::new(),
            delays_ms: Vec::new(),
            rx_fifo: VecDeque::new(),
            air: VecDeque::new(),
        })))
    }

    pub fn state(&self) -> Ref<'_, ChipState> {
        self.0.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, ChipState> {
        self.0.borrow_mut()
    }

    pub fn driver(&self) -> Cc1101<FakeSpi, FakeGdo0, FakeDelay> {
        Cc1101::new(
            FakeSpi(self.clone()),
            FakeGdo0(self.clone()),
            FakeDelay(self.clone()),
        )
    }
}

pub struct FakeSpi(FakeChip);

impl SpiErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        let mut chip = self.0.state_mut();
        // (address, burst) once the header byte has been clocked out
        let mut cursor: Option<(u8, bool)> = None;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        clock_in(&mut chip, &mut cursor, byte);
                    }
                }
                Operation::Read(buf) => {
                    for byte in buf.iter_mut() {
                        *byte = match &mut cursor {
                            Some((address, burst)) => {
                                let value = chip.read(*address, *burst);
                                if *burst && *address != FIFO && *address < 0x30 {
                                    *address += 1;
                                }
                                value
                            }
                            None => 0,
                        };
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for byte in buf.iter_mut() {
                        clock_in(&mut chip, &mut cursor, *byte);
                        // chip status byte
                        *byte = 0;
                    }
                }
                Operation::Transfer(read, written) => {
                    for &byte in written.iter() {
                        clock_in(&mut chip, &mut cursor, byte);
                    }
                    read.fill(0);
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

fn clock_in(chip: &mut ChipState, cursor: &mut Option<(u8, bool)>, byte: u8) {
    match cursor {
        None => {
            let address = byte & 0x3F;
            let burst = byte & WRITE_BURST != 0;
            let read = byte & READ_SINGLE != 0;
            if (0x30..=0x3D).contains(&address) && !burst && !read {
                chip.strobe(address);
            } else {
                *cursor = Some((address, burst));
            }
        }
        Some((address, burst)) => {
            chip.write(*address, byte);
            if *burst && *address != FIFO {
                *address += 1;
            }
        }
    }
}

/// GDO0 pin: "asserted" while the RX FIFO holds data
pub struct FakeGdo0(FakeChip);

impl FakeGdo0 {
    async fn wait_for_packet(&mut self) -> Result<(), Infallible> {
        if self.0.state().rx_fifo.is_empty() {
            core::future::pending::<()>().await;
        }
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for FakeGdo0 {
    type Error = Infallible;
}

impl Wait for FakeGdo0 {
    async fn wait_for_high(&mut self) -> Result<(), Self::Error> {
        self.wait_for_packet().await
    }

    async fn wait_for_low(&mut self) -> Result<(), Self::Error> {
        core::future::pending().await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_packet().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Self::Error> {
        core::future::pending().await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Self::Error> {
        self.wait_for_packet().await
    }
}

/// Records requested delays and returns immediately
pub struct FakeDelay(FakeChip);

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.0.state_mut().delays_ms.push(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.0.state_mut().delays_ms.push(ms);
    }
}

/// Virtual monotonic time shared by [`MockClock`] and [`MockTransceiver`]
#[derive(Clone, Default)]
pub struct VirtualTime(Rc<Cell<Duration>>);

impl VirtualTime {
    pub fn now(&self) -> Duration {
        self.0.get()
    }

    pub fn advance(&self, duration: Duration) {
        self.0.set(self.0.get() + duration);
    }
}

/// Unix time at virtual time zero: 2020-12-07T10:00:00Z
pub const EPOCH_UNIX_SECS: i64 = 1_607_335_200;

#[derive(Clone)]
pub struct MockClock {
    pub time: VirtualTime,
    pub sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl MockClock {
    pub fn new(time: VirtualTime) -> Self {
        Self {
            time,
            sleeps: Rc::default(),
        }
    }

    pub fn sleeps_secs(&self) -> Vec<u64> {
        self.sleeps.borrow().iter().map(Duration::as_secs).collect()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Duration {
        self.time.now()
    }

    async fn sleep(&mut self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.time.advance(duration);
    }

    fn timestamp(&self) -> Timestamp {
        Timestamp::new(EPOCH_UNIX_SECS + self.time.now().as_secs() as i64, 3600)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock device error")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open,
    Close,
    Configure,
    ReleaseLock,
    WaitForPacket(Duration),
}

/// Scripted result of one `wait_for_packet` call
///
/// With nothing scripted the call times out.
pub enum Delivery {
    /// Packet arrives after the given delay
    Packet(Duration, ReceivedPacket),
    /// Fetching fails without error after the given delay
    Nothing(Duration),
    Fail(Error<MockError>),
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<Call>,
    pub open_results: VecDeque<Result<(), Error<MockError>>>,
    pub deliveries: VecDeque<Delivery>,
}

#[derive(Clone)]
pub struct MockTransceiver {
    time: VirtualTime,
    pub state: Rc<RefCell<MockState>>,
}

impl MockTransceiver {
    pub fn new(time: VirtualTime) -> Self {
        Self {
            time,
            state: Rc::default(),
        }
    }

    pub fn deliver(&self, delivery: Delivery) {
        self.state.borrow_mut().deliveries.push_back(delivery);
    }

    pub fn fail_open(&self, error: Error<MockError>) {
        self.state.borrow_mut().open_results.push_back(Err(error));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Transceiver for MockTransceiver {
    type Error = MockError;

    async fn open(&mut self) -> Result<(), Error<MockError>> {
        self.record(Call::Open);
        let result = self.state.borrow_mut().open_results.pop_front();
        result.unwrap_or(Ok(()))
    }

    async fn close(&mut self) -> Result<(), Error<MockError>> {
        self.record(Call::Close);
        Ok(())
    }

    async fn configure(&mut self, config: &RadioConfig) -> Result<RadioSettings, Error<MockError>> {
        self.record(Call::Configure);
        Ok(RadioSettings {
            base_frequency_hz: config.base_frequency_hz,
            symbol_rate_baud: config.symbol_rate_baud,
            ask_ook: true,
            sync_mode: SyncMode::Transmit16Match15Bits,
            sync_word: config.sync_word,
            crc: config.crc,
            manchester: config.manchester,
            packet_length_bytes: config.packet_length_bytes,
            filter_bandwidth_hz: config.filter_bandwidth.hz(),
        })
    }

    async fn release_lock(&mut self) {
        self.record(Call::ReleaseLock);
    }

    async fn wait_for_packet(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ReceivedPacket>, Error<MockError>> {
        self.record(Call::WaitForPacket(timeout));
        let delivery = self.state.borrow_mut().deliveries.pop_front();
        match delivery {
            Some(Delivery::Packet(after, packet)) => {
                self.time.advance(after.min(timeout));
                Ok(Some(packet))
            }
            Some(Delivery::Nothing(after)) => {
                self.time.advance(after.min(timeout));
                Ok(None)
            }
            Some(Delivery::Fail(error)) => Err(error),
            None => {
                self.time.advance(timeout);
                Ok(None)
            }
        }
    }
}

/// Packet as the radio hands it over for `signal` (sync word stripped)
pub fn packet(signal: &[u8]) -> ReceivedPacket {
    let mut fifo = signal[crate::ft017th::SYNC_WORD.len()..].to_vec();
    fifo.extend([0x20, 0x80]);
    ReceivedPacket::from_fifo(&fifo)
}
