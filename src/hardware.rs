use embassy_embedded_hal::shared_bus::asynch::spi::SpiDevice;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use esp_hal::gpio::AnyPin;
use esp_hal::{
    Async, Blocking,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    peripherals::{I2C1, SPI2},
    spi::{
        Mode,
        master::{Config as SpiConfig, Spi},
    },
    time::Rate,
};
use static_cell::StaticCell;

use crate::config::{CC1101_SPI_FREQ_KHZ, SSD1306_I2C_FREQ_KHZ};

pub type SpiBus = Spi<'static, Async>;

/// SPI2 shared between the devices on it, one transaction at a time
pub type SharedSpiBus = Mutex<CriticalSectionRawMutex, SpiBus>;

pub type Cc1101Spi = SpiDevice<'static, CriticalSectionRawMutex, SpiBus, Output<'static>>;

static SPI_BUS: StaticCell<SharedSpiBus> = StaticCell::new();

/// CC1101 module: SPI with its own chip select plus the GDO0 output
pub struct Cc1101Hardware {
    pub spi: Cc1101Spi,
    pub gdo0: Input<'static>,
}

impl Cc1101Hardware {
    pub fn new<CS, MOSI, MISO, SCK, GDO0>(
        spi_periph: SPI2<'static>,
        cs_gpio: CS,
        mosi_gpio: MOSI,
        miso_gpio: MISO,
        sck_gpio: SCK,
        gdo0_gpio: GDO0,
    ) -> Result<Self, &'static str>
    where
        CS: Into<AnyPin<'static>>,
        MOSI: Into<AnyPin<'static>>,
        MISO: Into<AnyPin<'static>>,
        SCK: Into<AnyPin<'static>>,
        GDO0: Into<AnyPin<'static>>,
    {
        let spi_bus = Spi::new(
            spi_periph,
            SpiConfig::default()
                .with_frequency(Rate::from_khz(CC1101_SPI_FREQ_KHZ))
                .with_mode(Mode::_0),
        )
        .map_err(|_| "Failed to configure SPI2")?
        .with_sck(sck_gpio.into())
        .with_mosi(mosi_gpio.into())
        .with_miso(miso_gpio.into())
        .into_async();

        let bus = SPI_BUS
            .try_init(Mutex::new(spi_bus))
            .ok_or("SPI2 bus already initialized")?;

        let cs = Output::new(cs_gpio.into(), Level::High, OutputConfig::default());
        // GDO0 is push-pull, no pull resistor needed
        let gdo0 = Input::new(
            gdo0_gpio.into(),
            InputConfig::default().with_pull(Pull::None),
        );

        Ok(Self {
            spi: SpiDevice::new(bus, cs),
            gdo0,
        })
    }
}

pub struct SSD1306Hardware<'a> {
    pub i2c: I2c<'a, Blocking>,
}

impl<'a> SSD1306Hardware<'a> {
    pub fn new<SDA, SCL>(i2c_periph: I2C1<'a>, sda: SDA, scl: SCL) -> Result<Self, &'static str>
    where
        SDA: Into<AnyPin<'a>>,
        SCL: Into<AnyPin<'a>>,
    {
        let i2c = I2c::new(
            i2c_periph,
            I2cConfig::default().with_frequency(Rate::from_khz(SSD1306_I2C_FREQ_KHZ)),
        )
        .map_err(|_| "Failed to configure I2C1")?
        .with_sda(sda.into())
        .with_scl(scl.into());

        Ok(Self { i2c })
    }
}
