use embedded_graphics::{
    mono_font::{MonoTextStyle, MonoTextStyleBuilder, ascii::FONT_6X10},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text, TextStyle, TextStyleBuilder},
};
use esp_hal::{Blocking, i2c::master::I2c};
use ssd1306::{I2CDisplayInterface, Ssd1306, mode::BufferedGraphicsMode, prelude::*};
use wireless_sensor_core::traits::TextDisplay;

use crate::hardware::SSD1306Hardware;

type Driver = Ssd1306<
    I2CInterface<I2c<'static, Blocking>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// 128x64 SSD1306 OLED showing the latest measurements
pub struct StatusDisplay {
    driver: Driver,
    character_style: MonoTextStyle<'static, BinaryColor>,
    text_style: TextStyle,
}

impl StatusDisplay {
    pub fn new(hw: SSD1306Hardware<'static>) -> Result<Self, &'static str> {
        let interface = I2CDisplayInterface::new(hw.i2c);
        let mut driver = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        driver
            .init()
            .map_err(|_| "Failed to initialize SSD1306")?;
        log::info!("SSD1306 initialized");

        Ok(Self {
            driver,
            character_style: MonoTextStyleBuilder::new()
                .font(&FONT_6X10)
                .text_color(BinaryColor::On)
                .build(),
            text_style: TextStyleBuilder::new().baseline(Baseline::Top).build(),
        })
    }
}

impl TextDisplay for StatusDisplay {
    fn clear(&mut self) -> Result<(), &'static str> {
        self.driver
            .clear(BinaryColor::Off)
            .map_err(|_| "Failed to clear display")
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), &'static str> {
        Text::with_text_style(text, Point::new(x, y), self.character_style, self.text_style)
            .draw(&mut self.driver)
            .map_err(|_| "Failed to draw text")?;
        Ok(())
    }

    fn update(&mut self) -> Result<(), &'static str> {
        self.driver.flush().map_err(|_| "Failed to update display")
    }
}
