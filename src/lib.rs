//! ESP32-S3 board support for receiving FT017TH thermo/hygrometers
//!
//! The decoding and reception logic lives in `wireless-sensor-core`; this
//! crate wires it to the CC1101 on SPI2, the SSD1306 on I2C1, WiFi and SNTP.

#![no_std]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod display;
pub mod hardware;
pub mod model;
pub mod network;
pub mod radio;
