// Model of the data shown on the status display

use core::fmt::Write;

use heapless::String;
use wireless_sensor_core::{Measurement, ReceptionLog, logic};
use wireless_sensor_core::traits::TextDisplay;

pub struct Model {
    pub log: ReceptionLog,
    pub ip_address: Option<String<16>>,
    pub clock_synchronized: bool,
}

impl Model {
    pub const fn new() -> Self {
        Self {
            log: ReceptionLog::new(),
            ip_address: None,
            clock_synchronized: false,
        }
    }

    pub fn record(&mut self, measurement: Measurement) {
        self.log.record(measurement);
    }

    pub fn record_timeout(&mut self) {
        self.log.record_timeout();
    }

    /// Bottom line: address and a `*` once the wall clock is set
    pub fn status_line(&self) -> String<32> {
        let mut line = String::new();
        let _ = match &self.ip_address {
            Some(address) => write!(line, "IP {}", address),
            None => write!(line, "No network"),
        };
        if self.clock_synchronized {
            let _ = line.push_str(" *");
        }
        line
    }

    pub fn render<D: TextDisplay>(&self, display: &mut D) -> Result<(), &'static str> {
        logic::update_display(display, &self.log, self.status_line().as_str())
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
