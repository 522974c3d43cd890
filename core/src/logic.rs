//! Reception bookkeeping for the status display (hardware-independent)

use core::fmt::Write;

use heapless::String;

use crate::ft017th::Measurement;
use crate::traits::TextDisplay;

/// Vertical distance between status lines in pixels
const LINE_HEIGHT: i32 = 12;

/// Number of measurements averaged
pub const WINDOW: usize = 5;

/// Rolling window of the latest measurements plus reception counters
pub struct ReceptionLog {
    measurements: [Option<Measurement>; WINDOW],
    index: usize,
    received: u32,
    timeouts: u32,
}

impl Default for ReceptionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceptionLog {
    pub const fn new() -> Self {
        Self {
            measurements: [None; WINDOW],
            index: 0,
            received: 0,
            timeouts: 0,
        }
    }

    pub fn record(&mut self, measurement: Measurement) {
        self.measurements[self.index] = Some(measurement);
        self.index = (self.index + 1) % WINDOW;
        self.received = self.received.saturating_add(1);
    }

    /// Count a receive timeout (nothing decoded within the receiver timeout)
    pub fn record_timeout(&mut self) {
        self.timeouts = self.timeouts.saturating_add(1);
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.measurements[(self.index + WINDOW - 1) % WINDOW].as_ref()
    }

    fn average(&self, value: impl Fn(&Measurement) -> f32) -> Option<f32> {
        let (sum, count) = self
            .measurements
            .iter()
            .flatten()
            .fold((0.0, 0), |(sum, count), m| (sum + value(m), count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f32)
        }
    }

    pub fn average_temperature(&self) -> Option<f32> {
        self.average(|m| m.temperature_degrees_celsius)
    }

    /// Average relative humidity in `[0, 1]`
    pub fn average_relative_humidity(&self) -> Option<f32> {
        self.average(|m| m.relative_humidity)
    }

    /// `23.9C 47.2%`
    pub fn latest_line(&self) -> String<32> {
        let mut line = String::new();
        match self.latest() {
            Some(m) => {
                let _ = write!(
                    line,
                    "{:.1}C {:.1}%",
                    m.temperature_degrees_celsius,
                    m.relative_humidity_percent()
                );
            }
            None => {
                let _ = line.push_str("No data");
            }
        }
        line
    }

    /// Local time of day of the latest measurement, `10:00:00`
    pub fn latest_time_line(&self) -> String<32> {
        let mut line = String::new();
        if let Some(m) = self.latest() {
            let t = m.decoded_at.local();
            let _ = write!(line, "{:02}:{:02}:{:02}", t.hour, t.minute, t.second);
        }
        line
    }

    /// `Avg: 23.9C 47.2%`
    pub fn average_line(&self) -> String<32> {
        let mut line = String::new();
        if let (Some(temp), Some(humidity)) =
            (self.average_temperature(), self.average_relative_humidity())
        {
            let _ = write!(line, "Avg: {:.1}C {:.1}%", temp, humidity * 100.0);
        }
        line
    }

    /// `Rx: 12 T/O: 1`
    pub fn count_line(&self) -> String<32> {
        let mut line = String::new();
        let _ = write!(line, "Rx: {} T/O: {}", self.received, self.timeouts);
        line
    }
}

/// Redraw the status screen: latest measurement, its time, averages,
/// counters and a caller supplied status line
pub fn update_display<D: TextDisplay>(
    display: &mut D,
    log: &ReceptionLog,
    status: &str,
) -> Result<(), &'static str> {
    display.clear()?;
    let lines = [
        log.latest_line(),
        log.latest_time_line(),
        log.average_line(),
        log.count_line(),
    ];
    let mut y = 0;
    for line in lines.iter().filter(|line| !line.is_empty()) {
        display.draw_text(line.as_str(), 0, y)?;
        y += LINE_HEIGHT;
    }
    display.draw_text(status, 0, 4 * LINE_HEIGHT)?;
    display.update()
}
