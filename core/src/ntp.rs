//! SNTP (RFC 4330) client packet handling
//!
//! Only the 48 byte header is used: the request carries mode 3 (client),
//! the transmit timestamp of the response is taken as the current time.

use core::fmt;
use core::time::Duration;

pub const PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

/// Seconds from 1900-01-01 (NTP epoch) to 1970-01-01 (Unix epoch)
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Stratum 0 is a kiss-o'-death packet, 16 means unsynchronized
const MAX_STRATUM: u8 = 15;

const MODE_SERVER: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NtpError {
    /// Response shorter than the NTP header
    Truncated(usize),
    /// Response is not a server reply
    UnexpectedMode(u8),
    /// Server is not synchronized or sent a kiss-o'-death
    InvalidStratum(u8),
    /// Transmit timestamp is zero
    MissingTimestamp,
}

impl fmt::Display for NtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated(len) => write!(f, "truncated response: {} bytes", len),
            Self::UnexpectedMode(mode) => write!(f, "unexpected mode {}", mode),
            Self::InvalidStratum(stratum) => write!(f, "invalid stratum {}", stratum),
            Self::MissingTimestamp => write!(f, "missing transmit timestamp"),
        }
    }
}

impl core::error::Error for NtpError {}

/// Client request: LI = 0, VN = 4, mode = 3
pub fn request() -> [u8; PACKET_LEN] {
    let mut packet = [0; PACKET_LEN];
    packet[0] = 0b00_100_011;
    packet
}

/// Server time in whole seconds since the Unix epoch
///
/// `rtt_half_micros` is added as round trip correction.
pub fn parse_response(response: &[u8], rtt_half_micros: u64) -> Result<i64, NtpError> {
    if response.len() < PACKET_LEN {
        return Err(NtpError::Truncated(response.len()));
    }
    let mode = response[0] & 0b111;
    if mode != MODE_SERVER {
        return Err(NtpError::UnexpectedMode(mode));
    }
    let stratum = response[1];
    if stratum == 0 || stratum > MAX_STRATUM {
        return Err(NtpError::InvalidStratum(stratum));
    }
    let secs = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    let frac = u32::from_be_bytes([response[44], response[45], response[46], response[47]]);
    if secs == 0 && frac == 0 {
        return Err(NtpError::MissingTimestamp);
    }
    let micros = ((frac as u64 * 1_000_000) >> 32) + rtt_half_micros.min(1_000_000);
    Ok(ntp_to_unix_secs(secs) + (micros / 1_000_000) as i64)
}

/// Era 0 ends in 2036; timestamps with the top bit clear belong to era 1
fn ntp_to_unix_secs(secs: u32) -> i64 {
    let secs = if secs & 0x8000_0000 == 0 {
        secs as i64 + (1 << 32)
    } else {
        secs as i64
    };
    secs - NTP_UNIX_OFFSET
}

/// Pause between synchronization rounds
///
/// Until a round succeeds the pause starts at `retry_delay` and doubles up
/// to `max_retry_delay`; after a success the clock is resynchronized every
/// `resync_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSchedule {
    resync_interval: Duration,
    retry_delay: Duration,
    max_retry_delay: Duration,
    next_retry_delay: Duration,
}

impl SyncSchedule {
    pub const fn new(
        resync_interval: Duration,
        retry_delay: Duration,
        max_retry_delay: Duration,
    ) -> Self {
        Self {
            resync_interval,
            retry_delay,
            max_retry_delay,
            next_retry_delay: retry_delay,
        }
    }

    /// Pause after a round that did (`true`) or did not synchronize the clock
    pub fn next_delay(&mut self, synchronized: bool) -> Duration {
        if synchronized {
            self.next_retry_delay = self.retry_delay;
            return self.resync_interval;
        }
        let delay = self.next_retry_delay.min(self.resync_interval);
        self.next_retry_delay = (self.next_retry_delay * 2).min(self.max_retry_delay);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(stratum: u8, secs: u32, frac: u32) -> [u8; PACKET_LEN] {
        let mut packet = [0; PACKET_LEN];
        packet[0] = 0b00_100_100;
        packet[1] = stratum;
        packet[40..44].copy_from_slice(&secs.to_be_bytes());
        packet[44..48].copy_from_slice(&frac.to_be_bytes());
        packet
    }

    #[test]
    fn test_request() {
        let packet = request();
        assert_eq!(packet[0], 0x23);
        assert!(packet[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_parse_response() {
        // 2020-12-07T10:00:00Z
        let secs = (1_607_335_200 + NTP_UNIX_OFFSET) as u32;
        assert_eq!(parse_response(&response(2, secs, 0), 0), Ok(1_607_335_200));
    }

    #[test]
    fn test_parse_response_rounds_up_with_rtt() {
        let secs = (1_607_335_200 + NTP_UNIX_OFFSET) as u32;
        // 0.75 s + 0.3 s
        let packet = response(1, secs, 0xC000_0000);
        assert_eq!(parse_response(&packet, 300_000), Ok(1_607_335_201));
        assert_eq!(parse_response(&packet, 0), Ok(1_607_335_200));
    }

    #[test]
    fn test_parse_response_era_1() {
        // NTP second 1 of era 1 is 2036-02-07T06:28:17Z
        assert_eq!(parse_response(&response(2, 1, 0), 0), Ok(2_085_978_497));
    }

    #[test]
    fn test_parse_response_invalid() {
        let secs = (1_607_335_200 + NTP_UNIX_OFFSET) as u32;
        assert_eq!(
            parse_response(&response(2, secs, 0)[..47], 0),
            Err(NtpError::Truncated(47))
        );
        assert_eq!(
            parse_response(&response(0, secs, 0), 0),
            Err(NtpError::InvalidStratum(0))
        );
        assert_eq!(
            parse_response(&response(16, secs, 0), 0),
            Err(NtpError::InvalidStratum(16))
        );
        assert_eq!(
            parse_response(&response(2, 0, 0), 0),
            Err(NtpError::MissingTimestamp)
        );
        let mut client = response(2, secs, 0);
        client[0] = request()[0];
        assert_eq!(
            parse_response(&client, 0),
            Err(NtpError::UnexpectedMode(3))
        );
    }

    fn schedule() -> SyncSchedule {
        SyncSchedule::new(
            Duration::from_secs(6 * 3600),
            Duration::from_secs(10),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_schedule_retries_until_synchronized() {
        let mut schedule = schedule();
        let delays: Vec<u64> = (0..7)
            .map(|_| schedule.next_delay(false).as_secs())
            .collect();
        assert_eq!(delays, [10, 20, 40, 80, 160, 300, 300]);
        assert_eq!(schedule.next_delay(true), Duration::from_secs(6 * 3600));
    }

    #[test]
    fn test_schedule_backoff_restarts_after_success() {
        let mut schedule = schedule();
        schedule.next_delay(false);
        schedule.next_delay(false);
        assert_eq!(schedule.next_delay(true), Duration::from_secs(6 * 3600));
        assert_eq!(schedule.next_delay(false), Duration::from_secs(10));
    }

    #[test]
    fn test_schedule_retry_never_exceeds_resync_interval() {
        let mut schedule = SyncSchedule::new(
            Duration::from_secs(60),
            Duration::from_secs(50),
            Duration::from_secs(300),
        );
        assert_eq!(schedule.next_delay(false), Duration::from_secs(50));
        assert_eq!(schedule.next_delay(false), Duration::from_secs(60));
    }
}
