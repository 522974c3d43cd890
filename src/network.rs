//! WiFi station, DHCP and SNTP wall clock synchronization

use core::fmt;

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{Config, IpEndpoint, Runner, Stack, StackResources};
use embassy_time::{Duration, Instant, Timer};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::Controller;
use esp_radio::wifi::{
    ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent, WifiStaState,
};
use heapless::String;
use log::{debug, error, info, warn};
use static_cell::StaticCell;
use wireless_sensor_core::ntp::{self, NtpError, SyncSchedule};

use crate::clock;
use crate::config::{NTP_MAX_RETRY_DELAY_SECS, NTP_RESYNC_INTERVAL_SECS, NTP_RETRY_DELAY_SECS};

const RECONNECT_DELAY_MS: u64 = 5_000;
const SNTP_TIMEOUT_MS: u64 = 5_000;
const SNTP_RETRY_COUNT: usize = 3;
const SNTP_RETRY_BACKOFF_MS: u64 = 2_000;

static RADIO: StaticCell<Controller<'static>> = StaticCell::new();
static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

/// Bring up the WiFi station and the network stack, spawning their tasks
pub fn start(
    spawner: &Spawner,
    wifi: WIFI<'static>,
    ssid: &'static str,
    password: &'static str,
) -> Result<Stack<'static>, &'static str> {
    let radio = RADIO.init(esp_radio::init().map_err(|_| "Failed to initialize radio")?);
    let (controller, interfaces) = esp_radio::wifi::new(radio, wifi, Default::default())
        .map_err(|_| "Failed to initialize WiFi")?;

    let rng = Rng::new();
    let seed = ((rng.random() as u64) << 32) | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        seed,
    );

    spawner
        .spawn(connection(controller, ssid, password))
        .map_err(|_| "Failed to spawn WiFi connection task")?;
    spawner
        .spawn(net_task(runner))
        .map_err(|_| "Failed to spawn network task")?;
    Ok(stack)
}

/// IPv4 address obtained via DHCP, if any
pub fn ip_address(stack: &Stack<'static>) -> Option<String<16>> {
    use core::fmt::Write;

    let config = stack.config_v4()?;
    let mut address = String::new();
    write!(address, "{}", config.address.address()).ok()?;
    Some(address)
}

#[embassy_executor::task]
async fn connection(
    mut controller: WifiController<'static>,
    ssid: &'static str,
    password: &'static str,
) {
    loop {
        if matches!(esp_radio::wifi::sta_state(), WifiStaState::Connected) {
            controller.wait_for_event(WifiEvent::StaDisconnected).await;
            warn!("WiFi disconnected");
            Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await;
        }
        if !matches!(controller.is_started(), Ok(true)) {
            let client_config = ModeConfig::Client(
                ClientConfig::default()
                    .with_ssid(ssid.into())
                    .with_password(password.into()),
            );
            if let Err(e) = controller.set_config(&client_config) {
                error!("invalid WiFi configuration: {:?}", e);
                return;
            }
            if let Err(e) = controller.start_async().await {
                error!("failed to start WiFi: {:?}", e);
                Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await;
                continue;
            }
        }
        info!("connecting to {}", ssid);
        match controller.connect_async().await {
            Ok(()) => info!("WiFi connected"),
            Err(e) => {
                warn!("failed to connect to WiFi: {:?}", e);
                Timer::after(Duration::from_millis(RECONNECT_DELAY_MS)).await;
            }
        }
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SntpError {
    /// DNS lookup failed or returned no address
    Dns,
    /// Socket bind, send or receive failed
    Socket,
    Timeout,
    /// Response from an address other than the server's
    UnexpectedSender,
    Response(NtpError),
}

impl fmt::Display for SntpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns => write!(f, "DNS lookup failed"),
            Self::Socket => write!(f, "socket error"),
            Self::Timeout => write!(f, "request timed out"),
            Self::UnexpectedSender => write!(f, "response from unexpected sender"),
            Self::Response(e) => write!(f, "invalid response: {}", e),
        }
    }
}

impl core::error::Error for SntpError {}

impl From<NtpError> for SntpError {
    fn from(e: NtpError) -> Self {
        Self::Response(e)
    }
}

/// Query `server` once, returning the Unix time and the instant it refers to
pub async fn sntp_request(stack: Stack<'static>, server: &str) -> Result<(i64, Instant), SntpError> {
    let server_ip = *stack
        .dns_query(server, DnsQueryType::A)
        .await
        .map_err(|_| SntpError::Dns)?
        .first()
        .ok_or(SntpError::Dns)?;
    let server_endpoint = IpEndpoint::new(server_ip, ntp::PORT);
    debug!("resolved {} to {}", server, server_ip);

    let mut rx_meta = [PacketMetadata::EMPTY; 2];
    let mut rx_buffer = [0u8; 64];
    let mut tx_meta = [PacketMetadata::EMPTY; 2];
    let mut tx_buffer = [0u8; 64];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| SntpError::Socket)?;

    let transmitted_at = Instant::now();
    socket
        .send_to(&ntp::request(), server_endpoint)
        .await
        .map_err(|_| SntpError::Socket)?;

    let mut response = [0u8; ntp::PACKET_LEN];
    let timeout = Timer::after(Duration::from_millis(SNTP_TIMEOUT_MS));
    let (len, metadata) = match select(timeout, socket.recv_from(&mut response)).await {
        Either::First(()) => return Err(SntpError::Timeout),
        Either::Second(result) => result.map_err(|_| SntpError::Socket)?,
    };
    let received_at = Instant::now();
    if metadata.endpoint.addr != server_ip {
        return Err(SntpError::UnexpectedSender);
    }

    let rtt_half_micros = received_at.duration_since(transmitted_at).as_micros() / 2;
    let unix_secs = ntp::parse_response(&response[..len], rtt_half_micros)?;
    Ok((unix_secs, received_at))
}

async fn synchronize(stack: Stack<'static>, server: &str) -> Result<(), SntpError> {
    let mut last_error = SntpError::Timeout;
    for attempt in 1..=SNTP_RETRY_COUNT {
        match sntp_request(stack, server).await {
            Ok((unix_secs, measured_at)) => {
                clock::set_unix_time(unix_secs, measured_at);
                return Ok(());
            }
            Err(e) => {
                warn!("SNTP request to {} failed (attempt {}): {}", server, attempt, e);
                last_error = e;
                Timer::after(Duration::from_millis(SNTP_RETRY_BACKOFF_MS)).await;
            }
        }
    }
    Err(last_error)
}

/// Set the wall clock once the network is up and keep it in sync
#[embassy_executor::task]
pub async fn time_sync(stack: Stack<'static>, server: &'static str) {
    stack.wait_config_up().await;
    if let Some(address) = ip_address(&stack) {
        info!("network up, address {}", address);
    }
    let mut schedule = SyncSchedule::new(
        core::time::Duration::from_secs(NTP_RESYNC_INTERVAL_SECS),
        core::time::Duration::from_secs(NTP_RETRY_DELAY_SECS),
        core::time::Duration::from_secs(NTP_MAX_RETRY_DELAY_SECS),
    );
    loop {
        let synchronized = match synchronize(stack, server).await {
            Ok(()) => true,
            Err(e) => {
                error!("SNTP synchronization with {} failed: {}", server, e);
                false
            }
        };
        let delay = schedule.next_delay(synchronized);
        debug!("next SNTP synchronization in {}s", delay.as_secs());
        Timer::after_secs(delay.as_secs()).await;
    }
}
