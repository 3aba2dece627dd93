//! Station-mode Wi-Fi and TCP over esp-radio and embassy-net.

use controller_core::network::{
    Endpoint, LinkStatus, Transport, TransportError, WifiCredentials, WifiLink,
};
use embassy_futures::yield_now;
use embassy_net::{
    Stack,
    tcp::{ConnectError, State, TcpSocket},
};
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::Write;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};

/// Size of each of the socket's receive and transmit buffers.
pub const SOCKET_BUFFER: usize = 4096;

const SEGMENT: usize = 1460;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_GRACE: Duration = Duration::from_millis(500);
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct EspWifiLink {
    controller: WifiController<'static>,
    stack: Stack<'static>,
}

impl EspWifiLink {
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>) -> Self {
        Self { controller, stack }
    }

    /// Connected once both the radio has associated and DHCP has handed out
    /// an address.
    fn observe(&self) -> LinkStatus {
        match self.controller.is_connected() {
            Ok(true) if self.stack.is_config_up() => LinkStatus::Connected,
            Ok(true) => LinkStatus::Connecting,
            Ok(false) => LinkStatus::Idle,
            Err(_) => LinkStatus::Failed,
        }
    }

    async fn connect(&mut self) -> LinkStatus {
        match self.controller.connect_async().await {
            Ok(()) => self.observe(),
            Err(err) => {
                defmt::warn!("wifi connect failed: {}", defmt::Debug2Format(&err));
                LinkStatus::Failed
            }
        }
    }
}

impl WifiLink for EspWifiLink {
    async fn begin(&mut self, credentials: WifiCredentials<'_>) -> LinkStatus {
        let client = ClientConfig::default()
            .with_ssid(credentials.ssid.into())
            .with_password(credentials.password.into());
        if let Err(err) = self.controller.set_config(&ModeConfig::Client(client)) {
            defmt::warn!("wifi config rejected: {}", defmt::Debug2Format(&err));
            return LinkStatus::Failed;
        }

        if !matches!(self.controller.is_started(), Ok(true))
            && let Err(err) = self.controller.start_async().await
        {
            defmt::warn!("wifi start failed: {}", defmt::Debug2Format(&err));
            return LinkStatus::Failed;
        }

        self.connect().await
    }

    /// Keeps retrying the association while the caller polls, the way the
    /// radio firmware does after `begin`.
    async fn status(&mut self) -> LinkStatus {
        match self.observe() {
            LinkStatus::Idle | LinkStatus::Failed => {
                Timer::after(RETRY_BACKOFF).await;
                self.connect().await
            }
            status => {
                yield_now().await;
                status
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Err(err) = self.controller.disconnect_async().await {
            defmt::debug!("wifi disconnect: {}", defmt::Debug2Format(&err));
        }
    }
}

/// One reusable TCP socket shared by both probes.
pub struct EspTransport {
    socket: TcpSocket<'static>,
    buffer: [u8; SEGMENT],
    filled: usize,
    consumed: usize,
}

impl EspTransport {
    pub fn new(
        stack: Stack<'static>,
        rx_buffer: &'static mut [u8],
        tx_buffer: &'static mut [u8],
    ) -> Self {
        Self {
            socket: TcpSocket::new(stack, rx_buffer, tx_buffer),
            buffer: [0; SEGMENT],
            filled: 0,
            consumed: 0,
        }
    }

    async fn reset_socket(&mut self) {
        if self.socket.state() != State::Closed {
            self.socket.abort();
            let _ = with_timeout(CLOSE_GRACE, self.socket.flush()).await;
        }
    }
}

fn transport_error(err: ConnectError) -> TransportError {
    match err {
        ConnectError::ConnectionReset => TransportError::Refused,
        ConnectError::TimedOut => TransportError::TimedOut,
        ConnectError::NoRoute => TransportError::NoRoute,
        ConnectError::InvalidState => TransportError::Unreachable,
    }
}

impl Transport for EspTransport {
    async fn open(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        self.filled = 0;
        self.consumed = 0;
        self.reset_socket().await;

        let remote = (endpoint.ip(), endpoint.port);
        match with_timeout(CONNECT_TIMEOUT, self.socket.connect(remote)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.reset_socket().await;
                Err(transport_error(err))
            }
            Err(_) => {
                self.reset_socket().await;
                Err(TransportError::TimedOut)
            }
        }
    }

    /// Never waits for data; an empty receive queue yields once and reports
    /// `None` so the network runner gets to fill it.
    async fn read_byte(&mut self) -> Option<u8> {
        if self.consumed == self.filled {
            if !self.socket.can_recv() {
                yield_now().await;
                return None;
            }
            match self.socket.read(&mut self.buffer).await {
                Ok(count) if count > 0 => {
                    self.filled = count;
                    self.consumed = 0;
                }
                _ => return None,
            }
        }

        let byte = self.buffer[self.consumed];
        self.consumed += 1;
        Some(byte)
    }

    async fn write(&mut self, data: &[u8]) -> usize {
        self.socket.write_all(data).await.map_or(0, |()| data.len())
    }

    async fn close(&mut self) {
        self.socket.close();
        let _ = with_timeout(CLOSE_GRACE, self.socket.flush()).await;
        self.reset_socket().await;
        self.filled = 0;
        self.consumed = 0;
    }
}
