//! Network collaborators used by the Wi-Fi states.
//!
//! The controller never touches a radio directly. Association goes through
//! [`WifiLink`], byte transfer through [`Transport`]; the firmware binds both
//! to the ESP32 radio and the emulator binds them to host sockets.

use core::{fmt, net::Ipv4Addr, str::FromStr, time::Duration};

use crate::clock::{Clock, duration_ms, elapsed_ms};

pub mod probe;

/// Longest SSID accepted by 802.11.
pub const SSID_MAX: usize = 32;
/// Longest WPA2 passphrase.
pub const PASSWORD_MAX: usize = 64;

/// IPv4 peer address and TCP port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub address: [u8; 4],
    pub port: u16,
}

impl Endpoint {
    pub const fn new(address: [u8; 4], port: u16) -> Self {
        Self { address, port }
    }

    /// Address as a [`core::net::Ipv4Addr`].
    pub const fn ip(&self) -> Ipv4Addr {
        let [a, b, c, d] = self.address;
        Ipv4Addr::new(a, b, c, d)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip(), self.port)
    }
}

/// Error returned when an endpoint string is malformed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EndpointParseError {
    MissingPort,
    InvalidAddress,
    InvalidPort,
}

impl fmt::Display for EndpointParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointParseError::MissingPort => f.write_str("expected `<a.b.c.d>:<port>`"),
            EndpointParseError::InvalidAddress => f.write_str("invalid IPv4 address"),
            EndpointParseError::InvalidPort => f.write_str("invalid TCP port"),
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (address, port) = value
            .trim()
            .rsplit_once(':')
            .ok_or(EndpointParseError::MissingPort)?;
        let address: Ipv4Addr = address
            .parse()
            .map_err(|_| EndpointParseError::InvalidAddress)?;
        let port: u16 = port.parse().map_err(|_| EndpointParseError::InvalidPort)?;
        if port == 0 {
            return Err(EndpointParseError::InvalidPort);
        }
        Ok(Self::new(address.octets(), port))
    }
}

/// Network name and passphrase used for association.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

impl<'a> WifiCredentials<'a> {
    pub const fn new(ssid: &'a str, password: &'a str) -> Self {
        Self { ssid, password }
    }

    /// Validates the lengths accepted by the radio firmware.
    pub fn validate(&self) -> Result<(), CredentialsError> {
        if self.ssid.is_empty() || self.ssid.len() > SSID_MAX {
            return Err(CredentialsError::SsidLength);
        }
        if self.password.len() > PASSWORD_MAX {
            return Err(CredentialsError::PasswordLength);
        }
        Ok(())
    }
}

impl fmt::Debug for WifiCredentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credential validation failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CredentialsError {
    SsidLength,
    PasswordLength,
}

impl fmt::Display for CredentialsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsError::SsidLength => write!(f, "SSID must be 1..={SSID_MAX} bytes"),
            CredentialsError::PasswordLength => {
                write!(f, "password must be at most {PASSWORD_MAX} bytes")
            }
        }
    }
}

/// Association status reported by the radio.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkStatus {
    Idle,
    Connecting,
    Connected,
    Failed,
}

/// Station-mode association control.
#[allow(async_fn_in_trait)]
pub trait WifiLink {
    /// Starts association and reports the status observed immediately after.
    async fn begin(&mut self, credentials: WifiCredentials<'_>) -> LinkStatus;

    /// Polls the current association status.
    async fn status(&mut self) -> LinkStatus;

    /// Tears down the association. Best effort.
    async fn disconnect(&mut self);
}

/// Failure surfaced by a transport when opening a connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    Refused,
    Unreachable,
    TimedOut,
    NoRoute,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransportError::Refused => "connection refused",
            TransportError::Unreachable => "peer unreachable",
            TransportError::TimedOut => "connect timed out",
            TransportError::NoRoute => "no route to peer",
        };
        f.write_str(text)
    }
}

/// Single TCP connection owned by one throughput probe at a time.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Opens a connection to `endpoint`.
    async fn open(&mut self, endpoint: Endpoint) -> Result<(), TransportError>;

    /// Reads one byte. `None` means no data is available yet, the equivalent
    /// of a `-1` read; it is a backpressure signal, not end of stream.
    async fn read_byte(&mut self) -> Option<u8>;

    /// Writes `data`, returning how many bytes the transport accepted.
    async fn write(&mut self, data: &[u8]) -> usize;

    /// Closes the connection. Safe to call after a failed open.
    async fn close(&mut self);
}

/// How long the `WifiConnect` state waits for a link.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum AssociationPolicy {
    /// Poll until connected, however long that takes.
    #[default]
    Unbounded,
    /// Give up after the bound and let the sequence move on.
    Timeout(Duration),
}

/// Association failure under [`AssociationPolicy::Timeout`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AssociationError {
    TimedOut { elapsed_ms: u64, last: LinkStatus },
}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationError::TimedOut { elapsed_ms, last } => {
                write!(f, "association timed out after {elapsed_ms} ms ({last:?})")
            }
        }
    }
}

/// Starts association and busy-polls the link until it reports `Connected`.
///
/// Returns the time spent associating.
pub async fn associate<L, C>(
    link: &mut L,
    clock: &C,
    credentials: WifiCredentials<'_>,
    policy: AssociationPolicy,
) -> Result<u64, AssociationError>
where
    L: WifiLink + ?Sized,
    C: Clock + ?Sized,
{
    let started = clock.now_ms();
    let mut status = link.begin(credentials).await;

    loop {
        let elapsed = elapsed_ms(started, clock.now_ms());
        if status == LinkStatus::Connected {
            return Ok(elapsed);
        }

        if let AssociationPolicy::Timeout(limit) = policy
            && elapsed >= duration_ms(limit)
        {
            return Err(AssociationError::TimedOut {
                elapsed_ms: elapsed,
                last: status,
            });
        }

        status = link.status().await;
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    #[test]
    fn endpoint_parses_address_and_port() {
        let endpoint: Endpoint = "192.168.0.10:19".parse().expect("valid endpoint");
        assert_eq!(endpoint, Endpoint::new([192, 168, 0, 10], 19));

        assert_eq!(
            "192.168.0.10".parse::<Endpoint>(),
            Err(EndpointParseError::MissingPort)
        );
        assert_eq!(
            "192.168.0:9".parse::<Endpoint>(),
            Err(EndpointParseError::InvalidAddress)
        );
        assert_eq!(
            "10.0.0.1:0".parse::<Endpoint>(),
            Err(EndpointParseError::InvalidPort)
        );
    }

    #[test]
    fn credentials_enforce_radio_limits() {
        assert!(WifiCredentials::new("bench", "secret").validate().is_ok());
        assert_eq!(
            WifiCredentials::new("", "secret").validate(),
            Err(CredentialsError::SsidLength)
        );
        let long = [b'x'; PASSWORD_MAX + 1];
        let long = core::str::from_utf8(&long).expect("ascii");
        assert_eq!(
            WifiCredentials::new("bench", long).validate(),
            Err(CredentialsError::PasswordLength)
        );
    }

    struct CountingClock {
        now: Cell<u64>,
    }

    impl Clock for CountingClock {
        fn now_ms(&self) -> u64 {
            let value = self.now.get();
            self.now.set(value + 10);
            value
        }

        async fn delay(&mut self, _: Duration) {}
    }

    struct ScriptedLink {
        connect_after: Option<u32>,
        polls: u32,
    }

    impl WifiLink for ScriptedLink {
        async fn begin(&mut self, _: WifiCredentials<'_>) -> LinkStatus {
            LinkStatus::Connecting
        }

        async fn status(&mut self) -> LinkStatus {
            self.polls += 1;
            match self.connect_after {
                Some(limit) if self.polls >= limit => LinkStatus::Connected,
                _ => LinkStatus::Connecting,
            }
        }

        async fn disconnect(&mut self) {}
    }

    #[test]
    fn association_polls_until_connected() {
        let clock = CountingClock { now: Cell::new(0) };
        let mut link = ScriptedLink {
            connect_after: Some(5),
            polls: 0,
        };

        let elapsed = embassy_futures::block_on(associate(
            &mut link,
            &clock,
            WifiCredentials::new("bench", "secret"),
            AssociationPolicy::Unbounded,
        ))
        .expect("link comes up");

        assert_eq!(link.polls, 5);
        assert!(elapsed > 0);
    }

    #[test]
    fn bounded_association_gives_up() {
        let clock = CountingClock { now: Cell::new(0) };
        let mut link = ScriptedLink {
            connect_after: None,
            polls: 0,
        };

        let result = embassy_futures::block_on(associate(
            &mut link,
            &clock,
            WifiCredentials::new("bench", "secret"),
            AssociationPolicy::Timeout(Duration::from_millis(100)),
        ));

        assert!(matches!(
            result,
            Err(AssociationError::TimedOut {
                last: LinkStatus::Connecting,
                ..
            })
        ));
        assert!(link.polls >= 9);
    }
}
