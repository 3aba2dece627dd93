//! `std` bindings for the controller traits.

use std::env;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::process::{self, Command};
use std::thread;
use std::time::{Duration, Instant};

use controller_core::clock::Clock;
use controller_core::network::{
    Endpoint, LinkStatus, Transport, TransportError, WifiCredentials, WifiLink,
};
use controller_core::sequence::WakeTimer;
use controller_core::transition::PowerControl;
use controller_core::trigger::TriggerLine;

use crate::retained::REBOOT_MARKER;
use crate::transcript::{SharedTranscript, TranscriptRole};

/// Time the simulated access point takes to accept an association.
pub const SIMULATED_ASSOCIATION: Duration = Duration::from_millis(250);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a read waits before reporting "no data yet".
const READ_POLL: Duration = Duration::from_millis(1);
const SEGMENT: usize = 1460;

pub struct HostClock {
    started_at: Instant,
}

impl HostClock {
    pub fn new(started_at: Instant) -> Self {
        Self { started_at }
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    async fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Trigger that writes its edges to the transcript.
pub struct ConsoleTrigger {
    transcript: SharedTranscript,
}

impl ConsoleTrigger {
    pub fn new(transcript: SharedTranscript) -> Self {
        Self { transcript }
    }
}

impl TriggerLine for ConsoleTrigger {
    fn set_high(&mut self) {
        self.transcript
            .borrow_mut()
            .note(TranscriptRole::Trigger, "trigger rise");
    }

    fn set_low(&mut self) {
        self.transcript
            .borrow_mut()
            .note(TranscriptRole::Trigger, "trigger fall");
    }
}

/// Access point that accepts any credentials after a fixed latency.
pub struct SimulatedLink {
    transcript: SharedTranscript,
    associating_since: Option<Instant>,
    latency: Duration,
}

impl SimulatedLink {
    pub fn new(transcript: SharedTranscript, latency: Duration) -> Self {
        Self {
            transcript,
            associating_since: None,
            latency,
        }
    }
}

impl WifiLink for SimulatedLink {
    async fn begin(&mut self, credentials: WifiCredentials<'_>) -> LinkStatus {
        self.transcript.borrow_mut().note(
            TranscriptRole::Host,
            &format!("associating with `{}`", credentials.ssid),
        );
        self.associating_since = Some(Instant::now());
        LinkStatus::Connecting
    }

    async fn status(&mut self) -> LinkStatus {
        match self.associating_since {
            Some(since) if since.elapsed() >= self.latency => LinkStatus::Connected,
            Some(_) => LinkStatus::Connecting,
            None => LinkStatus::Idle,
        }
    }

    async fn disconnect(&mut self) {
        self.associating_since = None;
    }
}

/// Blocking TCP client with a short read timeout standing in for the
/// radio's "no data yet" reads.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    buffer: [u8; SEGMENT],
    filled: usize,
    consumed: usize,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            stream: None,
            buffer: [0; SEGMENT],
            filled: 0,
            consumed: 0,
        }
    }

    fn connect(endpoint: Endpoint) -> io::Result<TcpStream> {
        let addr = SocketAddr::from((endpoint.ip(), endpoint.port));
        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        stream.set_read_timeout(Some(READ_POLL))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn transport_error(err: &io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::ConnectionRefused => TransportError::Refused,
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::TimedOut,
        ErrorKind::NetworkUnreachable => TransportError::NoRoute,
        _ => TransportError::Unreachable,
    }
}

impl Transport for TcpTransport {
    async fn open(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        self.filled = 0;
        self.consumed = 0;
        match Self::connect(endpoint) {
            Ok(stream) => {
                self.stream = Some(stream);
                Ok(())
            }
            Err(err) => {
                self.stream = None;
                Err(transport_error(&err))
            }
        }
    }

    async fn read_byte(&mut self) -> Option<u8> {
        if self.consumed == self.filled {
            let stream = self.stream.as_mut()?;
            match stream.read(&mut self.buffer) {
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
        match self.stream.as_mut() {
            Some(stream) => stream.write_all(data).map_or(0, |()| data.len()),
            None => 0,
        }
    }

    async fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.filled = 0;
        self.consumed = 0;
    }
}

/// Light sleep blocks the thread; deep sleep and restart re-execute the
/// process, leaving only the cursor file behind.
pub struct HostPower {
    transcript: SharedTranscript,
}

impl HostPower {
    pub fn new(transcript: SharedTranscript) -> Self {
        Self { transcript }
    }

    fn reboot(&mut self, reason: &str) -> ! {
        let error = {
            let mut transcript = self.transcript.borrow_mut();
            transcript.note(TranscriptRole::Host, &format!("{reason}: re-executing"));
            let _ = transcript.flush();
            match env::current_exe() {
                Ok(exe) => relaunch(
                    Command::new(exe)
                        .args(env::args_os().skip(1))
                        .env(REBOOT_MARKER, reason),
                ),
                Err(err) => err,
            }
        };
        eprintln!("Failed to re-execute emulator: {error}");
        process::exit(1)
    }
}

#[cfg(unix)]
fn relaunch(command: &mut Command) -> io::Error {
    use std::os::unix::process::CommandExt;

    command.exec()
}

#[cfg(not(unix))]
fn relaunch(command: &mut Command) -> io::Error {
    match command.status() {
        Ok(status) => process::exit(status.code().unwrap_or(1)),
        Err(err) => err,
    }
}

impl PowerControl for HostPower {
    async fn light_sleep(&mut self, wake: WakeTimer) {
        thread::sleep(wake.duration());
    }

    fn deep_sleep(&mut self, wake: WakeTimer) -> ! {
        thread::sleep(wake.duration());
        self.reboot("deep sleep")
    }

    fn restart(&mut self) -> ! {
        self.reboot("restart")
    }
}
