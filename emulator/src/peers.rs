//! Loopback character-generator and discard peers.
//!
//! Give both probes something to talk to when no external servers are
//! configured. Each accepted connection gets its own thread; the listeners
//! live until the process exits.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream};
use std::thread;

use controller_core::network::Endpoint;

const LINE_WIDTH: usize = 72;
const PRINTABLE_FIRST: u8 = b' ';
const PRINTABLE_COUNT: usize = 95;

/// Starts a peer that streams rotating printable-ASCII lines until the client
/// closes the connection.
pub fn spawn_chargen() -> io::Result<Endpoint> {
    spawn_peer("chargen", serve_chargen)
}

/// Starts a peer that reads and drops everything it receives.
pub fn spawn_discard() -> io::Result<Endpoint> {
    spawn_peer("discard", serve_discard)
}

fn spawn_peer(name: &str, serve: fn(TcpStream) -> io::Result<()>) -> io::Result<Endpoint> {
    let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();

    thread::Builder::new()
        .name(format!("{name}-peer"))
        .spawn(move || {
            for stream in listener.incoming().flatten() {
                let _ = thread::Builder::new().spawn(move || serve(stream));
            }
        })?;

    Ok(Endpoint::new(Ipv4Addr::LOCALHOST.octets(), port))
}

/// Line `index` of the chargen rotation, CRLF terminated.
#[allow(clippy::cast_possible_truncation)]
pub fn chargen_line(index: usize) -> [u8; LINE_WIDTH + 2] {
    let mut line = [0u8; LINE_WIDTH + 2];
    for (column, byte) in line[..LINE_WIDTH].iter_mut().enumerate() {
        *byte = PRINTABLE_FIRST + ((index + column) % PRINTABLE_COUNT) as u8;
    }
    line[LINE_WIDTH] = b'\r';
    line[LINE_WIDTH + 1] = b'\n';
    line
}

fn serve_chargen(mut stream: TcpStream) -> io::Result<()> {
    let mut index = 0;
    loop {
        stream.write_all(&chargen_line(index))?;
        index = (index + 1) % PRINTABLE_COUNT;
    }
}

fn serve_discard(mut stream: TcpStream) -> io::Result<()> {
    let mut sink = [0u8; 1500];
    while stream.read(&mut sink)? > 0 {}
    Ok(())
}
