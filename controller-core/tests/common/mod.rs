#![allow(dead_code)]

use core::{cell::Cell, time::Duration};
use std::rc::Rc;

use controller_core::{
    Board, BenchConfig, PowerController, Step,
    clock::{Clock, duration_ms},
    cursor::MemoryCursor,
    network::{Endpoint, LinkStatus, Transport, TransportError, WifiCredentials, WifiLink},
    sequence::{PowerState, WakeTimer},
    telemetry::{BenchEvent, TelemetryLog},
    transition::{Halt, PowerControl},
    trigger::TriggerLine,
};
use embassy_futures::block_on;

pub type FakeBoard = Board<FakeClock, RecordingTrigger, FakeLink, ScriptedTransport, FakePower>;
pub type Controller<'a, 'c> = PowerController<
    'a,
    &'c mut MemoryCursor,
    FakeClock,
    RecordingTrigger,
    FakeLink,
    ScriptedTransport,
    FakePower,
>;
pub type Log = TelemetryLog<256>;

/// Shared millisecond counter; every read advances it by `tick`.
#[derive(Clone)]
pub struct FakeClock {
    now: Rc<Cell<u64>>,
    tick: u64,
}

impl FakeClock {
    pub fn new(tick: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            tick,
        }
    }

    pub fn peek(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        let value = self.now.get();
        self.now.set(value + self.tick);
        value
    }

    async fn delay(&mut self, duration: Duration) {
        self.advance(duration_ms(duration));
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    Rise(u64),
    Fall(u64),
}

pub struct RecordingTrigger {
    clock: FakeClock,
    pub edges: Vec<Edge>,
    high: bool,
}

impl RecordingTrigger {
    pub fn new(clock: &FakeClock) -> Self {
        Self {
            clock: clock.clone(),
            edges: Vec::new(),
            high: false,
        }
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn pulses(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| matches!(edge, Edge::Rise(_)))
            .count()
    }
}

impl TriggerLine for RecordingTrigger {
    fn set_high(&mut self) {
        self.high = true;
        self.edges.push(Edge::Rise(self.clock.peek()));
    }

    fn set_low(&mut self) {
        self.high = false;
        self.edges.push(Edge::Fall(self.clock.peek()));
    }
}

/// Link that reports `Connected` after a fixed number of status polls.
pub struct FakeLink {
    pub connect_after: Option<u32>,
    pub polls: u32,
    pub begins: u32,
    pub disconnects: u32,
    pub connected: bool,
}

impl FakeLink {
    pub fn connecting_after(polls: u32) -> Self {
        Self {
            connect_after: Some(polls),
            polls: 0,
            begins: 0,
            disconnects: 0,
            connected: false,
        }
    }

    pub fn never_connects() -> Self {
        Self {
            connect_after: None,
            ..Self::connecting_after(0)
        }
    }
}

impl WifiLink for FakeLink {
    async fn begin(&mut self, credentials: WifiCredentials<'_>) -> LinkStatus {
        assert!(credentials.validate().is_ok());
        self.begins += 1;
        self.polls = 0;
        LinkStatus::Connecting
    }

    async fn status(&mut self) -> LinkStatus {
        self.polls += 1;
        match self.connect_after {
            Some(limit) if self.polls >= limit => {
                self.connected = true;
                LinkStatus::Connected
            }
            _ => LinkStatus::Connecting,
        }
    }

    async fn disconnect(&mut self) {
        self.disconnects += 1;
        self.connected = false;
    }
}

/// Transport whose reads yield `leading_idle_reads` sentinels after each
/// open, then bytes, optionally with a sentinel before every byte.
pub struct ScriptedTransport {
    pub open_result: Result<(), TransportError>,
    pub leading_idle_reads: u64,
    pub interleave_idle: bool,
    idle_next: bool,
    pub remaining_idle: u64,
    pub bytes_read: usize,
    pub idle_reads: u64,
    pub writes: Vec<usize>,
    pub opened: Vec<Endpoint>,
    pub closes: u32,
    pub open: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            open_result: Ok(()),
            leading_idle_reads: 0,
            interleave_idle: false,
            idle_next: false,
            remaining_idle: 0,
            bytes_read: 0,
            idle_reads: 0,
            writes: Vec::new(),
            opened: Vec::new(),
            closes: 0,
            open: false,
        }
    }

    pub fn with_leading_idle_reads(mut self, count: u64) -> Self {
        self.leading_idle_reads = count;
        self
    }

    /// Alternates `None` and `Some` once the leading sentinels are used up.
    pub fn interleaving_idle_reads(mut self) -> Self {
        self.interleave_idle = true;
        self
    }

    pub fn refusing(mut self, error: TransportError) -> Self {
        self.open_result = Err(error);
        self
    }
}

impl Transport for ScriptedTransport {
    async fn open(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        self.opened.push(endpoint);
        self.remaining_idle = self.leading_idle_reads;
        self.idle_next = self.interleave_idle;
        self.open = self.open_result.is_ok();
        self.open_result
    }

    async fn read_byte(&mut self) -> Option<u8> {
        if self.remaining_idle > 0 {
            self.remaining_idle -= 1;
            self.idle_reads += 1;
            return None;
        }
        if self.interleave_idle {
            self.idle_next = !self.idle_next;
            if !self.idle_next {
                self.idle_reads += 1;
                return None;
            }
        }
        self.bytes_read += 1;
        Some(b'!')
    }

    async fn write(&mut self, data: &[u8]) -> usize {
        self.writes.push(data.len());
        if self.open { data.len() } else { 0 }
    }

    async fn close(&mut self) {
        self.closes += 1;
        self.open = false;
    }
}

/// Light sleep advances the clock; deep sleep and restart must never be
/// entered directly by the controller.
pub struct FakePower {
    clock: FakeClock,
    pub light_sleeps: Vec<WakeTimer>,
}

impl FakePower {
    pub fn new(clock: &FakeClock) -> Self {
        Self {
            clock: clock.clone(),
            light_sleeps: Vec::new(),
        }
    }
}

impl PowerControl for FakePower {
    async fn light_sleep(&mut self, wake: WakeTimer) {
        self.light_sleeps.push(wake);
        self.clock.advance(duration_ms(wake.duration()));
    }

    fn deep_sleep(&mut self, wake: WakeTimer) -> ! {
        panic!("deep sleep ({wake}) entered directly");
    }

    fn restart(&mut self) -> ! {
        panic!("restart entered directly");
    }
}

pub fn board() -> FakeBoard {
    let clock = FakeClock::new(1);
    Board::new(
        clock.clone(),
        RecordingTrigger::new(&clock),
        FakeLink::connecting_after(3),
        ScriptedTransport::new().with_leading_idle_reads(4),
        FakePower::new(&clock),
    )
}

/// Short dwell and budget so a whole cycle runs quickly.
pub fn fast_config() -> BenchConfig<'static> {
    BenchConfig::new(WifiCredentials::new("bench-ap", "hunter22"))
        .with_dwell(Duration::from_millis(20))
        .with_transfer_budget(5_000)
}

/// Boots a controller on `cursor` and steps it until a halting state.
///
/// Returns the halt and the board so the caller can "reboot" onto it.
pub fn run_boot(
    config: BenchConfig<'_>,
    cursor: &mut MemoryCursor,
    board: FakeBoard,
    log: &mut Log,
) -> (Halt, FakeBoard) {
    let mut controller = PowerController::new(config, cursor, board);
    controller.boot(log);
    loop {
        if let Step::Halt(halt) = block_on(controller.step(log)) {
            let (_, board) = controller.into_parts();
            return (halt, board);
        }
    }
}

/// States announced in the log, oldest first.
pub fn entered_states(log: &Log) -> Vec<PowerState> {
    log.events()
        .filter_map(|event| match event {
            BenchEvent::StateEntered(state) => Some(state),
            _ => None,
        })
        .collect()
}
