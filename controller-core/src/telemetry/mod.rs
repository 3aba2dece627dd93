//! Benchmark event catalog and the recent-history ring.
//!
//! The core never writes diagnostics itself. It reports [`BenchEvent`]s to a
//! [`TelemetrySink`]; the firmware forwards them to `defmt`, the emulator to
//! its transcript, and tests collect them in a [`TelemetryLog`]. The
//! `Display` output of each event is the line printed on the serial console.

use core::fmt;

use heapless::HistoryBuf;

use crate::{
    network::{
        AssociationError, Endpoint, TransportError,
        probe::{ProbeKind, ProbeReport},
    },
    sequence::{PowerState, WakeTimer},
    stress::StressReport,
    transition::Halt,
};

/// Default number of records retained by [`TelemetryLog`].
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Monotonic identifier assigned to each recorded event.
pub type EventId = u32;

/// Something the controller did that an observer may want to log.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum BenchEvent {
    Boot { resumed_at: PowerState, cold: bool },
    StateEntered(PowerState),
    ComputeFinished(StressReport),
    Associated { elapsed_ms: u64 },
    AssociationTimedOut(AssociationError),
    ConnectFailed {
        kind: ProbeKind,
        endpoint: Endpoint,
        error: TransportError,
    },
    ProbeFinished(ProbeReport),
    Disassociated,
    LightSleep(WakeTimer),
    Woke { slept_ms: u64 },
    Halting(Halt),
}

impl BenchEvent {
    /// Returns `true` for events that precede a non-returning transition.
    pub const fn is_halt(&self) -> bool {
        matches!(self, BenchEvent::Halting(_))
    }
}

impl fmt::Display for BenchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchEvent::Boot { resumed_at, cold } => {
                if *cold {
                    write!(f, "Boot (cold), starting at {resumed_at}")
                } else {
                    write!(f, "Boot, resuming at {resumed_at}")
                }
            }
            BenchEvent::StateEntered(state) => f.write_str(state.announcement()),
            BenchEvent::ComputeFinished(report) => write!(
                f,
                "{} stress batches in {} ms",
                report.batches, report.elapsed_ms
            ),
            BenchEvent::Associated { elapsed_ms } => {
                write!(f, "WiFi connected after {elapsed_ms} ms")
            }
            BenchEvent::AssociationTimedOut(error) => write!(f, "WiFi {error}"),
            BenchEvent::ConnectFailed {
                kind,
                endpoint,
                error,
            } => write!(f, "{kind} peer {endpoint}: {error}"),
            BenchEvent::ProbeFinished(report) => write!(f, "{}", report.throughput()),
            BenchEvent::Disassociated => f.write_str("WiFi disconnected"),
            BenchEvent::LightSleep(wake) => write!(f, "light sleep, {wake}"),
            BenchEvent::Woke { slept_ms } => write!(f, "awake after {slept_ms} ms"),
            BenchEvent::Halting(halt) => write!(f, "halting: {halt}"),
        }
    }
}

/// Destination for benchmark events.
pub trait TelemetrySink {
    fn record(&mut self, event: BenchEvent, timestamp_ms: u64);

    /// Pushes buffered output to the wire. Called before every halt.
    fn flush(&mut self) {}
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn record(&mut self, event: BenchEvent, timestamp_ms: u64) {
        (**self).record(event, timestamp_ms);
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// Sink that drops every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&mut self, _: BenchEvent, _: u64) {}
}

/// Stored telemetry entry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp_ms: u64,
    pub event: BenchEvent,
}

/// Fixed-capacity history of the most recent events.
pub struct TelemetryLog<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
    flushes: usize,
}

impl<const CAPACITY: usize> TelemetryLog<CAPACITY> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
            flushes: 0,
        }
    }

    /// Appends an event, evicting the oldest once full.
    pub fn push(&mut self, event: BenchEvent, timestamp_ms: u64) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp_ms,
            event,
        });
        id
    }

    /// Returns the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Recorded events in chronological order, without metadata.
    pub fn events(&self) -> impl Iterator<Item = BenchEvent> + '_ {
        self.oldest_first().map(|record| record.event)
    }

    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of times the log was flushed.
    pub const fn flushes(&self) -> usize {
        self.flushes
    }

    /// Identifier the next recorded event will receive.
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<const CAPACITY: usize> Default for TelemetryLog<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> TelemetrySink for TelemetryLog<CAPACITY> {
    fn record(&mut self, event: BenchEvent, timestamp_ms: u64) {
        self.push(event, timestamp_ms);
    }

    fn flush(&mut self) {
        self.flushes = self.flushes.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use core::{fmt::Write, time::Duration};

    use super::*;
    use crate::network::probe::TRANSFER_BUDGET;

    fn render(event: &BenchEvent) -> heapless::String<96> {
        let mut line = heapless::String::new();
        write!(line, "{event}").expect("line fits");
        line
    }

    #[test]
    fn ring_keeps_most_recent_records() {
        let mut log = TelemetryLog::<4>::new();
        for (offset, state) in crate::sequence::ALL_STATES.iter().enumerate() {
            log.record(BenchEvent::StateEntered(*state), offset as u64);
        }

        assert_eq!(log.len(), 4);
        assert_eq!(log.next_event_id(), 12);
        let first = log.oldest_first().next().expect("record present");
        assert_eq!(first.id, 8);
        assert_eq!(
            first.event,
            BenchEvent::StateEntered(PowerState::LightSleepDelay)
        );
        assert_eq!(
            log.latest().map(|record| record.event),
            Some(BenchEvent::StateEntered(PowerState::Reset))
        );
    }

    #[test]
    fn probe_lines_render_as_kilobytes_per_second() {
        let report = ProbeReport {
            kind: ProbeKind::Download,
            bytes: TRANSFER_BUDGET,
            transferred: TRANSFER_BUDGET,
            elapsed_ms: 800,
            idle_reads: 0,
            writes: 0,
            connected: true,
        };
        assert_eq!(render(&BenchEvent::ProbeFinished(report)), "1250.00 kB/s");

        let instant = ProbeReport {
            elapsed_ms: 0,
            ..report
        };
        assert_eq!(render(&BenchEvent::ProbeFinished(instant)), "inf kB/s");
    }

    #[test]
    fn state_and_halt_lines() {
        assert_eq!(
            render(&BenchEvent::StateEntered(PowerState::LightSleepDelay)),
            "Light Sleep (delayed)..."
        );
        assert_eq!(
            render(&BenchEvent::Halting(Halt::DeepSleep(WakeTimer::After(
                Duration::from_millis(3_000)
            )))),
            "halting: deep sleep, wake after 3000 ms"
        );
        assert_eq!(
            render(&BenchEvent::Boot {
                resumed_at: PowerState::Idle,
                cold: true
            }),
            "Boot (cold), starting at idle"
        );
    }

    #[test]
    fn flush_is_counted() {
        let mut log = TelemetryLog::<2>::default();
        assert!(log.is_empty());
        log.flush();
        log.flush();
        assert_eq!(log.flushes(), 2);
    }
}
