//! Download and upload throughput probes.
//!
//! Both probes move a fixed byte budget over a freshly opened connection and
//! report `bytes / elapsed_ms`. Neither probe retries or times out: a peer
//! that never sends stalls the download forever, and writes to a dead socket
//! are not checked. The connection is always closed before returning.

use core::{fmt, num::NonZeroUsize};

use super::{Endpoint, Transport, TransportError};
use crate::{
    clock::{Clock, elapsed_ms},
    telemetry::{BenchEvent, TelemetrySink},
};

/// Bytes moved by each probe.
pub const TRANSFER_BUDGET: usize = 1_000_000;

/// Size of the buffer the upload probe writes repeatedly.
pub const UPLOAD_BLOCK_SIZE: usize = 1400;

const BLOCK: NonZeroUsize = match NonZeroUsize::new(UPLOAD_BLOCK_SIZE) {
    Some(block) => block,
    None => panic!("upload block must not be empty"),
};

/// Direction of a throughput probe.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProbeKind {
    Download,
    Upload,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Download => f.write_str("download"),
            ProbeKind::Upload => f.write_str("upload"),
        }
    }
}

/// Write schedule for an upload of `budget` bytes in blocks of `block`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UploadPlan {
    pub full_writes: usize,
    /// Size of the trailing partial write; zero means no trailing write.
    pub remainder: usize,
}

impl UploadPlan {
    /// Total number of writes issued.
    pub const fn writes(&self) -> usize {
        self.full_writes + if self.remainder == 0 { 0 } else { 1 }
    }
}

/// `⌊budget / block⌋` full writes followed by one `budget mod block` write.
pub const fn upload_plan(budget: usize, block: NonZeroUsize) -> UploadPlan {
    UploadPlan {
        full_writes: budget / block.get(),
        remainder: budget % block.get(),
    }
}

/// Fills `buffer` with `abc…xyzabc…`.
#[allow(clippy::cast_possible_truncation)]
pub fn fill_pattern(buffer: &mut [u8]) {
    for (index, byte) in buffer.iter_mut().enumerate() {
        *byte = b'a' + (index % 26) as u8;
    }
}

/// Transfer rate in bytes per millisecond, printed as `kB/s`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Throughput {
    Rate(f64),
    /// The transfer finished within the same millisecond tick.
    Unbounded,
}

impl Throughput {
    #[allow(clippy::cast_precision_loss)]
    pub fn from_transfer(bytes: usize, elapsed_ms: u64) -> Self {
        if elapsed_ms == 0 {
            Throughput::Unbounded
        } else {
            Throughput::Rate(bytes as f64 / elapsed_ms as f64)
        }
    }

    pub fn rate(self) -> Option<f64> {
        match self {
            Throughput::Rate(rate) => Some(rate),
            Throughput::Unbounded => None,
        }
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Throughput::Rate(rate) => write!(f, "{rate:.2} kB/s"),
            Throughput::Unbounded => f.write_str("inf kB/s"),
        }
    }
}

/// Outcome of one probe run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProbeReport {
    pub kind: ProbeKind,
    /// Budget the throughput figure is computed from.
    pub bytes: usize,
    /// Bytes actually read, or accepted by the transport on upload.
    pub transferred: usize,
    pub elapsed_ms: u64,
    /// Download reads that returned no data.
    pub idle_reads: u64,
    /// Upload write calls issued.
    pub writes: usize,
    pub connected: bool,
}

impl ProbeReport {
    pub fn throughput(&self) -> Throughput {
        Throughput::from_transfer(self.bytes, self.elapsed_ms)
    }
}

async fn open<N, C, K>(
    transport: &mut N,
    clock: &C,
    telemetry: &mut K,
    kind: ProbeKind,
    endpoint: Endpoint,
) -> bool
where
    N: Transport + ?Sized,
    C: Clock + ?Sized,
    K: TelemetrySink + ?Sized,
{
    match transport.open(endpoint).await {
        Ok(()) => true,
        Err(error) => {
            record_connect_failure(telemetry, clock, kind, endpoint, error);
            false
        }
    }
}

fn record_connect_failure<C, K>(
    telemetry: &mut K,
    clock: &C,
    kind: ProbeKind,
    endpoint: Endpoint,
    error: TransportError,
) where
    C: Clock + ?Sized,
    K: TelemetrySink + ?Sized,
{
    telemetry.record(
        BenchEvent::ConnectFailed {
            kind,
            endpoint,
            error,
        },
        clock.now_ms(),
    );
}

/// Reads `budget` bytes one at a time from the peer at `endpoint`.
///
/// Reads that return no data do not count toward the budget.
pub async fn download<N, C, K>(
    transport: &mut N,
    clock: &C,
    telemetry: &mut K,
    endpoint: Endpoint,
    budget: usize,
) -> ProbeReport
where
    N: Transport + ?Sized,
    C: Clock + ?Sized,
    K: TelemetrySink + ?Sized,
{
    let connected = open(transport, clock, telemetry, ProbeKind::Download, endpoint).await;

    let started = clock.now_ms();
    let mut received = 0usize;
    let mut idle_reads = 0u64;
    while received < budget {
        match transport.read_byte().await {
            Some(_) => received += 1,
            None => idle_reads = idle_reads.saturating_add(1),
        }
    }
    let elapsed = elapsed_ms(started, clock.now_ms());

    transport.close().await;

    ProbeReport {
        kind: ProbeKind::Download,
        bytes: budget,
        transferred: received,
        elapsed_ms: elapsed,
        idle_reads,
        writes: 0,
        connected,
    }
}

/// Writes `budget` bytes of the lowercase pattern to the peer at `endpoint`.
pub async fn upload<N, C, K>(
    transport: &mut N,
    clock: &C,
    telemetry: &mut K,
    endpoint: Endpoint,
    budget: usize,
) -> ProbeReport
where
    N: Transport + ?Sized,
    C: Clock + ?Sized,
    K: TelemetrySink + ?Sized,
{
    let mut block = [0u8; UPLOAD_BLOCK_SIZE];
    fill_pattern(&mut block);
    let plan = upload_plan(budget, BLOCK);

    let connected = open(transport, clock, telemetry, ProbeKind::Upload, endpoint).await;

    let started = clock.now_ms();
    let mut accepted = 0usize;
    for _ in 0..plan.full_writes {
        accepted += transport.write(&block).await;
    }
    if plan.remainder != 0 {
        accepted += transport.write(&block[..plan.remainder]).await;
    }
    let elapsed = elapsed_ms(started, clock.now_ms());

    transport.close().await;

    ProbeReport {
        kind: ProbeKind::Upload,
        bytes: budget,
        transferred: accepted,
        elapsed_ms: elapsed,
        idle_reads: 0,
        writes: plan.writes(),
        connected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget_splits_into_714_blocks_and_a_tail() {
        let plan = upload_plan(TRANSFER_BUDGET, BLOCK);
        assert_eq!(plan.full_writes, 714);
        assert_eq!(plan.remainder, 400);
        assert_eq!(plan.writes(), 715);
    }

    #[test]
    fn exact_multiple_has_no_tail_write() {
        let plan = upload_plan(2_800, BLOCK);
        assert_eq!(plan, UploadPlan { full_writes: 2, remainder: 0 });
        assert_eq!(plan.writes(), 2);
        assert_eq!(upload_plan(0, BLOCK).writes(), 0);
    }

    #[test]
    fn pattern_cycles_through_lowercase_ascii() {
        let mut buffer = [0u8; 30];
        fill_pattern(&mut buffer);
        assert_eq!(&buffer[..26], b"abcdefghijklmnopqrstuvwxyz");
        assert_eq!(&buffer[26..], b"abcd");
    }

    #[test]
    fn throughput_is_the_literal_ratio() {
        let rate = Throughput::from_transfer(TRANSFER_BUDGET, 250);
        assert_eq!(rate, Throughput::Rate(4_000.0));
        assert_eq!(Throughput::from_transfer(TRANSFER_BUDGET, 0), Throughput::Unbounded);
        assert_eq!(Throughput::Unbounded.rate(), None);
    }
}
