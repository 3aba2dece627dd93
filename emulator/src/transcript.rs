use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use controller_core::telemetry::{BenchEvent, TelemetryLog, TelemetrySink};

const HISTORY_DEPTH: usize = 64;

pub type SharedTranscript = Rc<RefCell<Transcript>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptRole {
    Host,
    Bench,
    Trigger,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Bench => "BENCH<",
            TranscriptRole::Trigger => "TRIG |",
        }
    }
}

/// Timestamped log of everything the emulated bench does.
///
/// The file is opened in append mode so that process-level reboots extend
/// the same transcript. Every line is echoed to stdout.
pub struct Transcript {
    writer: BufWriter<fs::File>,
    started_at: Instant,
    deferred: Option<io::Error>,
}

impl Transcript {
    pub fn open(path: &Path, started_at: Instant) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;
        let mut transcript = Self {
            writer: BufWriter::new(file),
            started_at,
            deferred: None,
        };

        if fresh {
            transcript.write_header()?;
        }
        Ok(transcript)
    }

    pub fn shared(self) -> SharedTranscript {
        Rc::new(RefCell::new(self))
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# ESP32 power benchmark emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn append_line(
        &mut self,
        elapsed_ms: u64,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        let formatted = format!("[+{elapsed_ms:>6} ms] {} {line}", role.prefix());
        println!("{formatted}");
        writeln!(self.writer, "{formatted}")
    }

    /// Appends a line stamped with the current session time.
    ///
    /// Failures are kept until [`Self::take_error`] so callers without an
    /// error channel can still log.
    pub fn note(&mut self, role: TranscriptRole, line: &str) {
        let elapsed = self.elapsed_ms();
        if let Err(err) = self.append_line(elapsed, role, line) {
            self.defer(err);
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.deferred.take()
    }

    fn defer(&mut self, err: io::Error) {
        if self.deferred.is_none() {
            self.deferred = Some(err);
        }
    }
}

/// Telemetry sink that writes each event to the transcript.
pub struct TranscriptSink {
    transcript: SharedTranscript,
    history: TelemetryLog<HISTORY_DEPTH>,
}

impl TranscriptSink {
    pub fn new(transcript: SharedTranscript) -> Self {
        Self {
            transcript,
            history: TelemetryLog::new(),
        }
    }

    pub fn history(&self) -> &TelemetryLog<HISTORY_DEPTH> {
        &self.history
    }
}

impl TelemetrySink for TranscriptSink {
    fn record(&mut self, event: BenchEvent, timestamp_ms: u64) {
        self.history.push(event, timestamp_ms);
        let mut transcript = self.transcript.borrow_mut();
        let line = event.to_string();
        if let Err(err) = transcript.append_line(timestamp_ms, TranscriptRole::Bench, &line) {
            transcript.defer(err);
        }
    }

    fn flush(&mut self) {
        self.history.flush();
        let mut transcript = self.transcript.borrow_mut();
        if let Err(err) = transcript.flush() {
            transcript.defer(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process;

    use controller_core::sequence::PowerState;

    use super::*;

    #[test]
    fn events_are_prefixed_and_appended() {
        let dir = std::env::temp_dir().join(format!("power-bench-transcript-{}", process::id()));
        let path = dir.join("bench.log");
        let _ = fs::remove_file(&path);

        let transcript = Transcript::open(&path, Instant::now())
            .expect("transcript opens")
            .shared();
        let mut sink = TranscriptSink::new(Rc::clone(&transcript));
        sink.record(BenchEvent::StateEntered(PowerState::WifiIdle), 42);
        sink.flush();
        drop(sink);
        drop(transcript);

        // a second session appends instead of truncating
        let reopened = Transcript::open(&path, Instant::now()).expect("transcript reopens");
        drop(reopened);

        let contents = fs::read_to_string(&path).expect("transcript readable");
        assert_eq!(contents.matches("# ESP32 power benchmark").count(), 1);
        assert!(contents.contains("[+    42 ms] BENCH< WiFi idling..."));
    }
}
