//! Serial console telemetry.
//!
//! Keeps the most recent benchmark events in a [`TelemetryLog`] and mirrors
//! each one to `defmt` on the MCU or to stdout on the host, one line per
//! event. The line text is the event's `Display` output, so the analysis
//! tooling sees the same `WiFi download...` and `<value> kB/s` lines no matter
//! which build produced them.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use controller_core::telemetry::{BenchEvent, TelemetryLog, TelemetrySink};

/// Records benchmark events and mirrors them to the console.
pub struct FirmwareTelemetry {
    log: TelemetryLog,
}

impl FirmwareTelemetry {
    pub const fn new() -> Self {
        Self {
            log: TelemetryLog::new(),
        }
    }

    pub fn log(&self) -> &TelemetryLog {
        &self.log
    }
}

impl Default for FirmwareTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for FirmwareTelemetry {
    fn record(&mut self, event: BenchEvent, timestamp_ms: u64) {
        self.log.push(event, timestamp_ms);
        emit_event(&event, timestamp_ms);
    }

    fn flush(&mut self) {
        self.log.flush();
        flush_console();
    }
}

#[cfg(target_os = "none")]
fn emit_event(event: &BenchEvent, timestamp_ms: u64) {
    if event.is_halt() {
        defmt::warn!("[{=u64} ms] {}", timestamp_ms, defmt::Display2Format(event));
    } else {
        defmt::info!("[{=u64} ms] {}", timestamp_ms, defmt::Display2Format(event));
    }
}

#[cfg(not(target_os = "none"))]
fn emit_event(event: &BenchEvent, timestamp_ms: u64) {
    println!("[{timestamp_ms} ms] {event}");
}

#[cfg(target_os = "none")]
fn flush_console() {
    defmt::flush();
}

#[cfg(not(target_os = "none"))]
fn flush_console() {
    use std::io::Write;

    let _ = std::io::stdout().flush();
}
