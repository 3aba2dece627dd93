#![no_std]

// Portable logic for the ESP32 power benchmark.
//
// Firmware and host tooling share this crate. It avoids the standard library
// and reaches hardware only through the traits it exposes.

pub mod clock;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod network;
pub mod sequence;
pub mod stress;
pub mod telemetry;
pub mod transition;
pub mod trigger;

pub use config::BenchConfig;
pub use controller::{Board, Dispatch, PowerController, Step};
pub use cursor::{CursorStore, RestartPolicy};
pub use sequence::PowerState;
