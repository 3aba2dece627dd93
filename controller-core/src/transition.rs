//! Sleep and restart primitives.

use core::fmt;

use crate::sequence::WakeTimer;

/// Transition that never hands control back to the controller loop.
///
/// Working memory is lost; the next boot resumes from the cursor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Halt {
    DeepSleep(WakeTimer),
    Restart,
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::DeepSleep(wake) => write!(f, "deep sleep, {wake}"),
            Halt::Restart => f.write_str("restart"),
        }
    }
}

/// Low-power and reset control of the device.
///
/// None of these calls are cancellable once issued.
#[allow(async_fn_in_trait)]
pub trait PowerControl {
    /// Enters light sleep and returns after the wake source fires.
    ///
    /// [`WakeTimer::Immediate`] still performs a full entry/exit cycle.
    async fn light_sleep(&mut self, wake: WakeTimer);

    /// Enters deep sleep. Execution continues at the boot entry point.
    fn deep_sleep(&mut self, wake: WakeTimer) -> !;

    /// Performs a software restart.
    fn restart(&mut self) -> !;

    fn enter(&mut self, halt: Halt) -> ! {
        match halt {
            Halt::DeepSleep(wake) => self.deep_sleep(wake),
            Halt::Restart => self.restart(),
        }
    }
}
