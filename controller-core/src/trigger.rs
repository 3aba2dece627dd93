//! Instrumentation trigger line.
//!
//! A logic analyser or power profiler watches this line to mark iteration
//! boundaries on its own timeline. The line carries no data, only edges.

use core::time::Duration;

use crate::clock::Clock;

/// Width of the pulse emitted at the start of every iteration.
pub const DEFAULT_PULSE_WIDTH: Duration = Duration::from_millis(50);

/// Abstraction over the digital output driving the trigger.
pub trait TriggerLine {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

impl<T: TriggerLine + ?Sized> TriggerLine for &mut T {
    fn set_high(&mut self) {
        (**self).set_high();
    }

    fn set_low(&mut self) {
        (**self).set_low();
    }
}

/// Drives the line high for `width`, then returns it low.
pub async fn pulse<T, C>(line: &mut T, clock: &mut C, width: Duration)
where
    T: TriggerLine + ?Sized,
    C: Clock + ?Sized,
{
    line.set_high();
    clock.delay(width).await;
    line.set_low();
}
