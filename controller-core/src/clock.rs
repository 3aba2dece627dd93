//! Monotonic time source abstraction.

use core::time::Duration;

/// Millisecond tick source plus a cooperative delay.
#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Milliseconds since an arbitrary epoch; never decreases within one boot.
    fn now_ms(&self) -> u64;

    /// Suspends the caller for `duration`.
    async fn delay(&mut self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    async fn delay(&mut self, duration: Duration) {
        (**self).delay(duration).await;
    }
}

/// Milliseconds between two readings, saturating at zero.
pub const fn elapsed_ms(start: u64, end: u64) -> u64 {
    end.saturating_sub(start)
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_when_clock_appears_to_run_backwards() {
        assert_eq!(elapsed_ms(10, 25), 15);
        assert_eq!(elapsed_ms(25, 10), 0);
    }

    #[test]
    fn duration_conversion_truncates_to_whole_milliseconds() {
        assert_eq!(duration_ms(Duration::from_micros(3_000_999)), 3_000);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
