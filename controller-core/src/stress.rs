//! CPU and FPU stress generator for the `Computation` state.
//!
//! The loop keeps integer, single- and double-precision arithmetic units busy
//! with chains seeded from fixed constants so the power signature is
//! reproducible between runs. The numeric results are meaningless; overflow
//! wraps and NaNs propagate without aborting the loop. Every intermediate
//! value passes through [`black_box`] so the chains survive optimisation.

use core::{hint::black_box, time::Duration};

use crate::clock::{Clock, duration_ms, elapsed_ms};

/// Arithmetic rounds executed between clock reads.
pub const ROUNDS_PER_CHECK: u32 = 50;

const INT_SEED: i32 = 1_234_567_890;
const INT_STEP: i32 = 12_345;
const THIRD: f64 = 1.0 / 3.0;
const TWO_THIRDS: f64 = 2.0 / 3.0;

/// Summary of one stress run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StressReport {
    /// Outer iterations completed (each one is [`ROUNDS_PER_CHECK`] chains).
    pub batches: u32,
    /// Wall-clock time spent in the loop.
    pub elapsed_ms: u64,
}

#[derive(Copy, Clone, Debug)]
struct ArithmeticChain {
    int_value: i32,
    single: f32,
    double: f64,
}

impl ArithmeticChain {
    const fn seeded() -> Self {
        Self {
            int_value: 0,
            single: 0.0,
            double: 0.0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn round(&mut self) {
        let mut iv = black_box(self.int_value);
        iv = iv.wrapping_add(black_box(INT_SEED));
        iv = iv.wrapping_div(black_box(INT_STEP));
        iv = iv.wrapping_sub(black_box(INT_STEP));
        iv = iv.wrapping_mul(black_box(INT_SEED));
        self.int_value = black_box(iv);

        let f0 = black_box(THIRD as f32);
        let f1 = black_box(TWO_THIRDS as f32);
        let mut fv = black_box(self.single);
        fv += f0;
        fv /= f1;
        fv -= f1;
        fv *= f0;
        fv = libm::powf(fv, THIRD as f32);
        fv += libm::sinf(fv);
        self.single = black_box(fv);

        let d0 = black_box(THIRD);
        let d1 = black_box(TWO_THIRDS);
        let mut dv = black_box(self.double);
        dv += d0;
        dv /= d1;
        dv -= d1;
        dv *= d0;
        dv = libm::pow(dv, THIRD);
        dv += libm::sin(dv);
        self.double = black_box(dv);
    }
}

/// Runs the stress loop until at least `duration` has elapsed on `clock`.
pub fn run_stress<C: Clock + ?Sized>(clock: &C, duration: Duration) -> StressReport {
    run_chain(ArithmeticChain::seeded(), clock, duration)
}

fn run_chain<C: Clock + ?Sized>(
    mut chain: ArithmeticChain,
    clock: &C,
    duration: Duration,
) -> StressReport {
    let budget = duration_ms(duration);
    let mut batches = 0u32;
    let started = clock.now_ms();

    loop {
        for _ in 0..ROUNDS_PER_CHECK {
            chain.round();
        }
        batches = batches.wrapping_add(1);

        let elapsed = elapsed_ms(started, clock.now_ms());
        if elapsed >= budget {
            black_box(chain);
            return StressReport {
                batches,
                elapsed_ms: elapsed,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;

    struct SteppingClock {
        now: Cell<u64>,
        step: u64,
    }

    impl Clock for SteppingClock {
        fn now_ms(&self) -> u64 {
            let value = self.now.get();
            self.now.set(value + self.step);
            value
        }

        async fn delay(&mut self, duration: Duration) {
            self.now.set(self.now.get() + duration_ms(duration));
        }
    }

    #[test]
    fn loop_exits_once_duration_has_elapsed() {
        let clock = SteppingClock {
            now: Cell::new(0),
            step: 100,
        };
        let report = run_stress(&clock, Duration::from_millis(3_000));
        assert_eq!(report.elapsed_ms, 3_000);
        assert_eq!(report.batches, 30);
    }

    #[test]
    fn zero_duration_runs_a_single_batch() {
        let clock = SteppingClock {
            now: Cell::new(5),
            step: 0,
        };
        let report = run_stress(&clock, Duration::ZERO);
        assert_eq!(report.batches, 1);
        assert_eq!(report.elapsed_ms, 0);
    }

    #[test]
    fn poisoned_chain_still_exits_on_schedule() {
        let clock = SteppingClock {
            now: Cell::new(0),
            step: 250,
        };
        let poisoned = ArithmeticChain {
            int_value: i32::MIN,
            single: f32::NAN,
            double: f64::NAN,
        };
        let report = run_chain(poisoned, &clock, Duration::from_millis(1_000));
        assert_eq!(report.batches, 4);
        assert_eq!(report.elapsed_ms, 1_000);

        let mut chain = poisoned;
        chain.round();
        assert!(chain.single.is_nan());
        assert!(chain.double.is_nan());
    }
}
