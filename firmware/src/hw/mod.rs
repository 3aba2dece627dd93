//! esp-hal bindings for the controller traits.

mod wifi;

use core::{
    ptr,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use controller_core::{
    clock::Clock,
    cursor::{RetainedCell, RetainedCursor},
    sequence::WakeTimer,
    transition::PowerControl,
    trigger::TriggerLine,
};
use embassy_time::{Instant, Timer};
use esp_hal::{
    gpio::Output,
    rtc_cntl::{Rtc, SocResetReason, sleep::TimerWakeupSource},
    system,
};

pub use wifi::{EspTransport, EspWifiLink, SOCKET_BUFFER};

/// Monotonic time from the embassy time driver.
#[derive(Copy, Clone, Debug, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }

    async fn delay(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        Timer::after_micros(micros).await;
    }
}

/// Push-pull output the power profiler watches.
pub struct TriggerPin {
    pin: Output<'static>,
}

impl TriggerPin {
    /// The pin should be configured low so the first edge is a rise.
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

impl TriggerLine for TriggerPin {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }
}

#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut CURSOR_WORD: u32 = 0;

static CURSOR_CLAIMED: AtomicBool = AtomicBool::new(false);

/// The retained cursor word in RTC fast memory.
///
/// Survives deep sleep and software reset. Contents after a power-on reset
/// are undefined, which the cursor tag takes care of.
pub struct RtcCell {
    _claimed: (),
}

impl RtcCell {
    /// Hands out the cell once per boot.
    pub fn claim() -> Option<Self> {
        if CURSOR_CLAIMED.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self { _claimed: () })
        }
    }
}

impl RetainedCell for RtcCell {
    fn read_word(&self) -> u32 {
        // SAFETY: only the claimed `RtcCell` touches the word, and a 32-bit
        // aligned volatile access is a single load on Xtensa.
        unsafe { ptr::read_volatile(&raw const CURSOR_WORD) }
    }

    fn write_word(&mut self, word: u32) {
        // SAFETY: see `read_word`.
        unsafe { ptr::write_volatile(&raw mut CURSOR_WORD, word) }
    }
}

pub type RtcCursor = RetainedCursor<RtcCell>;

/// Builds the cursor store for this boot.
///
/// A chip power-on leaves RTC memory in an arbitrary state, so the word is
/// cleared rather than trusted to fail the tag check.
pub fn boot_cursor(cell: RtcCell, reset: Option<SocResetReason>) -> RtcCursor {
    let mut cursor = RetainedCursor::new(cell);
    if matches!(reset, Some(SocResetReason::ChipPowerOn) | None) {
        cursor.force_cold_boot();
    }
    cursor
}

/// Sleep and restart through the RTC controller.
pub struct EspPower {
    rtc: Rtc<'static>,
}

impl EspPower {
    pub fn new(rtc: Rtc<'static>) -> Self {
        Self { rtc }
    }
}

impl PowerControl for EspPower {
    async fn light_sleep(&mut self, wake: WakeTimer) {
        let timer = TimerWakeupSource::new(wake.duration());
        self.rtc.sleep_light(&[&timer]);
    }

    fn deep_sleep(&mut self, wake: WakeTimer) -> ! {
        let timer = TimerWakeupSource::new(wake.duration());
        self.rtc.sleep_deep(&[&timer])
    }

    fn restart(&mut self) -> ! {
        system::software_reset()
    }
}
