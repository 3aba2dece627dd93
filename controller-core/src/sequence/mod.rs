//! Power-state table shared by firmware and host targets.
//!
//! The benchmark walks the device through a fixed, totally ordered list of
//! operating states. Each state maps to exactly one [`StateAction`]; the
//! controller looks the action up here instead of embedding per-state logic,
//! so the same table drives the ESP32 firmware and the host emulator.

use core::{fmt, time::Duration};

/// Number of states in one benchmark cycle.
pub const STATE_COUNT: usize = 12;

/// Operating state executed by one controller iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum PowerState {
    Idle = 0,
    Computation = 1,
    WifiConnect = 2,
    WifiIdle = 3,
    WifiDownload = 4,
    WifiUpload = 5,
    WifiDisconnect = 6,
    LightSleep = 7,
    LightSleepDelay = 8,
    DeepSleep = 9,
    DeepSleepDelay = 10,
    Reset = 11,
}

/// Every state in execution order.
pub const ALL_STATES: [PowerState; STATE_COUNT] = [
    PowerState::Idle,
    PowerState::Computation,
    PowerState::WifiConnect,
    PowerState::WifiIdle,
    PowerState::WifiDownload,
    PowerState::WifiUpload,
    PowerState::WifiDisconnect,
    PowerState::LightSleep,
    PowerState::LightSleepDelay,
    PowerState::DeepSleep,
    PowerState::DeepSleepDelay,
    PowerState::Reset,
];

impl PowerState {
    /// State a cold boot starts from.
    pub const INITIAL: Self = PowerState::Idle;

    /// Position of the state within [`ALL_STATES`].
    pub const fn as_index(self) -> usize {
        self as usize
    }

    /// Attempts to construct a [`PowerState`] from a raw index.
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < STATE_COUNT {
            Some(ALL_STATES[index])
        } else {
            None
        }
    }

    /// Raw byte stored in retained memory.
    pub const fn to_raw(self) -> u8 {
        self as u8
    }

    /// Decodes a retained byte, rejecting anything outside the table.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Self::from_index(raw as usize)
    }

    /// Successor in execution order; `Reset` wraps back to `Idle`.
    #[must_use]
    pub const fn next(self) -> Self {
        ALL_STATES[(self.as_index() + 1) % STATE_COUNT]
    }

    /// Returns `true` for states whose primitive does not return to the loop.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            PowerState::DeepSleep | PowerState::DeepSleepDelay | PowerState::Reset
        )
    }

    /// Stable machine-readable tag.
    pub const fn tag(self) -> &'static str {
        match self {
            PowerState::Idle => "idle",
            PowerState::Computation => "computation",
            PowerState::WifiConnect => "wifi-connect",
            PowerState::WifiIdle => "wifi-idle",
            PowerState::WifiDownload => "wifi-download",
            PowerState::WifiUpload => "wifi-upload",
            PowerState::WifiDisconnect => "wifi-disconnect",
            PowerState::LightSleep => "light-sleep",
            PowerState::LightSleepDelay => "light-sleep-delay",
            PowerState::DeepSleep => "deep-sleep",
            PowerState::DeepSleepDelay => "deep-sleep-delay",
            PowerState::Reset => "reset",
        }
    }

    /// Diagnostic line printed when the state begins.
    pub const fn announcement(self) -> &'static str {
        match self {
            PowerState::Idle => "Idle...",
            PowerState::Computation => "Computation...",
            PowerState::WifiConnect => "WiFi connection...",
            PowerState::WifiIdle => "WiFi idling...",
            PowerState::WifiDownload => "WiFi download...",
            PowerState::WifiUpload => "WiFi upload...",
            PowerState::WifiDisconnect => "WiFi disconnect...",
            PowerState::LightSleep => "Light Sleep (no delay)...",
            PowerState::LightSleepDelay => "Light Sleep (delayed)...",
            PowerState::DeepSleep => "Deep sleep (no delay)...",
            PowerState::DeepSleepDelay => "Deep sleep (delayed)...",
            PowerState::Reset => "Restarting...",
        }
    }

    /// Name of the measurement window between this state's trigger pulse and
    /// the next one, as labelled by the capture tooling.
    ///
    /// The zero-delay sleep states only contribute entry/exit overhead, so
    /// their windows are named after that overhead.
    pub const fn phase_label(self) -> &'static str {
        match self {
            PowerState::Idle => "Idle",
            PowerState::Computation => "Computation",
            PowerState::WifiConnect => "WiFi Connect",
            PowerState::WifiIdle => "WiFi Idle",
            PowerState::WifiDownload => "WiFi Download",
            PowerState::WifiUpload => "WiFi Upload",
            PowerState::WifiDisconnect => "WiFi Disconnect",
            PowerState::LightSleep => "Light-sleep Overhead",
            PowerState::LightSleepDelay => "Light-sleep",
            PowerState::DeepSleep => "Deep-sleep Overhead",
            PowerState::DeepSleepDelay => "Deep-sleep",
            PowerState::Reset => "Reset",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Depth of a low-power mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SleepDepth {
    /// Working memory retained; execution resumes after the sleep call.
    Light,
    /// Working memory discarded; execution restarts from the entry point.
    Deep,
}

/// Wake-timer configuration armed before entering sleep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeTimer {
    Immediate,
    After(Duration),
}

impl WakeTimer {
    /// Timer period in microseconds, the unit RTC wake sources are armed with.
    pub fn as_micros(self) -> u64 {
        match self {
            WakeTimer::Immediate => 0,
            WakeTimer::After(period) => u64::try_from(period.as_micros()).unwrap_or(u64::MAX),
        }
    }

    /// Timer period as a [`Duration`].
    pub const fn duration(self) -> Duration {
        match self {
            WakeTimer::Immediate => Duration::ZERO,
            WakeTimer::After(period) => period,
        }
    }
}

impl fmt::Display for WakeTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeTimer::Immediate => f.write_str("immediate wake"),
            WakeTimer::After(period) => write!(f, "wake after {} ms", period.as_millis()),
        }
    }
}

/// Work performed by a state once the cursor has been advanced.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StateAction {
    /// Hold the current configuration for a fixed duration.
    Dwell(Duration),
    /// Run the CPU/FPU stress loop for a fixed duration.
    Compute(Duration),
    /// Associate with the access point and wait for a link.
    Associate,
    /// Read the transfer budget from the download peer.
    Download,
    /// Write the transfer budget to the upload peer.
    Upload,
    /// Tear down the association.
    Disassociate,
    /// Enter a low-power mode.
    Sleep { depth: SleepDepth, wake: WakeTimer },
    /// Unconditional device restart.
    Restart,
}

impl StateAction {
    /// Returns `true` when the action never hands control back to the loop.
    pub const fn halts(self) -> bool {
        matches!(
            self,
            StateAction::Sleep {
                depth: SleepDepth::Deep,
                ..
            } | StateAction::Restart
        )
    }
}

/// One row of the state table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StateStep {
    pub state: PowerState,
    pub action: StateAction,
}

impl StateStep {
    pub const fn new(state: PowerState, action: StateAction) -> Self {
        Self { state, action }
    }

    /// Resolves the action for `state` against the configured delay.
    pub const fn for_state(state: PowerState, delay: Duration) -> Self {
        let action = match state {
            PowerState::Idle | PowerState::WifiIdle => StateAction::Dwell(delay),
            PowerState::Computation => StateAction::Compute(delay),
            PowerState::WifiConnect => StateAction::Associate,
            PowerState::WifiDownload => StateAction::Download,
            PowerState::WifiUpload => StateAction::Upload,
            PowerState::WifiDisconnect => StateAction::Disassociate,
            PowerState::LightSleep => StateAction::Sleep {
                depth: SleepDepth::Light,
                wake: WakeTimer::Immediate,
            },
            PowerState::LightSleepDelay => StateAction::Sleep {
                depth: SleepDepth::Light,
                wake: WakeTimer::After(delay),
            },
            PowerState::DeepSleep => StateAction::Sleep {
                depth: SleepDepth::Deep,
                wake: WakeTimer::Immediate,
            },
            PowerState::DeepSleepDelay => StateAction::Sleep {
                depth: SleepDepth::Deep,
                wake: WakeTimer::After(delay),
            },
            PowerState::Reset => StateAction::Restart,
        };
        Self::new(state, action)
    }
}

/// Builds the full state table for one cycle.
pub fn state_table(delay: Duration) -> [StateStep; STATE_COUNT] {
    ALL_STATES.map(|state| StateStep::for_state(state, delay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_the_table_and_wraps() {
        for pair in ALL_STATES.windows(2) {
            assert_eq!(pair[0].next(), pair[1]);
        }
        assert_eq!(PowerState::Reset.next(), PowerState::Idle);
    }

    #[test]
    fn raw_encoding_rejects_out_of_range_bytes() {
        for state in ALL_STATES {
            assert_eq!(PowerState::from_raw(state.to_raw()), Some(state));
        }
        assert_eq!(PowerState::from_raw(12), None);
        assert_eq!(PowerState::from_raw(0xFF), None);
    }

    #[test]
    fn only_deep_sleep_and_reset_halt() {
        let table = state_table(Duration::from_millis(3_000));
        let halting: heapless::Vec<PowerState, STATE_COUNT> = table
            .iter()
            .filter(|step| step.action.halts())
            .map(|step| step.state)
            .collect();

        assert_eq!(
            halting.as_slice(),
            &[
                PowerState::DeepSleep,
                PowerState::DeepSleepDelay,
                PowerState::Reset
            ]
        );
        for step in table {
            assert_eq!(step.action.halts(), step.state.is_terminal());
        }
    }

    #[test]
    fn sleep_rows_pair_depth_with_wake_timer() {
        let delay = Duration::from_millis(3_000);
        assert_eq!(
            StateStep::for_state(PowerState::LightSleep, delay).action,
            StateAction::Sleep {
                depth: SleepDepth::Light,
                wake: WakeTimer::Immediate
            }
        );
        assert_eq!(
            StateStep::for_state(PowerState::DeepSleepDelay, delay).action,
            StateAction::Sleep {
                depth: SleepDepth::Deep,
                wake: WakeTimer::After(delay)
            }
        );
        assert_eq!(WakeTimer::After(delay).as_micros(), 3_000_000);
        assert_eq!(WakeTimer::Immediate.as_micros(), 0);
    }

    #[test]
    fn overhead_windows_follow_zero_delay_sleeps() {
        assert_eq!(PowerState::LightSleep.phase_label(), "Light-sleep Overhead");
        assert_eq!(PowerState::DeepSleepDelay.phase_label(), "Deep-sleep");
        assert_eq!(PowerState::WifiDownload.announcement(), "WiFi download...");
    }
}
