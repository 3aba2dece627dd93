//! Persistent sequence cursor.
//!
//! The cursor is the only value that survives deep sleep and software
//! restarts. It lives in a single retained 32-bit word so that every update
//! is one aligned store: a reset either lands before the store or after it,
//! never in the middle.
//!
//! The word carries a tag in its upper bits. Retained memory comes up with
//! arbitrary contents after a true power-on, so any word without the tag is
//! treated as a cold boot and resumes at [`PowerState::INITIAL`].

use core::{fmt, str::FromStr};

use crate::sequence::PowerState;

/// Tag occupying the upper 24 bits of a valid retained word.
pub const CURSOR_TAG: u32 = 0xB007_5E00;

const TAG_MASK: u32 = 0xFFFF_FF00;
const STATE_MASK: u32 = 0x0000_00FF;

/// Encoding of the cursor inside one retained word.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RetainedWord(u32);

impl RetainedWord {
    /// Encodes a state together with the validity tag.
    pub const fn encode(state: PowerState) -> Self {
        Self(CURSOR_TAG | state.to_raw() as u32)
    }

    /// Wraps a raw word read back from retained memory.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw word written to retained memory.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Decodes the word, returning `None` for untagged or out-of-range values.
    pub const fn decode(self) -> Option<PowerState> {
        if self.0 & TAG_MASK != CURSOR_TAG {
            return None;
        }
        PowerState::from_raw((self.0 & STATE_MASK) as u8)
    }
}

/// Where the controller resumes after a boot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ResumePoint {
    pub state: PowerState,
    /// `true` when no valid cursor was found and the initial state was assumed.
    pub cold: bool,
}

impl ResumePoint {
    pub const fn resumed(state: PowerState) -> Self {
        Self { state, cold: false }
    }

    pub const fn cold_boot() -> Self {
        Self {
            state: PowerState::INITIAL,
            cold: true,
        }
    }
}

/// Narrow load/store interface over the retained cursor.
pub trait CursorStore {
    /// Returns the state to execute next.
    fn load_cursor(&self) -> PowerState;

    /// Commits the state to execute next.
    fn store_cursor(&mut self, state: PowerState);

    /// Describes the resume point, including whether it came from a cold boot.
    fn resume_point(&self) -> ResumePoint {
        ResumePoint::resumed(self.load_cursor())
    }
}

impl<S: CursorStore + ?Sized> CursorStore for &mut S {
    fn load_cursor(&self) -> PowerState {
        (**self).load_cursor()
    }

    fn store_cursor(&mut self, state: PowerState) {
        (**self).store_cursor(state);
    }

    fn resume_point(&self) -> ResumePoint {
        (**self).resume_point()
    }
}

/// One word of memory that survives the power transitions being benchmarked.
///
/// Implementations must perform each write as a single store.
pub trait RetainedCell {
    fn read_word(&self) -> u32;
    fn write_word(&mut self, word: u32);
}

/// [`CursorStore`] backed by a tagged [`RetainedCell`].
#[derive(Debug)]
pub struct RetainedCursor<R> {
    cell: R,
}

impl<R: RetainedCell> RetainedCursor<R> {
    pub const fn new(cell: R) -> Self {
        Self { cell }
    }

    /// Discards whatever the cell holds so the next load is a cold boot.
    pub fn force_cold_boot(&mut self) {
        self.cell.write_word(0);
    }

    /// Returns the backing cell.
    pub fn cell(&self) -> &R {
        &self.cell
    }

    /// Returns the backing cell mutably.
    pub fn cell_mut(&mut self) -> &mut R {
        &mut self.cell
    }

    /// Consumes the store and returns the backing cell.
    pub fn into_cell(self) -> R {
        self.cell
    }
}

impl<R: RetainedCell> CursorStore for RetainedCursor<R> {
    fn load_cursor(&self) -> PowerState {
        self.resume_point().state
    }

    fn store_cursor(&mut self, state: PowerState) {
        self.cell.write_word(RetainedWord::encode(state).bits());
    }

    fn resume_point(&self) -> ResumePoint {
        RetainedWord::from_bits(self.cell.read_word())
            .decode()
            .map_or_else(ResumePoint::cold_boot, ResumePoint::resumed)
    }
}

/// Plain in-memory cell used by tests and host tooling.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryCell {
    word: u32,
    writes: usize,
}

impl MemoryCell {
    /// A cell holding no valid cursor.
    pub const fn new() -> Self {
        Self { word: 0, writes: 0 }
    }

    /// Number of writes performed so far.
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// Overwrites the raw word without counting it as a controller write.
    pub fn corrupt(&mut self, word: u32) {
        self.word = word;
    }
}

impl RetainedCell for MemoryCell {
    fn read_word(&self) -> u32 {
        self.word
    }

    fn write_word(&mut self, word: u32) {
        self.word = word;
        self.writes = self.writes.saturating_add(1);
    }
}

/// In-memory cursor store that tests can fault-inject against.
pub type MemoryCursor = RetainedCursor<MemoryCell>;

impl MemoryCursor {
    /// Store as found after a true power-on.
    pub const fn cold_boot() -> Self {
        RetainedCursor::new(MemoryCell::new())
    }

    /// Store already holding `state`.
    pub fn with_state(state: PowerState) -> Self {
        let mut cell = MemoryCell::new();
        cell.corrupt(RetainedWord::encode(state).bits());
        RetainedCursor::new(cell)
    }

    /// Raw retained word.
    pub fn raw(&self) -> u32 {
        self.cell.read_word()
    }

    /// Replaces the raw retained word, simulating a torn or garbage value.
    pub fn corrupt(&mut self, word: u32) {
        self.cell.corrupt(word);
    }

    /// Number of cursor writes performed so far.
    pub fn writes(&self) -> usize {
        self.cell.writes()
    }
}

/// What the `Reset` state commits before restarting the device.
///
/// A software restart keeps retained memory intact, so the committed value is
/// what the next boot sees.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RestartPolicy {
    /// Leave the cursor at `Reset`: every boot restarts again.
    #[default]
    HoldCursor,
    /// Commit `Idle` before restarting so the cycle starts over.
    WrapToIdle,
}

impl RestartPolicy {
    /// State committed when `state` begins executing.
    pub const fn committed_after(self, state: PowerState) -> PowerState {
        match (self, state) {
            (RestartPolicy::HoldCursor, PowerState::Reset) => PowerState::Reset,
            _ => state.next(),
        }
    }

    pub const fn tag(self) -> &'static str {
        match self {
            RestartPolicy::HoldCursor => "hold",
            RestartPolicy::WrapToIdle => "wrap",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when a restart policy tag is not recognised.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnknownRestartPolicy;

impl fmt::Display for UnknownRestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected restart policy `hold` or `wrap`")
    }
}

impl FromStr for RestartPolicy {
    type Err = UnknownRestartPolicy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("hold") {
            Ok(RestartPolicy::HoldCursor)
        } else if value.eq_ignore_ascii_case("wrap") {
            Ok(RestartPolicy::WrapToIdle)
        } else {
            Err(UnknownRestartPolicy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::ALL_STATES;

    #[test]
    fn cold_boot_resumes_at_idle() {
        let cursor = MemoryCursor::cold_boot();
        assert_eq!(cursor.resume_point(), ResumePoint::cold_boot());
        assert_eq!(cursor.load_cursor(), PowerState::Idle);
    }

    #[test]
    fn stored_state_survives_reload() {
        for state in ALL_STATES {
            let mut cursor = MemoryCursor::cold_boot();
            cursor.store_cursor(state);
            let cell = cursor.into_cell();

            let reloaded = RetainedCursor::new(cell);
            assert_eq!(reloaded.resume_point(), ResumePoint::resumed(state));
        }
    }

    #[test]
    fn garbage_words_decode_as_cold_boot() {
        let mut cursor = MemoryCursor::with_state(PowerState::WifiUpload);
        cursor.corrupt(0xDEAD_BEEF);
        assert!(cursor.resume_point().cold);

        cursor.corrupt(CURSOR_TAG | 0x40);
        assert_eq!(cursor.load_cursor(), PowerState::Idle);
        assert!(cursor.resume_point().cold);
    }

    #[test]
    fn force_cold_boot_clears_the_word() {
        let mut cursor = MemoryCursor::with_state(PowerState::Reset);
        cursor.force_cold_boot();
        assert!(cursor.resume_point().cold);
        assert_eq!(cursor.writes(), 1);
    }

    #[test]
    fn restart_policy_decides_what_reset_commits() {
        assert_eq!(
            RestartPolicy::HoldCursor.committed_after(PowerState::Reset),
            PowerState::Reset
        );
        assert_eq!(
            RestartPolicy::WrapToIdle.committed_after(PowerState::Reset),
            PowerState::Idle
        );
        for state in &ALL_STATES[..ALL_STATES.len() - 1] {
            assert_eq!(
                RestartPolicy::HoldCursor.committed_after(*state),
                state.next()
            );
        }
        assert_eq!("WRAP".parse::<RestartPolicy>(), Ok(RestartPolicy::WrapToIdle));
        assert_eq!("never".parse::<RestartPolicy>(), Err(UnknownRestartPolicy));
    }
}
