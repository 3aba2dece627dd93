//! File-backed retained word.
//!
//! Stands in for RTC memory across emulated deep sleeps and restarts, which
//! may be real process re-executions. Each write lands in a sibling temporary
//! file that is renamed over the cell, so a crash leaves either the old word
//! or the new one.
//!
//! A fresh launch of the emulator is a power-on and clears the word. Only
//! the re-executions performed by `HostPower` carry [`REBOOT_MARKER`] and
//! resume from it.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use controller_core::cursor::{RetainedCell, RetainedCursor};

pub type FileCursor = RetainedCursor<FileCell>;

/// Environment variable set on the process image a simulated reboot starts.
pub const REBOOT_MARKER: &str = "POWER_BENCH_REBOOT";

/// How the current process came to be running.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Launch {
    PowerOn,
    Reboot,
}

impl Launch {
    /// `resume` forces a warm start, for continuing a sequence by hand.
    pub fn detect(resume: bool) -> Self {
        if resume || env::var_os(REBOOT_MARKER).is_some() {
            Launch::Reboot
        } else {
            Launch::PowerOn
        }
    }
}

/// Opens the cursor file, discarding its contents on power-on.
pub fn open_cursor(path: &Path, launch: Launch) -> io::Result<FileCursor> {
    let mut cursor = FileCursor::new(FileCell::open(path)?);
    if launch == Launch::PowerOn {
        cursor.force_cold_boot();
        if let Some(err) = cursor.cell_mut().take_error() {
            return Err(err);
        }
    }
    Ok(cursor)
}

#[derive(Debug)]
pub struct FileCell {
    path: PathBuf,
    last_error: Option<io::Error>,
}

impl FileCell {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            last_error: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes the first write failure since the last call.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.last_error.take()
    }

    fn persist(&self, word: u32) -> io::Result<()> {
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, word.to_le_bytes())?;
        fs::rename(&staging, &self.path)
    }
}

impl RetainedCell for FileCell {
    fn read_word(&self) -> u32 {
        match fs::read(&self.path) {
            Ok(bytes) => bytes
                .as_slice()
                .try_into()
                .map(u32::from_le_bytes)
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn write_word(&mut self, word: u32) {
        if let Err(err) = self.persist(word)
            && self.last_error.is_none()
        {
            self.last_error = Some(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process;

    use controller_core::cursor::{CursorStore, ResumePoint};
    use controller_core::sequence::PowerState;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("power-bench-{}", process::id()))
            .join(name)
    }

    #[test]
    fn missing_file_is_a_cold_boot() {
        let cursor = FileCursor::new(FileCell::open(scratch("missing.bin")).expect("cell"));
        assert_eq!(cursor.resume_point(), ResumePoint::cold_boot());
    }

    #[test]
    fn cursor_survives_reopening() {
        let path = scratch("reopen.bin");
        let mut cursor = FileCursor::new(FileCell::open(&path).expect("cell"));
        cursor.store_cursor(PowerState::DeepSleepDelay);
        assert!(cursor.cell_mut().take_error().is_none());
        drop(cursor);

        let reopened = FileCursor::new(FileCell::open(&path).expect("cell"));
        assert_eq!(
            reopened.resume_point(),
            ResumePoint::resumed(PowerState::DeepSleepDelay)
        );
        assert_eq!(fs::read(&path).expect("cell file").len(), 4);
    }

    #[test]
    fn power_on_forgets_the_previous_session() {
        let path = scratch("power-on.bin");
        let mut cursor = open_cursor(&path, Launch::Reboot).expect("cursor");
        cursor.store_cursor(PowerState::Reset);
        drop(cursor);

        let warm = open_cursor(&path, Launch::Reboot).expect("cursor");
        assert_eq!(warm.resume_point(), ResumePoint::resumed(PowerState::Reset));
        drop(warm);

        let cold = open_cursor(&path, Launch::PowerOn).expect("cursor");
        assert_eq!(cold.resume_point(), ResumePoint::cold_boot());
        assert_eq!(cold.load_cursor(), PowerState::Idle);
    }

    #[test]
    fn resume_flag_counts_as_a_reboot() {
        assert_eq!(Launch::detect(true), Launch::Reboot);
    }

    #[test]
    fn truncated_file_is_treated_as_garbage() {
        let path = scratch("short.bin");
        let cell = FileCell::open(&path).expect("cell");
        fs::write(&path, [0x05, 0x5E]).expect("write garbage");
        let cursor = FileCursor::new(cell);
        assert!(cursor.resume_point().cold);
    }
}
