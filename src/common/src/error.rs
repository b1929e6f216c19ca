//! Result codes returned by `EXEC`.

use core::fmt;

/// Why a program could not be run.
///
/// Each variant maps to the negative word a guest sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecError {
    /// No file matched the program name.
    NotFound,
    /// The file does not fit the load buffer.
    TooLarge,
    /// The filesystem failed while reading the file.
    ReadFailed,
    /// The file does not start with the ELF magic.
    NotElf,
    /// Validation, loading or entry failed.
    RunFailed,
    /// No memory left for the caller's snapshot.
    OutOfMemory,
}

impl ExecError {
    /// The code returned to guest code.
    pub const fn code(self) -> i32 {
        match self {
            ExecError::NotFound => -1,
            ExecError::TooLarge => -2,
            ExecError::ReadFailed => -3,
            ExecError::NotElf => -4,
            ExecError::RunFailed => -5,
            ExecError::OutOfMemory => -6,
        }
    }

    /// Maps a guest-visible code back to an error.
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => ExecError::NotFound,
            -2 => ExecError::TooLarge,
            -3 => ExecError::ReadFailed,
            -4 => ExecError::NotElf,
            -5 => ExecError::RunFailed,
            -6 => ExecError::OutOfMemory,
            _ => return None,
        })
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::NotFound => write!(f, "command not found"),
            ExecError::TooLarge => write!(f, "file too large"),
            ExecError::ReadFailed => write!(f, "failed to read file"),
            ExecError::NotElf => write!(f, "not an ELF binary"),
            ExecError::RunFailed => write!(f, "failed to execute"),
            ExecError::OutOfMemory => write!(f, "out of memory"),
        }
    }
}
