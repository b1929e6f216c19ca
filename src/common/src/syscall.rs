//! Service numbers and the syscall table handed to every guest.

use bytemuck::{Pod, Zeroable};

/// `"LDSC"` in little-endian byte order.
pub const TABLE_MAGIC: u32 = u32::from_le_bytes(*b"LDSC");

/// Current layout revision of [`SyscallTable`].
pub const TABLE_VERSION: u32 = 1;

/// Kernel services reachable through the dispatch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Syscall {
    /// Write a NUL-terminated string to the console.
    Print = 1,
    /// Terminate the running program.
    Exit = 2,
    /// Open a file by name, replacing any open handle.
    FileOpen = 3,
    /// Read from the open handle.
    FileRead = 4,
    /// Close the open handle.
    FileClose = 5,
    /// List the root directory.
    ListDir = 6,
    /// Query the argument count or copy one argument.
    GetArgs = 7,
    /// Block until a character is available.
    GetChar = 8,
    /// Run another program and wait for it.
    Exec = 9,
}

impl Syscall {
    /// The raw service number.
    pub const fn number(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Syscall {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Syscall::Print,
            2 => Syscall::Exit,
            3 => Syscall::FileOpen,
            4 => Syscall::FileRead,
            5 => Syscall::FileClose,
            6 => Syscall::ListDir,
            7 => Syscall::GetArgs,
            8 => Syscall::GetChar,
            9 => Syscall::Exec,
            other => return Err(other),
        })
    }
}

/// Signature of the dispatch entry as seen from guest code.
///
/// Arguments are the table address, the service number and three words.
pub type DispatchFn = extern "C" fn(u32, u32, u32, u32, u32) -> u32;

/// The table a guest receives at its entry point.
///
/// Guests only read `dispatch`; `context` belongs to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SyscallTable {
    /// Always [`TABLE_MAGIC`].
    pub magic: u32,
    /// Always [`TABLE_VERSION`].
    pub version: u32,
    /// 32-bit address of the dispatch entry.
    pub dispatch: u32,
    /// Reserved, zero.
    pub reserved: u32,
    /// Kernel-private word.
    pub context: u64,
}

impl SyscallTable {
    /// Builds a table pointing at `dispatch`.
    pub const fn new(dispatch: u32, context: u64) -> Self {
        Self {
            magic: TABLE_MAGIC,
            version: TABLE_VERSION,
            dispatch,
            reserved: 0,
            context,
        }
    }

    /// Checks magic and version.
    pub fn is_valid(&self) -> bool {
        self.magic == TABLE_MAGIC && self.version == TABLE_VERSION
    }
}
