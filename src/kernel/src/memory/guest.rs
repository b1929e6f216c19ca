//! Byte-level access to memory shared with guest programs.

use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

/// Guest memory access errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The range is not backed by this memory.
    OutOfRange {
        /// First address of the access.
        addr: u32,
        /// Length of the access.
        len: usize,
    },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::OutOfRange { addr, len } => {
                write!(f, "range {:#x}+{:#x} out of guest memory", addr, len)
            }
        }
    }
}

/// Memory addressed by 32-bit guest addresses.
///
/// Every program shares the same view; there is no per-program mapping.
pub trait GuestMemory {
    /// Copies `buf.len()` bytes starting at `addr` into `buf`.
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Copies `data` to `addr`.
    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryError>;

    /// Sets `len` bytes starting at `addr` to `byte`.
    fn fill(&self, addr: u32, len: usize, byte: u8) -> Result<(), MemoryError>;

    /// Reads a NUL-terminated string of at most `max` bytes.
    ///
    /// The terminator is not included. A string without a terminator in the
    /// first `max` bytes is cut at `max`.
    fn read_cstr(&self, addr: u32, max: usize) -> Result<Vec<u8>, MemoryError> {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while out.len() < max {
            let at = addr
                .checked_add(out.len() as u32)
                .ok_or(MemoryError::OutOfRange { addr, len: out.len() + 1 })?;
            self.read(at, &mut byte)?;
            if byte[0] == 0 {
                break;
            }
            out.push(byte[0]);
        }
        Ok(out)
    }
}

/// Guest memory held in a heap buffer starting at `base`.
///
/// Accesses outside the buffer fail instead of touching host memory.
pub struct BufferMemory {
    base: u32,
    bytes: Mutex<Vec<u8>>,
}

impl BufferMemory {
    /// Creates `size` zeroed bytes covering `[base, base + size)`.
    pub fn new(base: u32, size: usize) -> Self {
        Self {
            base,
            bytes: Mutex::new(alloc::vec![0; size]),
        }
    }

    /// Copy of `[addr, addr + len)`, mainly for assertions.
    pub fn snapshot(&self, addr: u32, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut out = alloc::vec![0; len];
        self.read(addr, &mut out)?;
        Ok(out)
    }

    fn range(&self, addr: u32, len: usize, total: usize) -> Result<core::ops::Range<usize>, MemoryError> {
        let err = MemoryError::OutOfRange { addr, len };
        let start = addr.checked_sub(self.base).ok_or(err)? as usize;
        let end = start.checked_add(len).ok_or(err)?;
        if end > total {
            return Err(err);
        }
        Ok(start..end)
    }
}

impl GuestMemory for BufferMemory {
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let bytes = self.bytes.lock();
        let range = self.range(addr, buf.len(), bytes.len())?;
        buf.copy_from_slice(&bytes[range]);
        Ok(())
    }

    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let mut bytes = self.bytes.lock();
        let total = bytes.len();
        let range = self.range(addr, data.len(), total)?;
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn fill(&self, addr: u32, len: usize, byte: u8) -> Result<(), MemoryError> {
        let mut bytes = self.bytes.lock();
        let total = bytes.len();
        let range = self.range(addr, len, total)?;
        bytes[range].fill(byte);
        Ok(())
    }
}

/// The machine's own memory, addressed directly.
///
/// No range is checked: the caller guarantees every address it passes is
/// mapped and does not overlap live kernel state.
pub struct PhysicalWindow {
    _private: (),
}

impl PhysicalWindow {
    /// Creates the window.
    ///
    /// # Safety
    ///
    /// Only valid when guest addresses are identical to kernel virtual
    /// addresses and the load window and guest stack are mapped.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl GuestMemory for PhysicalWindow {
    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        // SAFETY: guaranteed by the contract of `PhysicalWindow::new`.
        unsafe {
            core::ptr::copy_nonoverlapping(addr as usize as *const u8, buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    fn write(&self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        // SAFETY: guaranteed by the contract of `PhysicalWindow::new`.
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr(), addr as usize as *mut u8, data.len());
        }
        Ok(())
    }

    fn fill(&self, addr: u32, len: usize, byte: u8) -> Result<(), MemoryError> {
        // SAFETY: guaranteed by the contract of `PhysicalWindow::new`.
        unsafe {
            core::ptr::write_bytes(addr as usize as *mut u8, byte, len);
        }
        Ok(())
    }
}
