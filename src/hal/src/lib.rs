//! Lodestar Hardware Abstraction Layer (HAL) traits.
//!
//! This crate defines traits that abstract away platform-specific hardware details.

#![no_std]

use core::fmt;

/// Size of one addressable disk sector.
pub const SECTOR_SIZE: usize = 512;

/// Trait for a serial port or similar character-based communication channel.
pub trait Serial {
    /// Writes a single byte to the serial port.
    fn write_byte(&mut self, byte: u8);
    /// Reads a single byte from the serial port, if available.
    fn read_byte(&mut self) -> Option<u8>;
}

/// Trait for a text-based console output.
pub trait Console {
    /// Writes a string to the console.
    fn write_str(&mut self, s: &str);
    /// Clears the console screen.
    fn clear(&mut self);
}

/// Block device errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// No drive answered on the bus.
    NoDevice,
    /// The drive stayed busy past the retry bound.
    Timeout,
    /// The drive reported an error or device fault.
    DeviceFault,
    /// The sector lies beyond the end of the device.
    OutOfRange,
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockError::NoDevice => write!(f, "no device"),
            BlockError::Timeout => write!(f, "device timed out"),
            BlockError::DeviceFault => write!(f, "device fault"),
            BlockError::OutOfRange => write!(f, "sector out of range"),
        }
    }
}

/// Trait for sector-addressed storage.
///
/// Reads block the caller until the sector is available or the driver gives up.
pub trait BlockDevice {
    /// Reads sector `lba` into `buf`.
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), BlockError>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &T {
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), BlockError> {
        (**self).read_sector(lba, buf)
    }
}
