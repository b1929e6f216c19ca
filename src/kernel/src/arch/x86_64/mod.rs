//! x86_64 architecture support.
//!
//! Console devices (VGA text mode, COM1, PS/2 keyboard), the ATA disk, and
//! on bare metal the descriptor tables and the guest trampoline.

pub mod ata;
pub mod keyboard;
pub mod serial;
pub mod vga;

#[cfg(target_os = "none")]
pub mod gdt;
#[cfg(target_os = "none")]
pub mod interrupts;
#[cfg(target_os = "none")]
pub mod trampoline;

pub use serial::SERIAL;
pub use vga::{Color, Writer, WRITER};

/// Halts the CPU until the next interrupt.
#[inline]
pub fn hlt() {
    x86_64::instructions::hlt();
}

/// Halts the CPU in an infinite loop.
///
/// Used after unrecoverable errors (panics).
pub fn halt_loop() -> ! {
    loop {
        hlt();
    }
}
