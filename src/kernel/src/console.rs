//! Character I/O used by the syscall layer and the kernel monitor.
//!
//! Output goes to the VGA text buffer and COM1 together. Input is polled from
//! the PS/2 keyboard first and the serial line second.

use core::fmt;

/// Byte-oriented console.
///
/// `read_char` may block the calling thread; everything else returns
/// immediately.
pub trait ConsoleIo {
    /// Writes raw bytes.
    fn put_bytes(&self, bytes: &[u8]);

    /// Writes a string.
    fn put_str(&self, s: &str) {
        self.put_bytes(s.as_bytes());
    }

    /// Returns a pending input byte, if any.
    fn poll_char(&self) -> Option<u8>;

    /// Busy-polls until an input byte arrives.
    fn read_char(&self) -> u8 {
        loop {
            if let Some(c) = self.poll_char() {
                return c;
            }
            core::hint::spin_loop();
        }
    }
}

/// The machine console: VGA plus COM1 out, keyboard plus COM1 in.
#[cfg(target_arch = "x86_64")]
pub struct SystemConsole;

#[cfg(target_arch = "x86_64")]
impl ConsoleIo for SystemConsole {
    fn put_bytes(&self, bytes: &[u8]) {
        use crate::arch::x86_64::{serial::SerialWrapper, vga};
        use lodestar_hal::Serial;

        vga::write_bytes(bytes);
        let mut serial = SerialWrapper;
        for &b in bytes {
            if b == b'\n' {
                serial.write_byte(b'\r');
            }
            serial.write_byte(b);
        }
    }

    fn poll_char(&self) -> Option<u8> {
        use crate::arch::x86_64::{keyboard, serial::SerialWrapper};
        use lodestar_hal::Serial;

        keyboard::poll_char().or_else(|| SerialWrapper.read_byte())
    }
}

/// Prints to the VGA buffer and serial port without a newline.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::_print(format_args!($($arg)*))
    };
}

/// Prints to the VGA buffer and serial port with a newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)))
}

/// Internal print function used by macros.
#[doc(hidden)]
#[cfg(target_arch = "x86_64")]
pub fn _print(args: fmt::Arguments) {
    crate::arch::x86_64::vga::_print(args);
    crate::arch::x86_64::serial::_print(args);
}
