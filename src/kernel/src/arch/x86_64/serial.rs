//! Serial port driver for x86_64.
//!
//! COM1 (0x3F8) carries the kernel log and mirrors the console. Input is
//! polled through the line status register.

use core::fmt::{self, Write};
use spin::Mutex;
use uart_16550::SerialPort;
use x86_64::instructions::port::Port;

/// COM1 I/O port address.
const COM1_PORT: u16 = 0x3F8;

/// Line status register, relative to the base port.
const LINE_STATUS: u16 = 5;

/// Line status bit: a received byte is waiting.
const DATA_READY: u8 = 0x01;

/// Global serial port instance, lazily initialized.
pub static SERIAL: spin::Once<Mutex<SerialPort>> = spin::Once::new();

/// Initializes the global serial port.
///
/// This function is idempotent - calling it multiple times has no effect
/// after the first successful initialization.
pub fn init() {
    get_serial();
}

/// Returns the serial port, initializing it on first use.
fn get_serial() -> &'static Mutex<SerialPort> {
    SERIAL.call_once(|| {
        // SAFETY: COM1_PORT (0x3F8) is the standard COM1 base. The kernel runs
        // in ring 0 with full I/O port access.
        let mut serial = unsafe { SerialPort::new(COM1_PORT) };
        serial.init();
        Mutex::new(serial)
    })
}

/// Prints to the serial port without a newline.
#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::arch::x86_64::serial::_print(format_args!($($arg)*))
    };
}

/// Prints to the serial port with a newline.
#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)))
}

/// Internal print function used by macros.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    // A failed serial write has nowhere to be reported.
    let _ = get_serial().lock().write_fmt(args);
}

/// Returns a received byte without blocking.
fn try_receive(port: &mut SerialPort) -> Option<u8> {
    let mut status: Port<u8> = Port::new(COM1_PORT + LINE_STATUS);
    // SAFETY: reading the line status register has no side effects.
    let ready = unsafe { status.read() } & DATA_READY != 0;
    // `receive` would spin until data arrives, so only call it when ready.
    ready.then(|| port.receive())
}

/// A wrapper to implement HAL traits for the serial port.
pub struct SerialWrapper;

impl lodestar_hal::Serial for SerialWrapper {
    fn write_byte(&mut self, byte: u8) {
        get_serial().lock().send(byte);
    }

    fn read_byte(&mut self) -> Option<u8> {
        try_receive(&mut get_serial().lock())
    }
}
