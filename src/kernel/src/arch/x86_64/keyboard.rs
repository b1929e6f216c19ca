//! Polled PS/2 keyboard.
//!
//! Interrupts stay masked while guests run, so the controller is read
//! directly: port 0x64 reports whether a byte is waiting on port 0x60.

use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};
use spin::Mutex;
use x86_64::instructions::port::Port;

const DATA_PORT: u16 = 0x60;
const STATUS_PORT: u16 = 0x64;

/// Status bit: output buffer full.
const OUTPUT_FULL: u8 = 0x01;

/// Status bit: the waiting byte came from the auxiliary (mouse) port.
const AUX_DATA: u8 = 0x20;

/// Global keyboard decoder instance.
static KEYBOARD: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(Keyboard::new(
    ScancodeSet1::new(),
    layouts::Us104Key,
    HandleControl::Ignore,
));

/// Decode a PS/2 scancode to a key event.
///
/// Returns the decoded key if a complete key event was received.
pub fn decode_scancode(scancode: u8) -> Option<DecodedKey> {
    let mut keyboard = KEYBOARD.lock();
    if let Ok(Some(key_event)) = keyboard.add_byte(scancode) {
        keyboard.process_keyevent(key_event)
    } else {
        None
    }
}

/// Reads a pending scancode, if any.
fn read_scancode() -> Option<u8> {
    let mut status: Port<u8> = Port::new(STATUS_PORT);
    let mut data: Port<u8> = Port::new(DATA_PORT);
    // SAFETY: reading the controller status has no side effects, and the
    // data port is only read once the status says a byte is waiting.
    unsafe {
        let s = status.read();
        if s & OUTPUT_FULL == 0 {
            return None;
        }
        let byte = data.read();
        (s & AUX_DATA == 0).then_some(byte)
    }
}

/// Polls for a decoded key without blocking.
pub fn poll_key() -> Option<DecodedKey> {
    read_scancode().and_then(decode_scancode)
}

/// Polls for an ASCII character without blocking.
///
/// Enter is reported as `\n`. Keys with no ASCII rendering are dropped.
pub fn poll_char() -> Option<u8> {
    match poll_key()? {
        DecodedKey::Unicode(c) if c.is_ascii() => Some(c as u8),
        _ => None,
    }
}
