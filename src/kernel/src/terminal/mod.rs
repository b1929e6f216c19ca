//! Kernel monitor.
//!
//! The fallback command line used when no shell program is on disk, or
//! after it exits.
//!
//! # Architecture
//!
//! - `shell`: line editing and history
//! - `commands`: built-in commands and program launch

pub mod commands;
pub mod shell;

pub use commands::Command;
pub use shell::Terminal;

use pc_keyboard::DecodedKey;

/// Turns a byte from the serial line into a key event.
///
/// Terminals send `\r` for Enter and DEL for Backspace.
pub fn decode_serial(byte: u8) -> Option<DecodedKey> {
    match byte {
        b'\r' => Some(DecodedKey::Unicode('\n')),
        0x7f => Some(DecodedKey::Unicode('\x08')),
        b if b.is_ascii() => Some(DecodedKey::Unicode(b as char)),
        _ => None,
    }
}
