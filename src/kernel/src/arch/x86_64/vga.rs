//! VGA text mode driver for x86_64.
//!
//! Writes to the 80x25 text buffer at 0xB8000 and keeps the hardware cursor
//! in step with the write position. Output always lands on the bottom row;
//! a newline scrolls everything up.

use core::fmt;
use core::ptr;
use spin::Mutex;
use x86_64::instructions::port::Port;

/// VGA text buffer memory-mapped I/O address.
const VGA_BUFFER_ADDR: usize = 0xB8000;

/// Number of rows in VGA text mode.
const BUFFER_HEIGHT: usize = 25;

/// Number of columns in VGA text mode.
const BUFFER_WIDTH: usize = 80;

/// CRT controller index and data ports.
const CRTC_INDEX: u16 = 0x3D4;
const CRTC_DATA: u16 = 0x3D5;

/// Glyph drawn for bytes outside printable ASCII.
const PLACEHOLDER: u8 = 0xfe;

/// VGA color codes.
///
/// Standard 16-color VGA palette for text mode.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct ColorCode(u8);

impl ColorCode {
    const fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode((background as u8) << 4 | (foreground as u8))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct ScreenChar {
    ascii_character: u8,
    color_code: ColorCode,
}

#[repr(transparent)]
struct Buffer {
    chars: [[ScreenChar; BUFFER_WIDTH]; BUFFER_HEIGHT],
}

/// Global VGA writer instance.
pub static WRITER: spin::Once<Mutex<Writer>> = spin::Once::new();

/// Initializes the global VGA writer.
///
/// Idempotent - safe to call multiple times.
pub fn init() {
    get_writer();
}

fn get_writer() -> &'static Mutex<Writer> {
    WRITER.call_once(|| Mutex::new(Writer::new()))
}

/// VGA text mode writer.
pub struct Writer {
    column_position: usize,
    color_code: ColorCode,
    /// SAFETY: valid for the kernel's lifetime; the text buffer at 0xB8000
    /// is always mapped.
    buffer: *mut Buffer,
}

// SAFETY: the buffer is memory-mapped hardware that lives as long as the
// kernel, and all access goes through the WRITER spinlock.
unsafe impl Send for Writer {}

impl Writer {
    fn new() -> Self {
        Writer {
            column_position: 0,
            color_code: ColorCode::new(Color::White, Color::Black),
            buffer: VGA_BUFFER_ADDR as *mut Buffer,
        }
    }

    /// Sets the foreground and background colors for subsequent writes.
    pub fn set_color(&mut self, foreground: Color, background: Color) {
        self.color_code = ColorCode::new(foreground, background);
    }

    /// Writes one byte, interpreting `\n`, `\r` and backspace.
    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            b'\r' => self.column_position = 0,
            0x08 => {
                if self.column_position > 0 {
                    self.column_position -= 1;
                    self.put(self.column_position, b' ');
                }
            }
            byte => {
                if self.column_position >= BUFFER_WIDTH {
                    self.new_line();
                }
                let glyph = match byte {
                    0x20..=0x7e => byte,
                    _ => PLACEHOLDER,
                };
                self.put(self.column_position, glyph);
                self.column_position += 1;
            }
        }
    }

    /// Writes raw bytes and moves the hardware cursor once at the end.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
        self.update_cursor();
    }

    fn put(&mut self, col: usize, ascii_character: u8) {
        debug_assert!(col < BUFFER_WIDTH);
        // SAFETY: col is below BUFFER_WIDTH and the row is the last one.
        // Volatile because the buffer is read by the display hardware.
        unsafe {
            ptr::write_volatile(
                &mut (*self.buffer).chars[BUFFER_HEIGHT - 1][col],
                ScreenChar {
                    ascii_character,
                    color_code: self.color_code,
                },
            );
        }
    }

    fn new_line(&mut self) {
        for row in 1..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                // SAFETY: row and row - 1 are below BUFFER_HEIGHT, col below BUFFER_WIDTH.
                unsafe {
                    let character = ptr::read_volatile(&(*self.buffer).chars[row][col]);
                    ptr::write_volatile(&mut (*self.buffer).chars[row - 1][col], character);
                }
            }
        }
        self.clear_row(BUFFER_HEIGHT - 1);
        self.column_position = 0;
    }

    fn clear_row(&mut self, row: usize) {
        debug_assert!(row < BUFFER_HEIGHT, "row index out of bounds");

        let blank = ScreenChar {
            ascii_character: b' ',
            color_code: self.color_code,
        };
        for col in 0..BUFFER_WIDTH {
            // SAFETY: row is asserted to be < BUFFER_HEIGHT, col is in [0, BUFFER_WIDTH).
            unsafe {
                ptr::write_volatile(&mut (*self.buffer).chars[row][col], blank);
            }
        }
    }

    /// Moves the blinking hardware cursor to the write position.
    fn update_cursor(&self) {
        let pos = ((BUFFER_HEIGHT - 1) * BUFFER_WIDTH + self.column_position.min(BUFFER_WIDTH - 1)) as u16;
        let mut index: Port<u8> = Port::new(CRTC_INDEX);
        let mut data: Port<u8> = Port::new(CRTC_DATA);
        // SAFETY: registers 0x0E/0x0F of the CRT controller hold the cursor
        // location and have no other effect.
        unsafe {
            index.write(0x0F);
            data.write((pos & 0xFF) as u8);
            index.write(0x0E);
            data.write((pos >> 8) as u8);
        }
    }

    /// Clears the entire screen.
    pub fn clear_screen(&mut self) {
        for row in 0..BUFFER_HEIGHT {
            self.clear_row(row);
        }
        self.column_position = 0;
        self.update_cursor();
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

impl lodestar_hal::Console for Writer {
    fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    fn clear(&mut self) {
        self.clear_screen();
    }
}

/// Internal print function used by the console macros.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    let _ = get_writer().lock().write_fmt(args);
}

/// Writes raw bytes, such as guest output that may not be UTF-8.
pub fn write_bytes(bytes: &[u8]) {
    get_writer().lock().write_bytes(bytes);
}

/// Sets the VGA output color.
pub fn set_color(foreground: Color, background: Color) {
    get_writer().lock().set_color(foreground, background);
}

/// Clears the VGA screen.
pub fn clear_screen() {
    lodestar_hal::Console::clear(&mut *get_writer().lock());
}
