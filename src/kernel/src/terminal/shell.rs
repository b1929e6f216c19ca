//! Command-line shell with input handling.
//!
//! Provides line editing and command history. The cursor always sits at the
//! end of the line.

use super::commands::Command;
use crate::arch::x86_64::vga::{self, Color};
use crate::{print, println};
use alloc::collections::VecDeque;
use alloc::string::String;
use lodestar_common::limits::MAX_CMDLINE_LEN;
use pc_keyboard::DecodedKey;

/// Maximum input line length.
const MAX_LINE_LENGTH: usize = MAX_CMDLINE_LEN - 1;

/// Maximum command history size.
const MAX_HISTORY: usize = 16;

/// Prompt label.
const PROMPT: &str = "lodestar";

/// Terminal shell with line editing and history.
pub struct Terminal {
    /// Current input buffer.
    input_buffer: String,
    /// Previous lines, oldest first.
    history: VecDeque<String>,
    /// Entry being shown while browsing history.
    history_index: Option<usize>,
    /// The unfinished line set aside while browsing.
    saved_input: String,
}

impl Terminal {
    /// Create a new terminal.
    pub fn new() -> Self {
        Self {
            input_buffer: String::with_capacity(MAX_LINE_LENGTH),
            history: VecDeque::with_capacity(MAX_HISTORY),
            history_index: None,
            saved_input: String::new(),
        }
    }

    /// Display the shell prompt.
    pub fn prompt(&self) {
        vga::set_color(Color::LightGreen, Color::Black);
        print!("{}", PROMPT);
        vga::set_color(Color::White, Color::Black);
        print!("> ");
    }

    /// Handle a decoded key input.
    ///
    /// Returns a command if the user pressed Enter on a non-empty line.
    pub fn handle_key(&mut self, key: DecodedKey) -> Option<Command> {
        match key {
            DecodedKey::Unicode(c) => self.handle_char(c),
            DecodedKey::RawKey(raw) => {
                self.handle_raw_key(raw);
                None
            }
        }
    }

    fn handle_char(&mut self, c: char) -> Option<Command> {
        match c {
            '\n' | '\r' => {
                println!();
                let command = Command::parse(&self.input_buffer);

                if !self.input_buffer.trim().is_empty() {
                    self.add_to_history(self.input_buffer.clone());
                }
                self.input_buffer.clear();
                self.history_index = None;

                if command.is_none() {
                    self.prompt();
                }
                command
            }
            '\x08' | '\x7f' => {
                if self.input_buffer.pop().is_some() {
                    print!("\x08 \x08");
                }
                None
            }
            c if c.is_ascii() && !c.is_control() => {
                if self.input_buffer.len() < MAX_LINE_LENGTH {
                    self.input_buffer.push(c);
                    print!("{}", c);
                }
                None
            }
            _ => None,
        }
    }

    fn handle_raw_key(&mut self, key: pc_keyboard::KeyCode) {
        use pc_keyboard::KeyCode;

        match key {
            KeyCode::ArrowUp => self.history_up(),
            KeyCode::ArrowDown => self.history_down(),
            _ => {}
        }
    }

    fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }

        match self.history_index {
            None => {
                self.saved_input = self.input_buffer.clone();
                self.history_index = Some(self.history.len() - 1);
            }
            Some(0) => return,
            Some(idx) => self.history_index = Some(idx - 1),
        }

        if let Some(idx) = self.history_index {
            let entry = self.history[idx].clone();
            self.replace_line(entry);
        }
    }

    fn history_down(&mut self) {
        match self.history_index {
            None => {}
            Some(idx) if idx + 1 >= self.history.len() => {
                self.history_index = None;
                let saved = core::mem::take(&mut self.saved_input);
                self.replace_line(saved);
            }
            Some(idx) => {
                self.history_index = Some(idx + 1);
                let entry = self.history[idx + 1].clone();
                self.replace_line(entry);
            }
        }
    }

    fn add_to_history(&mut self, line: String) {
        if self.history.back() == Some(&line) {
            return;
        }
        if self.history.len() == MAX_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    /// Erases the visible input and shows `line` instead.
    fn replace_line(&mut self, line: String) {
        for _ in 0..self.input_buffer.len() {
            print!("\x08 \x08");
        }
        self.input_buffer = line;
        print!("{}", self.input_buffer);
    }

    /// Clear the terminal screen.
    pub fn clear(&self) {
        vga::clear_screen();
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}
