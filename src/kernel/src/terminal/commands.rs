//! Built-in monitor commands.
//!
//! Anything that is not a built-in is handed to `EXEC` as a program line.

use crate::arch::x86_64::vga::{self, Color};
use crate::runtime::Kernel;
use crate::{print, println};
use alloc::format;
use alloc::string::{String, ToString};
use lodestar_common::ExecError;

/// Entries shown by `ls`.
const MAX_LISTING: usize = 64;

/// Shell command types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Display help information.
    Help,
    /// Clear the screen.
    Clear,
    /// List the root directory.
    Ls,
    /// Show system info.
    Sysinfo,
    /// Run a program; holds the whole line, program name first.
    Run(String),
}

impl Command {
    /// Parse a command from an input line.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        let word = line.split_whitespace().next()?;
        Some(match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "clear" | "cls" => Command::Clear,
            "ls" | "dir" => Command::Ls,
            "sysinfo" | "info" => Command::Sysinfo,
            _ => Command::Run(line.to_string()),
        })
    }

    /// Execute a command.
    pub fn execute(self, kernel: &Kernel, terminal: &super::Terminal) {
        match self {
            Command::Help => cmd_help(),
            Command::Clear => terminal.clear(),
            Command::Ls => cmd_ls(kernel),
            Command::Sysinfo => cmd_sysinfo(kernel),
            Command::Run(line) => match kernel.exec(&line) {
                Ok(code) => log::info!("{} exited with {}", line, code),
                Err(e) => {
                    vga::set_color(Color::LightRed, Color::Black);
                    println!("{}", exec_error_message(e, &line));
                    vga::set_color(Color::White, Color::Black);
                }
            },
        }
    }
}

/// The line printed when a program cannot be run.
pub fn exec_error_message(err: ExecError, line: &str) -> String {
    match err {
        ExecError::NotFound => format!("Command not found: {}", line),
        ExecError::TooLarge => "Error: File too large".to_string(),
        ExecError::ReadFailed => "Error: Failed to read file".to_string(),
        ExecError::NotElf => "Error: Not an ELF binary".to_string(),
        ExecError::RunFailed => "Error: Failed to execute".to_string(),
        ExecError::OutOfMemory => "Error: Out of memory".to_string(),
    }
}

fn cmd_help() {
    println!();
    vga::set_color(Color::Cyan, Color::Black);
    println!("Lodestar Monitor Commands");
    println!("=========================");
    vga::set_color(Color::White, Color::Black);
    println!();
    println!("  help          Show this help message");
    println!("  clear         Clear the screen");
    println!("  ls            List files on the boot volume");
    println!("  sysinfo       Show system information");
    println!("  <program> [args...]  Run a program from disk");
    println!();
}

fn cmd_ls(kernel: &Kernel) {
    let entries = match kernel.filesystem().list(MAX_LISTING) {
        Ok(entries) => entries,
        Err(e) => {
            vga::set_color(Color::LightRed, Color::Black);
            println!("Error: Failed to read directory ({})", e);
            vga::set_color(Color::White, Color::Black);
            return;
        }
    };
    if entries.is_empty() {
        println!("(empty directory)");
        return;
    }
    for entry in &entries {
        print!("  {:<16}", entry.name);
        if entry.is_directory {
            println!("<DIR>");
        } else {
            println!("{:>8} bytes", entry.size);
        }
    }
    println!("Total entries: {}", entries.len());
}

fn cmd_sysinfo(kernel: &Kernel) {
    let config = kernel.config();
    println!();
    vga::set_color(Color::Cyan, Color::Black);
    println!("Lodestar System Information");
    println!("===========================");
    vga::set_color(Color::White, Color::Black);
    println!("  Version:    {}", env!("CARGO_PKG_VERSION"));
    println!("  Arch:       x86_64 (x32 guests)");
    println!(
        "  Load:       {:#010x}..{:#010x}",
        config.load_base,
        config.load_end()
    );
    println!("  Max image:  {} KiB", config.max_image_size / 1024);
    println!("  Syscalls:   table at {:#010x}", kernel.table_address());
    #[cfg(target_os = "none")]
    println!("  Heap free:  {} KiB", crate::allocator::free_bytes() / 1024);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builtins() {
        assert_eq!(Command::parse("help"), Some(Command::Help));
        assert_eq!(Command::parse("  CLS "), Some(Command::Clear));
        assert_eq!(Command::parse("ls"), Some(Command::Ls));
        assert_eq!(Command::parse("info"), Some(Command::Sysinfo));
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn test_parse_program_line() {
        assert_eq!(
            Command::parse(" cat  readme.txt "),
            Some(Command::Run("cat  readme.txt".to_string()))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            exec_error_message(ExecError::NotFound, "nope"),
            "Command not found: nope"
        );
        assert_eq!(
            exec_error_message(ExecError::NotElf, "x"),
            "Error: Not an ELF binary"
        );
    }
}
