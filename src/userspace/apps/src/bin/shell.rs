//! Interactive shell: reads a line, runs it as a program.

#![no_std]
#![no_main]

use lodestar_sdk::{entry, exec, getchar, print, println, ExecError, MAX_CMDLINE_LEN};

const LINE_MAX: usize = MAX_CMDLINE_LEN;
const PROMPT: &str = "lodestar$ ";

entry!(main);

fn main() -> i32 {
    println!("\nLodestar Shell Started");
    let mut line = [0u8; LINE_MAX];
    let mut len = 0;
    print(PROMPT);

    loop {
        match getchar() {
            b'\x08' | 0x7f => {
                if len > 0 {
                    len -= 1;
                    print("\x08 \x08");
                }
            }
            b'\n' => {
                print("\n");
                let text = core::str::from_utf8(&line[..len]).unwrap_or("");
                let text = text.trim();
                if text == "exit" {
                    return 0;
                }
                if !text.is_empty() {
                    if let Err(e) = exec(text) {
                        report(e, text);
                    }
                }
                len = 0;
                print(PROMPT);
            }
            c if (0x20..0x7f).contains(&c) && len < LINE_MAX - 1 => {
                line[len] = c;
                len += 1;
                lodestar_sdk::print_bytes(&[c]);
            }
            _ => {}
        }
    }
}

fn report(err: ExecError, line: &str) {
    match err {
        ExecError::NotFound => println!("Command not found: {}", line),
        ExecError::TooLarge => println!("Error: File too large"),
        ExecError::ReadFailed => println!("Error: Failed to read file"),
        ExecError::NotElf => println!("Error: Not an ELF binary"),
        ExecError::RunFailed => println!("Error: Failed to execute"),
        ExecError::OutOfMemory => println!("Error: Out of memory"),
    }
}
