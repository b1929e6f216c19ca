//! Prints a file.

#![no_std]
#![no_main]

use lodestar_sdk::{arg, arg_count, close, entry, open, print_bytes, println, read};

entry!(main);

fn main() -> i32 {
    if arg_count() < 1 {
        println!("Usage: cat <filename>");
        return 1;
    }
    let mut name = [0u8; 64];
    let Some(name) = arg(0, &mut name) else {
        println!("Error: Failed to get filename argument");
        return 1;
    };
    if open(name).is_err() {
        println!("cat: {}: No such file", name);
        return 1;
    }

    let mut buf = [0u8; 512];
    let status = loop {
        match read(&mut buf) {
            Ok(0) => break 0,
            Ok(n) => print_bytes(&buf[..n]),
            Err(_) => {
                println!("cat: Error reading file");
                break 1;
            }
        }
    };
    let _ = close();
    status
}
