//! Prints its arguments.

#![no_std]
#![no_main]

use lodestar_sdk::{arg, arg_count, entry, print, println};

entry!(main);

fn main() -> i32 {
    let mut buf = [0u8; 64];
    for i in 0..arg_count() {
        if i > 0 {
            print(" ");
        }
        if let Some(word) = arg(i, &mut buf) {
            print(word);
        }
    }
    println!();
    0
}
