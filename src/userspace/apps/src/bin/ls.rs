//! Lists the root directory.

#![no_std]
#![no_main]

use lodestar_sdk::{entry, list_dir, println, DirInfo};

entry!(main);

fn main() -> i32 {
    let mut entries = [DirInfo::new("", 0, false); 64];
    let count = match list_dir(&mut entries) {
        Ok(n) => n,
        Err(_) => {
            println!("Error: Failed to read directory");
            return 1;
        }
    };
    if count == 0 {
        println!("(empty directory)");
        return 0;
    }

    println!("Name            Type    Size");
    println!("--------------------------------------");
    for entry in &entries[..count] {
        let name = core::str::from_utf8(entry.name()).unwrap_or("?");
        let kind = if entry.is_directory != 0 { "<DIR> " } else { "<FILE>" };
        println!("{:<16}{}  {} bytes", name, kind, entry.size);
    }
    println!("--------------------------------------");
    println!("Total entries: {}", count);
    0
}
