//! Boot banner and branding.

use crate::arch::x86_64::vga::{self, Color};
use crate::println;

/// Print the Lodestar boot banner.
pub fn print_banner() {
    vga::set_color(Color::Cyan, Color::Black);
    println!("  _              _           _             ");
    println!(" | |    ___   __| | ___  ___| |_ __ _ _ __ ");
    println!(" | |   / _ \\ / _` |/ _ \\/ __| __/ _` | '__|");
    println!(" | |__| (_) | (_| |  __/\\__ \\ || (_| | |   ");
    println!(" |_____\\___/ \\__,_|\\___||___/\\__\\__,_|_|   ");
    println!();
    vga::set_color(Color::White, Color::Black);
    println!(" Lodestar v{}", env!("CARGO_PKG_VERSION"));
    println!();
}
