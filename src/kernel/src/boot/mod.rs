//! Boot logging with colored status indicators, and boot-time device setup.
//!
//! Provides Linux-style boot messages with colored status brackets.

pub mod banner;

use crate::arch::x86_64::ata::{AtaDrive, Bus, Drive};
use crate::arch::x86_64::vga::{self, Color};
use crate::fs::{Fat32, FileSystem, RamFs};
use crate::{print, println};
use alloc::boxed::Box;
use alloc::format;

/// Boot status indicators.
#[derive(Debug, Clone, Copy)]
pub enum Status {
    /// Success - `[ OK ]` in green
    Ok,
    /// Failure - `[FAIL]` in red
    Fail,
    /// Warning - `[WARN]` in yellow
    Warn,
    /// Informational - `[INFO]` in cyan
    Info,
}

/// Log a boot stage with status.
///
/// Format: `[ OK ] Message text`
pub fn log(status: Status, message: &str) {
    print_status(status);
    println!(" {}", message);
}

/// Start a stage whose status is not known yet.
///
/// Prints `[    ] Message text`; [`log_end`] fills in the brackets.
pub fn log_start(message: &str) {
    print!("[    ] {}", message);
}

/// Finish the stage opened by [`log_start`].
pub fn log_end(status: Status) {
    print!("\r");
    print_status(status);
    println!();
}

/// Log an indented detail line (for sub-items).
///
/// Format: `       Detail text` (aligned with message after status)
pub fn log_detail(message: &str) {
    println!("       {}", message);
}

/// Log a section header.
///
/// Prints a blank line before the header for visual separation.
pub fn log_section(name: &str) {
    println!();
    vga::set_color(Color::LightCyan, Color::Black);
    println!("-- {} --", name);
    vga::set_color(Color::White, Color::Black);
}

fn print_status(status: Status) {
    let (text, color) = match status {
        Status::Ok => ("[ OK ]", Color::LightGreen),
        Status::Fail => ("[FAIL]", Color::LightRed),
        Status::Warn => ("[WARN]", Color::Yellow),
        Status::Info => ("[INFO]", Color::LightCyan),
    };
    vga::set_color(color, Color::Black);
    print!("{}", text);
    vga::set_color(Color::White, Color::Black);
}

/// Drive positions searched for the boot volume, in order.
///
/// The bootable kernel image usually occupies the primary master, so the
/// data disk is expected behind it.
const PROBE_ORDER: [(Bus, Drive); 4] = [
    (Bus::Primary, Drive::Slave),
    (Bus::Secondary, Drive::Master),
    (Bus::Secondary, Drive::Slave),
    (Bus::Primary, Drive::Master),
];

/// Mounts the first FAT32 volume found on an ATA drive.
///
/// Falls back to an empty RAM filesystem so the monitor still comes up.
pub fn mount_root() -> Box<dyn FileSystem> {
    log_start("Mounting boot volume");
    for (bus, drive) in PROBE_ORDER {
        let Ok(disk) = AtaDrive::probe(bus, drive) else {
            continue;
        };
        match Fat32::mount(disk) {
            Ok(fs) => {
                log_end(Status::Ok);
                log_detail(&format!("FAT32 on {:?} {:?}", bus, drive));
                return Box::new(fs);
            }
            Err(e) => log::info!("{:?} {:?}: not FAT32 ({})", bus, drive, e),
        }
    }
    log_end(Status::Warn);
    log_detail("No FAT32 volume found, using an empty RAM filesystem");
    Box::new(RamFs::new())
}
