//! Lodestar Kernel
//!
//! A single-address-space kernel that loads 32-bit (x32) ELF programs into a
//! fixed window and lets them call back into the kernel through a table of
//! services, including running other programs.
//!
//! # Architecture
//!
//! The kernel is structured into the following modules:
//! - `arch`: Platform-specific code (VGA, serial, keyboard, ATA, trampoline)
//! - `exec`: Argument table, ELF loader, snapshots, nested execution
//! - `syscall`: The guest-facing service dispatcher
//! - `fs`: FAT32 and RAM filesystems
//! - `memory`: Page mapping at boot and guest memory access
//! - `terminal`: The fallback kernel monitor
//!
//! # Safety
//!
//! The kernel is `#![no_std]` outside host unit tests. All unsafe code is
//! documented with safety invariants explaining why the usage is correct.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(target_os = "none")]
pub mod allocator;
pub mod arch;
#[cfg(target_arch = "x86_64")]
pub mod boot;
pub mod config;
pub mod console;
pub mod exec;
pub mod fs;
#[cfg(target_arch = "x86_64")]
pub mod logger;
pub mod memory;
pub mod runtime;
pub mod syscall;
#[cfg(target_arch = "x86_64")]
pub mod terminal;
#[cfg(target_arch = "x86_64")]
pub mod testutil;

pub use runtime::Kernel;

/// Initializes core kernel subsystems.
///
/// Called early in the boot process, before the heap exists.
pub fn init() {
    #[cfg(target_arch = "x86_64")]
    {
        arch::x86_64::serial::init();
        arch::x86_64::vga::init();
        logger::init();
    }
    #[cfg(target_os = "none")]
    {
        arch::x86_64::gdt::init();
        arch::x86_64::interrupts::init_idt();
    }
}
