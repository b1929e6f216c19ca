//! Test infrastructure for the Lodestar kernel.
//!
//! Shared by the host unit tests, the host integration tests in `tests/`
//! and the boot self-tests that run under QEMU.
//!
//! ```rust,ignore
//! use lodestar_kernel::testutil::ImageBuilder;
//!
//! let image = ImageBuilder::new(0x0080_0000)
//!     .segment(0x0080_0000, &code, code.len() as u32)
//!     .build();
//! ```

use crate::serial_println;
use alloc::vec::Vec;
use goblin::elf::header::{ELFCLASS32, ELFDATA2LSB, EM_X86_64, ET_EXEC};
use goblin::elf::program_header::{PT_LOAD, PT_NOTE};

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;
const SHDR_SIZE: u16 = 40;

/// QEMU exit codes for signaling test results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    /// All tests passed.
    Success = 0x10,
    /// One or more tests failed.
    Failed = 0x11,
}

/// Exit QEMU with the given exit code.
///
/// QEMU must be started with `-device isa-debug-exit,iobase=0xf4,iosize=0x04`.
/// The process exit status is `(value << 1) | 1`, so `Success` becomes 33.
#[cfg(target_os = "none")]
pub fn exit_qemu(exit_code: QemuExitCode) {
    use x86_64::instructions::port::Port;

    // SAFETY: port 0xf4 is the isa-debug-exit device; writing it ends the VM.
    unsafe {
        let mut port = Port::new(0xf4);
        port.write(exit_code as u32);
    }
}

/// Trait for types that can be run as tests.
pub trait Testable {
    /// Run the test and report results.
    fn run(&self);
}

impl<T: Fn()> Testable for T {
    fn run(&self) {
        serial_println!("test {} ... ", core::any::type_name::<T>());
        self();
        serial_println!("[ok]");
    }
}

/// Panic handler for self-test runs.
///
/// Reports the failure and exits QEMU with the failure code.
#[cfg(target_os = "none")]
pub fn test_panic_handler(info: &core::panic::PanicInfo) -> ! {
    serial_println!("[failed]");
    serial_println!("Error: {}", info);
    exit_qemu(QemuExitCode::Failed);
    crate::arch::x86_64::halt_loop()
}

struct Phdr {
    p_type: u32,
    vaddr: u32,
    data: Vec<u8>,
    mem_size: u32,
}

/// Builds minimal x32 ELF images.
///
/// The header is followed by the program headers and then each segment's
/// bytes in order. Identity fields can be overridden to produce images the
/// loader must reject.
pub struct ImageBuilder {
    class: u8,
    encoding: u8,
    machine: u16,
    kind: u16,
    entry: u32,
    phdrs: Vec<Phdr>,
}

impl ImageBuilder {
    /// A valid executable image with no segments, entered at `entry`.
    pub fn new(entry: u32) -> Self {
        Self {
            class: ELFCLASS32,
            encoding: ELFDATA2LSB,
            machine: EM_X86_64,
            kind: ET_EXEC,
            entry,
            phdrs: Vec::new(),
        }
    }

    /// Overrides `EI_CLASS`.
    pub fn class(mut self, class: u8) -> Self {
        self.class = class;
        self
    }

    /// Overrides `EI_DATA`.
    pub fn encoding(mut self, encoding: u8) -> Self {
        self.encoding = encoding;
        self
    }

    /// Overrides `e_machine`.
    pub fn machine(mut self, machine: u16) -> Self {
        self.machine = machine;
        self
    }

    /// Overrides `e_type`.
    pub fn kind(mut self, kind: u16) -> Self {
        self.kind = kind;
        self
    }

    /// Adds a `PT_LOAD` segment.
    pub fn segment(mut self, vaddr: u32, data: &[u8], mem_size: u32) -> Self {
        self.phdrs.push(Phdr {
            p_type: PT_LOAD,
            vaddr,
            data: data.to_vec(),
            mem_size,
        });
        self
    }

    /// Adds a `PT_NOTE` segment, which the loader must skip.
    pub fn note(mut self, data: &[u8]) -> Self {
        self.phdrs.push(Phdr {
            p_type: PT_NOTE,
            vaddr: 0,
            data: data.to_vec(),
            mem_size: data.len() as u32,
        });
        self
    }

    /// Serializes the image.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut ident = [0u8; 16];
        ident[..4].copy_from_slice(b"\x7fELF");
        ident[4] = self.class;
        ident[5] = self.encoding;
        ident[6] = 1;
        out.extend_from_slice(&ident);
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.machine.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&self.entry.to_le_bytes());
        let phoff = if self.phdrs.is_empty() { 0 } else { EHDR_SIZE as u32 };
        out.extend_from_slice(&phoff.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(self.phdrs.len() as u16).to_le_bytes());
        out.extend_from_slice(&SHDR_SIZE.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx

        let mut offset = (EHDR_SIZE + PHDR_SIZE * self.phdrs.len()) as u32;
        for ph in &self.phdrs {
            for word in [
                ph.p_type,
                offset,
                ph.vaddr,
                ph.vaddr,
                ph.data.len() as u32,
                ph.mem_size,
                0x7, // rwx
                0x1000,
            ] {
                out.extend_from_slice(&word.to_le_bytes());
            }
            offset += ph.data.len() as u32;
        }
        for ph in &self.phdrs {
            out.extend_from_slice(&ph.data);
        }
        out
    }
}
