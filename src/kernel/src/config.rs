//! Kernel configuration and the fixed memory layout.
//!
//! Everything a guest can address lives below 4 GiB:
//!
//! ```text
//! 0x0070_0000 .. 0x0074_0000   guest stack (outermost program)
//! 0x0080_0000 .. 0x0088_0000   fixed load window
//! 0x0100_0000 .. 0x0140_0000   kernel heap
//! ```

/// Start of the fixed load window.
pub const LOAD_BASE: u32 = 0x0080_0000;
/// Size of the fixed load window.
pub const LOAD_SIZE: u32 = 0x0008_0000;

/// Lowest address of the guest stack.
pub const GUEST_STACK_BOTTOM: u32 = 0x0070_0000;
/// Initial stack pointer of the outermost program.
pub const GUEST_STACK_TOP: u32 = 0x0074_0000;

/// Largest program file `EXEC` will read.
pub const MAX_IMAGE_SIZE: usize = 128 * 1024;

/// Longest string accepted from guest memory for `PRINT`.
pub const MAX_PRINT_LEN: usize = 64 * 1024;

/// Longest file name accepted from guest memory, terminator included.
pub const MAX_PATH_LEN: usize = 256;

/// Program run by the kernel once boot completes.
pub const INIT_PROGRAM: &str = "SHELL";

/// Runtime parameters of the execution subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Start of the fixed load window.
    pub load_base: u32,
    /// Size of the fixed load window in bytes.
    pub load_size: u32,
    /// Stack pointer for the outermost program.
    pub stack_top: u32,
    /// Largest program file accepted by `EXEC`.
    pub max_image_size: usize,
}

impl KernelConfig {
    /// The layout used on real hardware.
    pub const DEFAULT: KernelConfig = KernelConfig {
        load_base: LOAD_BASE,
        load_size: LOAD_SIZE,
        stack_top: GUEST_STACK_TOP,
        max_image_size: MAX_IMAGE_SIZE,
    };

    /// First address past the load window.
    pub const fn load_end(&self) -> u64 {
        self.load_base as u64 + self.load_size as u64
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
