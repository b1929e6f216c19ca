//! Memory management: page mapping at boot and access to guest memory.
//!
//! Paging is only used once, to back the heap, the guest stack and the
//! fixed load window with frames. After boot every address the kernel and
//! its guests touch is mapped and there is a single address space.

pub mod guest;

pub use guest::{BufferMemory, GuestMemory, MemoryError, PhysicalWindow};

#[cfg(target_os = "none")]
mod paging;

#[cfg(target_os = "none")]
pub use paging::{init_mapper, map_region, BootInfoFrameAllocator};
