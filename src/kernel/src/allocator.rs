//! Kernel heap allocation.
//!
//! The heap sits just above the guest load window and holds, among other
//! things, one copy of the load window per nested program.

use crate::memory::map_region;
use linked_list_allocator::LockedHeap;
use x86_64::structures::paging::{mapper::MapToError, FrameAllocator, Mapper, Size4KiB};

/// The start address of the kernel heap.
pub const HEAP_START: usize = 0x0100_0000;
/// The size of the kernel heap.
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Initialize the kernel heap.
pub fn init_heap(
    mapper: &mut impl Mapper<Size4KiB>,
    frame_allocator: &mut impl FrameAllocator<Size4KiB>,
) -> Result<(), MapToError<Size4KiB>> {
    map_region(HEAP_START as u64, HEAP_SIZE as u64, mapper, frame_allocator)?;

    // SAFETY: The heap memory region has just been mapped above with read/write
    // permissions. HEAP_START and HEAP_SIZE define a valid, properly aligned
    // memory region. This function is only called once during kernel initialization.
    unsafe {
        ALLOCATOR.lock().init(HEAP_START as *mut u8, HEAP_SIZE);
    }

    Ok(())
}

/// Bytes currently free on the heap.
pub fn free_bytes() -> usize {
    ALLOCATOR.lock().free()
}
