//! Byte-exact backups of the load window taken around nested runs.

use super::args::ArgTable;
use crate::fs::OpenFile;
use crate::memory::{GuestMemory, MemoryError};
use alloc::vec::Vec;

/// Failure to take a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// The staging buffer could not be allocated.
    OutOfMemory,
    /// The window could not be read.
    Memory(MemoryError),
}

impl From<MemoryError> for SnapshotError {
    fn from(e: MemoryError) -> Self {
        SnapshotError::Memory(e)
    }
}

/// The caller's view of the machine while a nested program runs.
#[derive(Debug)]
pub struct Snapshot {
    base: u32,
    image: Vec<u8>,
    /// The caller's argument table.
    pub args: ArgTable,
    /// The caller's open file, if any.
    pub open_file: Option<OpenFile>,
}

impl Snapshot {
    /// Copies `[base, base + size)` out of `mem`.
    pub fn capture(mem: &dyn GuestMemory, base: u32, size: usize) -> Result<Self, SnapshotError> {
        let mut image = Vec::new();
        image
            .try_reserve_exact(size)
            .map_err(|_| SnapshotError::OutOfMemory)?;
        image.resize(size, 0);
        mem.read(base, &mut image)?;
        Ok(Self {
            base,
            image,
            args: ArgTable::new(),
            open_file: None,
        })
    }

    /// Writes the saved bytes back to where they came from.
    pub fn restore(&self, mem: &dyn GuestMemory) -> Result<(), MemoryError> {
        mem.write(self.base, &self.image)
    }

    /// Size of the saved region.
    pub fn len(&self) -> usize {
        self.image.len()
    }

    /// Whether the saved region is empty.
    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

/// Snapshots of every program waiting on a nested run, innermost last.
#[derive(Debug, Default)]
pub struct SnapshotStack {
    frames: Vec<Snapshot>,
}

impl SnapshotStack {
    /// An empty stack.
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Makes room for one more snapshot without aborting when memory is short.
    pub fn reserve(&mut self) -> Result<(), SnapshotError> {
        self.frames
            .try_reserve(1)
            .map_err(|_| SnapshotError::OutOfMemory)
    }

    /// Pushes `snapshot` and returns the new depth.
    ///
    /// Call [`reserve`](Self::reserve) first to keep the push from allocating.
    pub fn push(&mut self, snapshot: Snapshot) -> usize {
        self.frames.push(snapshot);
        self.frames.len()
    }

    /// Removes the innermost snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.frames.pop()
    }

    /// Number of saved snapshots.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
