//! Directory records exchanged through `LIST_DIR`.

use crate::limits::NAME_LEN;
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

bitflags! {
    /// FAT directory entry attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct FileAttributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN    = 0x02;
        const SYSTEM    = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE   = 0x20;
        /// Long-name entries set all four low bits.
        const LONG_NAME = Self::READ_ONLY.bits()
            | Self::HIDDEN.bits()
            | Self::SYSTEM.bits()
            | Self::VOLUME_ID.bits();
    }
}

/// One directory entry as written into guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DirInfo {
    /// `NAME.EXT`, NUL-terminated.
    pub name: [u8; NAME_LEN],
    pub _pad0: [u8; 3],
    /// File size in bytes.
    pub size: u32,
    /// Non-zero for directories.
    pub is_directory: u8,
    pub _pad1: [u8; 3],
}

impl DirInfo {
    /// Builds a record, truncating `name` to fit.
    pub fn new(name: &str, size: u32, is_directory: bool) -> Self {
        let mut info = Self::zeroed();
        let len = name.len().min(NAME_LEN - 1);
        info.name[..len].copy_from_slice(&name.as_bytes()[..len]);
        info.size = size;
        info.is_directory = is_directory as u8;
        info
    }

    /// The name up to its terminator.
    pub fn name(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..end]
    }
}
