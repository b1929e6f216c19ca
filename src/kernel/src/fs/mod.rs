//! Filesystem Traits and Types.
//!
//! A single flat namespace of 8.3 names. Lookups are case-insensitive in the
//! sense that callers uppercase names first and every filesystem stores names
//! in uppercase.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use lodestar_common::{DirInfo, FileAttributes};
use lodestar_hal::BlockError;

pub mod fat32;
pub mod ramfs;

pub use fat32::Fat32;
pub use ramfs::RamFs;

/// Error type for filesystem operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// No entry with that name.
    NotFound,
    /// The handle is closed or belongs to another filesystem.
    InvalidHandle,
    /// The volume is not a FAT32 volume this driver can read.
    Unsupported,
    /// On-disk structures are inconsistent.
    Corrupt,
    /// The block device failed.
    Device(BlockError),
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::NotFound => write!(f, "file not found"),
            FsError::InvalidHandle => write!(f, "invalid file handle"),
            FsError::Unsupported => write!(f, "unsupported volume"),
            FsError::Corrupt => write!(f, "filesystem corrupt"),
            FsError::Device(e) => write!(f, "device error: {}", e),
        }
    }
}

impl From<BlockError> for FsError {
    fn from(e: BlockError) -> Self {
        FsError::Device(e)
    }
}

/// Read cursor over one file.
///
/// `cluster` always names the cluster holding byte `position`, so reads
/// continue without walking the chain from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    /// First cluster of the file, or the file's index for RAM files.
    pub first_cluster: u32,
    /// Cluster holding `position`.
    pub cluster: u32,
    /// Total size in bytes.
    pub size: u32,
    /// Next byte to read.
    pub position: u32,
    /// Directory entry attributes.
    pub attributes: FileAttributes,
    /// Cleared by `close`.
    pub valid: bool,
}

impl OpenFile {
    /// A fresh cursor at the start of a file.
    pub fn new(first_cluster: u32, size: u32, attributes: FileAttributes) -> Self {
        Self {
            first_cluster,
            cluster: first_cluster,
            size,
            position: 0,
            attributes,
            valid: true,
        }
    }

    /// Bytes left before end of file.
    pub fn remaining(&self) -> u32 {
        self.size.saturating_sub(self.position)
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// `NAME.EXT`
    pub name: String,
    /// Size in bytes.
    pub size: u32,
    /// Whether the entry is a directory.
    pub is_directory: bool,
}

impl DirEntry {
    /// The record handed to guest programs.
    pub fn to_info(&self) -> DirInfo {
        DirInfo::new(&self.name, self.size, self.is_directory)
    }
}

/// Trait for a filesystem.
pub trait FileSystem {
    /// Open a file by its uppercase name.
    fn open(&self, name: &str) -> Result<OpenFile, FsError>;

    /// Read from `file` at its cursor, advancing it.
    ///
    /// Returns 0 at end of file.
    fn read(&self, file: &mut OpenFile, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Close `file`.
    fn close(&self, file: &mut OpenFile) {
        file.valid = false;
    }

    /// List up to `max` entries of the root directory.
    fn list(&self, max: usize) -> Result<Vec<DirEntry>, FsError>;
}
