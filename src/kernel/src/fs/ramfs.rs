//! RAM Filesystem implementation.

use super::{DirEntry, FileSystem, FsError, OpenFile};
use alloc::string::String;
use alloc::vec::Vec;
use lodestar_common::FileAttributes;
use spin::Mutex;

struct RamFile {
    name: String,
    content: Vec<u8>,
}

/// A simple in-memory filesystem.
///
/// Files are identified by their index, stored in `OpenFile::first_cluster`.
/// Replacing a file keeps its index so open handles stay valid.
pub struct RamFs {
    files: Mutex<Vec<RamFile>>,
}

impl RamFs {
    /// Create a new empty RAM filesystem.
    pub fn new() -> Self {
        Self {
            files: Mutex::new(Vec::new()),
        }
    }

    /// Add a file, or replace the content of an existing one.
    pub fn add_file(&self, name: &str, content: &[u8]) {
        let name = name.to_ascii_uppercase();
        let mut files = self.files.lock();
        match files.iter_mut().find(|f| f.name == name) {
            Some(file) => file.content = content.to_vec(),
            None => files.push(RamFile {
                name,
                content: content.to_vec(),
            }),
        }
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// Whether the filesystem has no files.
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl Default for RamFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for RamFs {
    fn open(&self, name: &str) -> Result<OpenFile, FsError> {
        let files = self.files.lock();
        let index = files
            .iter()
            .position(|f| f.name == name)
            .ok_or(FsError::NotFound)?;
        Ok(OpenFile::new(
            index as u32,
            files[index].content.len() as u32,
            FileAttributes::ARCHIVE,
        ))
    }

    fn read(&self, file: &mut OpenFile, buffer: &mut [u8]) -> Result<usize, FsError> {
        if !file.valid {
            return Err(FsError::InvalidHandle);
        }
        let files = self.files.lock();
        let content = &files
            .get(file.first_cluster as usize)
            .ok_or(FsError::InvalidHandle)?
            .content;

        let offset = file.position as usize;
        let end = core::cmp::min(file.size as usize, content.len());
        if offset >= end {
            return Ok(0);
        }
        let bytes_read = core::cmp::min(buffer.len(), end - offset);
        buffer[..bytes_read].copy_from_slice(&content[offset..offset + bytes_read]);
        file.position += bytes_read as u32;
        Ok(bytes_read)
    }

    fn list(&self, max: usize) -> Result<Vec<DirEntry>, FsError> {
        Ok(self
            .files
            .lock()
            .iter()
            .take(max)
            .map(|f| DirEntry {
                name: f.name.clone(),
                size: f.content.len() as u32,
                is_directory: false,
            })
            .collect())
    }
}
