//! Read-only FAT32 driver over a [`BlockDevice`].
//!
//! Only the root directory is searched. Names are matched in their on-disk
//! 8.3 form; long file name entries are skipped.

use super::{DirEntry, FileSystem, FsError, OpenFile};
use alloc::string::String;
use alloc::vec::Vec;
use bytemuck::{Pod, Zeroable};
use lodestar_common::FileAttributes;
use lodestar_hal::{BlockDevice, SECTOR_SIZE};

const DIR_ENTRY_SIZE: usize = 32;
const CLUSTER_MASK: u32 = 0x0FFF_FFFF;
const BAD_CLUSTER: u32 = 0x0FFF_FFF7;
const END_OF_CHAIN: u32 = 0x0FFF_FFF8;
const DELETED: u8 = 0xE5;

/// Upper bound on clusters walked in one chain, to survive FAT loops.
const MAX_CHAIN: usize = 1 << 20;

/// On-disk short directory entry.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct RawDirEntry {
    name: [u8; 11],
    attributes: u8,
    nt_reserved: u8,
    create_time_fine: u8,
    create_time: u16,
    create_date: u16,
    access_date: u16,
    cluster_high: u16,
    modify_time: u16,
    modify_date: u16,
    cluster_low: u16,
    size: u32,
}

impl RawDirEntry {
    fn is_end(&self) -> bool {
        self.name[0] == 0
    }

    fn attributes(&self) -> FileAttributes {
        FileAttributes::from_bits_retain(self.attributes)
    }

    /// Whether the entry names a real file or directory.
    fn is_visible(&self) -> bool {
        let attr = self.attributes();
        self.name[0] != DELETED
            && attr != FileAttributes::LONG_NAME
            && !attr.contains(FileAttributes::VOLUME_ID)
    }

    fn first_cluster(&self) -> u32 {
        (u32::from(self.cluster_high) << 16) | u32::from(self.cluster_low)
    }

    /// `NAME.EXT` without padding.
    fn display_name(&self) -> String {
        let base = trim_padding(&self.name[..8]);
        let ext = trim_padding(&self.name[8..]);
        let mut name: String = base.iter().map(|&b| char::from(b)).collect();
        if !ext.is_empty() {
            name.push('.');
            name.extend(ext.iter().map(|&b| char::from(b)));
        }
        name
    }

    fn to_dir_entry(self) -> DirEntry {
        DirEntry {
            name: self.display_name(),
            size: self.size,
            is_directory: self.attributes().contains(FileAttributes::DIRECTORY),
        }
    }
}

fn trim_padding(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &field[..end]
}

/// Converts `NAME.EXT` to the padded 11-byte form stored on disk.
fn short_name(name: &str) -> Option<[u8; 11]> {
    let (base, ext) = name.split_once('.').unwrap_or((name, ""));
    if base.is_empty() || base.len() > 8 || ext.len() > 3 || ext.contains('.') {
        return None;
    }
    let mut out = [b' '; 11];
    for (slot, b) in out.iter_mut().zip(base.bytes()) {
        *slot = b.to_ascii_uppercase();
    }
    for (slot, b) in out[8..].iter_mut().zip(ext.bytes()) {
        *slot = b.to_ascii_uppercase();
    }
    Some(out)
}

fn le16(sector: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([sector[at], sector[at + 1]])
}

fn le32(sector: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([sector[at], sector[at + 1], sector[at + 2], sector[at + 3]])
}

/// Volume layout derived from the BIOS parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    sectors_per_cluster: u32,
    fat_start: u32,
    data_start: u32,
    root_cluster: u32,
}

impl Geometry {
    fn parse(boot: &[u8; SECTOR_SIZE]) -> Result<Self, FsError> {
        if boot[510] != 0x55 || boot[511] != 0xAA {
            return Err(FsError::Unsupported);
        }
        let bytes_per_sector = le16(boot, 11);
        let sectors_per_cluster = boot[13];
        let reserved_sectors = le16(boot, 14);
        let fat_count = boot[16];
        let root_entries = le16(boot, 17);
        let fat_size_16 = le16(boot, 22);
        let fat_size_32 = le32(boot, 36);
        let root_cluster = le32(boot, 44);

        if usize::from(bytes_per_sector) != SECTOR_SIZE
            || !sectors_per_cluster.is_power_of_two()
            || reserved_sectors == 0
            || fat_count == 0
            || root_entries != 0
            || fat_size_16 != 0
            || fat_size_32 == 0
            || root_cluster < 2
        {
            return Err(FsError::Unsupported);
        }

        let fat_start = u32::from(reserved_sectors);
        Ok(Self {
            sectors_per_cluster: u32::from(sectors_per_cluster),
            fat_start,
            data_start: fat_start + u32::from(fat_count) * fat_size_32,
            root_cluster,
        })
    }
}

/// A mounted FAT32 volume.
pub struct Fat32<D> {
    device: D,
    geometry: Geometry,
}

impl<D: BlockDevice> Fat32<D> {
    /// Reads and checks the boot sector of `device`.
    pub fn mount(device: D) -> Result<Self, FsError> {
        let mut boot = [0u8; SECTOR_SIZE];
        device.read_sector(0, &mut boot)?;
        let geometry = Geometry::parse(&boot)?;
        log::info!(
            "fat32: {} sectors/cluster, data at sector {}, root cluster {}",
            geometry.sectors_per_cluster,
            geometry.data_start,
            geometry.root_cluster
        );
        Ok(Self { device, geometry })
    }

    fn cluster_bytes(&self) -> u32 {
        self.geometry.sectors_per_cluster * SECTOR_SIZE as u32
    }

    fn cluster_lba(&self, cluster: u32) -> Result<u32, FsError> {
        let index = cluster.checked_sub(2).ok_or(FsError::Corrupt)?;
        index
            .checked_mul(self.geometry.sectors_per_cluster)
            .and_then(|off| off.checked_add(self.geometry.data_start))
            .ok_or(FsError::Corrupt)
    }

    fn read_sector(&self, lba: u32) -> Result<[u8; SECTOR_SIZE], FsError> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(lba, &mut sector)?;
        Ok(sector)
    }

    /// Follows the FAT from `cluster`; `None` at the end of the chain.
    fn next_cluster(&self, cluster: u32) -> Result<Option<u32>, FsError> {
        if cluster < 2 {
            return Err(FsError::Corrupt);
        }
        let offset = cluster as usize * 4;
        let lba = self.geometry.fat_start + (offset / SECTOR_SIZE) as u32;
        let sector = self.read_sector(lba)?;
        let next = le32(&sector, offset % SECTOR_SIZE) & CLUSTER_MASK;
        match next {
            n if n >= END_OF_CHAIN => Ok(None),
            n if n < 2 || n == BAD_CLUSTER => Err(FsError::Corrupt),
            n => Ok(Some(n)),
        }
    }

    /// Calls `visit` on every entry of the root directory until it returns
    /// `false` or the end marker is reached.
    fn walk_root(&self, mut visit: impl FnMut(&RawDirEntry) -> bool) -> Result<(), FsError> {
        let mut cluster = self.geometry.root_cluster;
        for _ in 0..MAX_CHAIN {
            let lba = self.cluster_lba(cluster)?;
            for i in 0..self.geometry.sectors_per_cluster {
                let sector = self.read_sector(lba + i)?;
                for raw in sector.chunks_exact(DIR_ENTRY_SIZE) {
                    let entry: RawDirEntry = bytemuck::pod_read_unaligned(raw);
                    if entry.is_end() || !visit(&entry) {
                        return Ok(());
                    }
                }
            }
            match self.next_cluster(cluster)? {
                Some(next) => cluster = next,
                None => return Ok(()),
            }
        }
        Err(FsError::Corrupt)
    }
}

impl<D: BlockDevice> FileSystem for Fat32<D> {
    fn open(&self, name: &str) -> Result<OpenFile, FsError> {
        let wanted = short_name(name).ok_or(FsError::NotFound)?;
        let mut found = None;
        self.walk_root(|entry| {
            if entry.is_visible() && entry.name == wanted {
                found = Some(*entry);
                return false;
            }
            true
        })?;
        let entry = found.ok_or(FsError::NotFound)?;
        Ok(OpenFile::new(
            entry.first_cluster(),
            entry.size,
            entry.attributes(),
        ))
    }

    fn read(&self, file: &mut OpenFile, buf: &mut [u8]) -> Result<usize, FsError> {
        if !file.valid {
            return Err(FsError::InvalidHandle);
        }
        let cluster_bytes = self.cluster_bytes();
        let mut done = 0;
        while done < buf.len() && file.position < file.size {
            let offset = file.position % cluster_bytes;
            let lba = self.cluster_lba(file.cluster)? + offset / SECTOR_SIZE as u32;
            let sector = self.read_sector(lba)?;

            let within = offset as usize % SECTOR_SIZE;
            let n = (SECTOR_SIZE - within)
                .min(buf.len() - done)
                .min(file.remaining() as usize);
            buf[done..done + n].copy_from_slice(&sector[within..within + n]);
            done += n;
            file.position += n as u32;

            if file.position % cluster_bytes == 0 && file.position < file.size {
                file.cluster = self.next_cluster(file.cluster)?.ok_or(FsError::Corrupt)?;
            }
        }
        Ok(done)
    }

    fn list(&self, max: usize) -> Result<Vec<DirEntry>, FsError> {
        let mut entries = Vec::new();
        if max == 0 {
            return Ok(entries);
        }
        self.walk_root(|entry| {
            if entry.is_visible() {
                entries.push(entry.to_dir_entry());
            }
            entries.len() < max
        })?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_hal::BlockError;

    /// A disk image held in memory.
    struct MemDisk(Vec<u8>);

    impl BlockDevice for MemDisk {
        fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), BlockError> {
            let start = lba as usize * SECTOR_SIZE;
            let sector = self
                .0
                .get(start..start + SECTOR_SIZE)
                .ok_or(BlockError::OutOfRange)?;
            buf.copy_from_slice(sector);
            Ok(())
        }
    }

    // One sector per cluster. Sector 0 boot, 1 reserved, 2 FAT, 3.. data
    // starting at cluster 2.
    const DATA_START: usize = 3;
    const EOC: u32 = 0x0FFF_FFFF;

    struct Volume {
        image: Vec<u8>,
        root_slots: Vec<(u32, usize)>,
    }

    impl Volume {
        fn new(sectors: usize) -> Self {
            let mut image = vec![0u8; sectors * SECTOR_SIZE];
            image[11..13].copy_from_slice(&512u16.to_le_bytes());
            image[13] = 1; // sectors per cluster
            image[14..16].copy_from_slice(&2u16.to_le_bytes()); // reserved
            image[16] = 1; // FAT count
            image[36..40].copy_from_slice(&1u32.to_le_bytes()); // FAT size
            image[44..48].copy_from_slice(&2u32.to_le_bytes()); // root cluster
            image[510] = 0x55;
            image[511] = 0xAA;
            let mut volume = Self {
                image,
                root_slots: Vec::new(),
            };
            volume.set_fat(0, 0x0FFF_FFF8);
            volume.set_fat(1, EOC);
            volume.set_fat(2, EOC);
            volume.root_slots = (0..16).map(|i| (2, i)).collect();
            volume
        }

        fn set_fat(&mut self, cluster: u32, value: u32) {
            let at = 2 * SECTOR_SIZE + cluster as usize * 4;
            self.image[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn cluster_mut(&mut self, cluster: u32) -> &mut [u8] {
            let start = (DATA_START + cluster as usize - 2) * SECTOR_SIZE;
            &mut self.image[start..start + SECTOR_SIZE]
        }

        /// Extends the root directory chain with another cluster.
        fn grow_root(&mut self, from: u32, to: u32) {
            self.set_fat(from, to);
            self.set_fat(to, EOC);
            self.root_slots.extend((0..16).map(|i| (to, i)));
        }

        fn add_entry(&mut self, slot: usize, name: &[u8; 11], attr: u8, cluster: u32, size: u32) {
            let (root_cluster, index) = self.root_slots[slot];
            let mut raw = RawDirEntry::zeroed();
            raw.name = *name;
            raw.attributes = attr;
            raw.cluster_high = (cluster >> 16) as u16;
            raw.cluster_low = cluster as u16;
            raw.size = size;
            let at = index * DIR_ENTRY_SIZE;
            self.cluster_mut(root_cluster)[at..at + DIR_ENTRY_SIZE]
                .copy_from_slice(bytemuck::bytes_of(&raw));
        }

        fn mount(self) -> Fat32<MemDisk> {
            Fat32::mount(MemDisk(self.image)).unwrap()
        }
    }

    fn sample() -> Fat32<MemDisk> {
        let mut v = Volume::new(16);
        v.add_entry(0, b"LODESTAR   ", 0x08, 0, 0);
        v.add_entry(1, b"HELLO   TXT", 0x20, 3, 700);
        v.add_entry(2, b"\xE5LD     TXT", 0x20, 0, 10);
        v.add_entry(3, b"Ahello     ", 0x0F, 0, 0);
        v.add_entry(4, b"DOCS       ", 0x10, 5, 0);
        v.add_entry(5, b"EMPTY      ", 0x20, 0, 0);
        v.set_fat(3, 4);
        v.set_fat(4, EOC);
        v.set_fat(5, EOC);
        for (i, b) in v.cluster_mut(3).iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        for (i, b) in v.cluster_mut(4).iter_mut().enumerate() {
            *b = ((i + 512) % 251) as u8;
        }
        v.mount()
    }

    fn expected(range: core::ops::Range<usize>) -> Vec<u8> {
        range.map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_short_names() {
        assert_eq!(short_name("HELLO.TXT"), Some(*b"HELLO   TXT"));
        assert_eq!(short_name("shell"), Some(*b"SHELL      "));
        assert_eq!(short_name("TOOLONGNAME.TXT"), None);
        assert_eq!(short_name("A.TEXT"), None);
        assert_eq!(short_name(".TXT"), None);
        assert_eq!(short_name("A.B.C"), None);
    }

    #[test]
    fn test_mount_rejects_non_fat32() {
        let mut v = Volume::new(8);
        v.image[22] = 1; // FAT16 size field
        assert_eq!(Fat32::mount(MemDisk(v.image)).err(), Some(FsError::Unsupported));

        let mut v = Volume::new(8);
        v.image[511] = 0;
        assert_eq!(Fat32::mount(MemDisk(v.image)).err(), Some(FsError::Unsupported));

        assert_eq!(
            Fat32::mount(MemDisk(Vec::new())).err(),
            Some(FsError::Device(BlockError::OutOfRange))
        );
    }

    #[test]
    fn test_open_and_read_across_clusters() {
        let fs = sample();
        let mut file = fs.open("HELLO.TXT").unwrap();
        assert_eq!(file.size, 700);
        assert_eq!(file.first_cluster, 3);

        let mut buf = vec![0u8; 300];
        assert_eq!(fs.read(&mut file, &mut buf), Ok(300));
        assert_eq!(buf, expected(0..300));
        assert_eq!(fs.read(&mut file, &mut buf), Ok(300));
        assert_eq!(buf, expected(300..600));
        assert_eq!(file.cluster, 4);
        assert_eq!(fs.read(&mut file, &mut buf), Ok(100));
        assert_eq!(&buf[..100], &expected(600..700)[..]);
        assert_eq!(fs.read(&mut file, &mut buf), Ok(0));
    }

    #[test]
    fn test_read_exactly_one_cluster() {
        let fs = sample();
        let mut file = fs.open("HELLO.TXT").unwrap();
        let mut buf = vec![0u8; 512];
        assert_eq!(fs.read(&mut file, &mut buf), Ok(512));
        assert_eq!(file.cluster, 4);
        assert_eq!(fs.read(&mut file, &mut buf), Ok(188));
    }

    #[test]
    fn test_skipped_entries_are_not_found() {
        let fs = sample();
        assert_eq!(fs.open("LODESTAR"), Err(FsError::NotFound));
        assert_eq!(fs.open("OLD.TXT"), Err(FsError::NotFound));
        assert_eq!(fs.open("MISSING.ELF"), Err(FsError::NotFound));
        assert!(fs.open("EMPTY").is_ok());
    }

    #[test]
    fn test_list_root() {
        let fs = sample();
        let entries = fs.list(16).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["HELLO.TXT", "DOCS", "EMPTY"]);
        assert!(entries[1].is_directory);
        assert_eq!(entries[0].size, 700);

        assert_eq!(fs.list(2).unwrap().len(), 2);
        assert!(fs.list(0).unwrap().is_empty());
    }

    #[test]
    fn test_root_spanning_clusters() {
        let mut v = Volume::new(16);
        v.grow_root(2, 6);
        for slot in 0..20 {
            let name = format!("FILE{:<4}BIN", slot);
            let mut raw = [b' '; 11];
            raw.copy_from_slice(name.as_bytes());
            v.add_entry(slot, &raw, 0x20, 0, slot as u32);
        }
        let fs = v.mount();
        assert_eq!(fs.list(64).unwrap().len(), 20);
        let file = fs.open("FILE19.BIN").unwrap();
        assert_eq!(file.size, 19);
    }

    #[test]
    fn test_broken_chain_is_corrupt() {
        let mut v = Volume::new(16);
        v.add_entry(0, b"BROKEN  BIN", 0x20, 3, 600);
        v.set_fat(3, 0);
        let fs = v.mount();
        let mut file = fs.open("BROKEN.BIN").unwrap();
        let mut buf = vec![0u8; 600];
        assert_eq!(fs.read(&mut file, &mut buf), Err(FsError::Corrupt));
    }
}
