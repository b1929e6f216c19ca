//! ELF validation and segment loading.
//!
//! Programs are 32-bit little-endian images for the x86-64 CPU (x32), either
//! `ET_EXEC` or `ET_DYN`. Nothing is written to guest memory until the whole
//! image has been validated.

use crate::memory::{GuestMemory, MemoryError};
use alloc::vec::Vec;
use core::fmt;
use goblin::elf::header::{
    EI_CLASS, EI_DATA, ELFCLASS32, ELFDATA2LSB, ELFMAG, EM_X86_64, ET_DYN, ET_EXEC, SELFMAG,
};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;

/// Offset just past `e_machine`, enough for every identification check.
const IDENT_LEN: usize = 20;

/// Why an image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The first four bytes are not `\x7fELF`.
    BadMagic,
    /// Not a 32-bit image.
    UnsupportedClass(u8),
    /// Not little-endian.
    UnsupportedEncoding(u8),
    /// Built for another CPU.
    UnsupportedMachine(u16),
    /// Neither an executable nor a position-independent object.
    UnsupportedType(u16),
    /// The buffer ends inside the headers.
    Truncated,
    /// The headers could not be parsed.
    Malformed,
    /// Segment `n` points outside the file or outside 32-bit memory.
    SegmentOutOfBounds(usize),
    /// Writing a segment failed.
    Memory(MemoryError),
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElfError::BadMagic => write!(f, "bad ELF magic"),
            ElfError::UnsupportedClass(c) => write!(f, "unsupported ELF class {}", c),
            ElfError::UnsupportedEncoding(d) => write!(f, "unsupported byte order {}", d),
            ElfError::UnsupportedMachine(m) => write!(f, "unsupported machine {:#x}", m),
            ElfError::UnsupportedType(t) => write!(f, "unsupported object type {}", t),
            ElfError::Truncated => write!(f, "truncated ELF header"),
            ElfError::Malformed => write!(f, "malformed ELF headers"),
            ElfError::SegmentOutOfBounds(n) => write!(f, "segment {} out of bounds", n),
            ElfError::Memory(e) => write!(f, "segment load failed: {}", e),
        }
    }
}

impl From<MemoryError> for ElfError {
    fn from(e: MemoryError) -> Self {
        ElfError::Memory(e)
    }
}

/// Object type of a validated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// `ET_EXEC`
    Executable,
    /// `ET_DYN`
    PositionIndependent,
}

/// A loadable segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Offset of the segment's bytes in the file.
    pub offset: u32,
    /// Address the segment is copied to.
    pub vaddr: u32,
    /// Bytes taken from the file.
    pub file_size: u32,
    /// Bytes occupied in memory; the tail past `file_size` is zeroed.
    pub mem_size: u32,
}

/// A validated executable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfImage {
    /// Executable or position-independent.
    pub kind: ObjectKind,
    /// `e_machine`, always `EM_X86_64` once validated.
    pub machine: u16,
    /// Entry point address.
    pub entry: u32,
    /// `PT_LOAD` segments in header order.
    pub segments: Vec<Segment>,
}

/// Cheap check of the four magic bytes.
pub fn has_elf_magic(bytes: &[u8]) -> bool {
    bytes.len() >= SELFMAG && &bytes[..SELFMAG] == ELFMAG
}

/// Validates `bytes` without touching memory.
pub fn validate(bytes: &[u8]) -> Result<ElfImage, ElfError> {
    if !has_elf_magic(bytes) {
        return Err(ElfError::BadMagic);
    }
    if bytes.len() < IDENT_LEN {
        return Err(ElfError::Truncated);
    }
    if bytes[EI_CLASS] != ELFCLASS32 {
        return Err(ElfError::UnsupportedClass(bytes[EI_CLASS]));
    }
    if bytes[EI_DATA] != ELFDATA2LSB {
        return Err(ElfError::UnsupportedEncoding(bytes[EI_DATA]));
    }
    let machine = u16::from_le_bytes([bytes[18], bytes[19]]);
    if machine != EM_X86_64 {
        return Err(ElfError::UnsupportedMachine(machine));
    }
    let kind = match u16::from_le_bytes([bytes[16], bytes[17]]) {
        ET_EXEC => ObjectKind::Executable,
        ET_DYN => ObjectKind::PositionIndependent,
        other => return Err(ElfError::UnsupportedType(other)),
    };

    let elf = Elf::parse(bytes).map_err(|e| {
        log::debug!("elf parse: {}", e);
        ElfError::Malformed
    })?;

    let mut segments = Vec::new();
    for (index, ph) in elf.program_headers.iter().enumerate() {
        if ph.p_type != PT_LOAD {
            continue;
        }
        let out = ElfError::SegmentOutOfBounds(index);
        let file_end = ph.p_offset.checked_add(ph.p_filesz).ok_or(out)?;
        let mem_end = ph.p_vaddr.checked_add(ph.p_memsz).ok_or(out)?;
        if file_end > bytes.len() as u64 || mem_end > u64::from(u32::MAX) + 1 {
            return Err(out);
        }
        if ph.p_memsz < ph.p_filesz {
            return Err(ElfError::Malformed);
        }
        segments.push(Segment {
            offset: ph.p_offset as u32,
            vaddr: ph.p_vaddr as u32,
            file_size: ph.p_filesz as u32,
            mem_size: ph.p_memsz as u32,
        });
    }

    Ok(ElfImage {
        kind,
        machine,
        entry: elf.entry as u32,
        segments,
    })
}

/// Copies every segment of `image` into `mem` and returns the entry point.
///
/// Target addresses are not checked against anything; the caller must make
/// sure they do not overlap live kernel state. `Kernel::exec` confines every
/// segment to the load window before calling this.
pub fn load(image: &ElfImage, bytes: &[u8], mem: &dyn GuestMemory) -> Result<u32, ElfError> {
    for (index, seg) in image.segments.iter().enumerate() {
        if seg.file_size > 0 {
            let start = seg.offset as usize;
            let data = bytes
                .get(start..start + seg.file_size as usize)
                .ok_or(ElfError::SegmentOutOfBounds(index))?;
            mem.write(seg.vaddr, data)?;
        }
        if seg.mem_size > seg.file_size {
            mem.fill(
                seg.vaddr + seg.file_size,
                (seg.mem_size - seg.file_size) as usize,
                0,
            )?;
        }
    }
    Ok(image.entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BufferMemory;
    use crate::testutil::ImageBuilder;
    use goblin::elf::header::{ELFCLASS64, ELFDATA2MSB, EM_386, ET_REL};

    const BASE: u32 = 0x0080_0000;

    fn poisoned() -> BufferMemory {
        let mem = BufferMemory::new(BASE, 0x1000);
        mem.fill(BASE, 0x1000, 0xcc).unwrap();
        mem
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut image = ImageBuilder::new(BASE).segment(BASE, &[1, 2, 3], 3).build();
        image[0] = 0x7e;
        assert_eq!(validate(&image), Err(ElfError::BadMagic));
        assert_eq!(validate(b"MZ\x90\x00 not an elf"), Err(ElfError::BadMagic));
        assert_eq!(validate(&[]), Err(ElfError::BadMagic));
        assert!(!has_elf_magic(b"\x7fEL"));
    }

    #[test]
    fn test_rejects_wrong_identity() {
        let image = ImageBuilder::new(BASE).class(ELFCLASS64).build();
        assert_eq!(validate(&image), Err(ElfError::UnsupportedClass(ELFCLASS64)));

        let image = ImageBuilder::new(BASE).encoding(ELFDATA2MSB).build();
        assert_eq!(validate(&image), Err(ElfError::UnsupportedEncoding(ELFDATA2MSB)));

        let image = ImageBuilder::new(BASE).machine(EM_386).build();
        assert_eq!(validate(&image), Err(ElfError::UnsupportedMachine(EM_386)));

        let image = ImageBuilder::new(BASE).kind(ET_REL).build();
        assert_eq!(validate(&image), Err(ElfError::UnsupportedType(ET_REL)));
    }

    #[test]
    fn test_accepts_position_independent() {
        let image = ImageBuilder::new(BASE + 4).kind(ET_DYN).segment(BASE, &[0x90; 8], 8).build();
        let parsed = validate(&image).unwrap();
        assert_eq!(parsed.kind, ObjectKind::PositionIndependent);
        assert_eq!(parsed.entry, BASE + 4);
        assert_eq!(parsed.segments.len(), 1);
    }

    #[test]
    fn test_truncated_header() {
        let image = ImageBuilder::new(BASE).build();
        assert_eq!(validate(&image[..12]), Err(ElfError::Truncated));
    }

    #[test]
    fn test_segment_outside_file() {
        let mut image = ImageBuilder::new(BASE).segment(BASE, &[1; 16], 16).build();
        let len = image.len();
        image.truncate(len - 8);
        assert_eq!(validate(&image), Err(ElfError::SegmentOutOfBounds(0)));
    }

    #[test]
    fn test_rejection_leaves_memory_untouched() {
        let mem = poisoned();
        let before = mem.snapshot(BASE, 0x1000).unwrap();
        let image = ImageBuilder::new(BASE).machine(EM_386).segment(BASE, &[0; 64], 64).build();
        assert!(validate(&image).is_err());
        assert_eq!(mem.snapshot(BASE, 0x1000).unwrap(), before);
    }

    #[test]
    fn test_segment_copy_and_zero_fill() {
        let mem = poisoned();
        let data: Vec<u8> = (1..=10).collect();
        let image = ImageBuilder::new(BASE)
            .segment(BASE + 0x100, &data, 16)
            .build();

        let parsed = validate(&image).unwrap();
        let entry = load(&parsed, &image, &mem).unwrap();
        assert_eq!(entry, BASE);

        let loaded = mem.snapshot(BASE + 0x100, 17).unwrap();
        assert_eq!(&loaded[..10], &data[..]);
        assert_eq!(&loaded[10..16], &[0; 6]);
        // one past mem_size is untouched
        assert_eq!(loaded[16], 0xcc);
    }

    #[test]
    fn test_non_load_segments_are_skipped() {
        let mem = poisoned();
        let image = ImageBuilder::new(BASE)
            .note(&[9; 4])
            .segment(BASE, &[7; 4], 4)
            .build();
        let parsed = validate(&image).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        load(&parsed, &image, &mem).unwrap();
        assert_eq!(mem.snapshot(BASE, 5).unwrap(), vec![7, 7, 7, 7, 0xcc]);
    }

    #[test]
    fn test_bss_only_segment() {
        let mem = poisoned();
        let image = ImageBuilder::new(BASE).segment(BASE + 0x200, &[], 8).build();
        let parsed = validate(&image).unwrap();
        load(&parsed, &image, &mem).unwrap();
        assert_eq!(mem.snapshot(BASE + 0x1ff, 10).unwrap(), {
            let mut v = vec![0xcc];
            v.extend_from_slice(&[0; 8]);
            v.push(0xcc);
            v
        });
    }
}
