//! ATA PIO disk driver.
//!
//! LBA28 reads with polled status, one sector per command. Every wait is
//! bounded so a missing or wedged drive turns into an error instead of a
//! hang.

use lodestar_hal::{BlockDevice, BlockError, SECTOR_SIZE};
use spin::Mutex;
use x86_64::instructions::port::Port;

const REG_DATA: u16 = 0;
const REG_SECTOR_COUNT: u16 = 2;
const REG_LBA_LOW: u16 = 3;
const REG_LBA_MID: u16 = 4;
const REG_LBA_HIGH: u16 = 5;
const REG_DRIVE: u16 = 6;
const REG_STATUS: u16 = 7;
const REG_COMMAND: u16 = 7;

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_IDENTIFY: u8 = 0xEC;

const STATUS_ERR: u8 = 0x01;
const STATUS_DRQ: u8 = 0x08;
const STATUS_DF: u8 = 0x20;
const STATUS_BSY: u8 = 0x80;

/// Upper bound on status polls for a single wait.
const POLL_LIMIT: u32 = 100_000;

/// Serializes access to the task-file registers.
static BUS_LOCK: Mutex<()> = Mutex::new(());

/// One of the two legacy IDE channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    /// I/O ports 0x1F0-0x1F7, control 0x3F6.
    Primary,
    /// I/O ports 0x170-0x177, control 0x376.
    Secondary,
}

impl Bus {
    fn io_base(self) -> u16 {
        match self {
            Bus::Primary => 0x1F0,
            Bus::Secondary => 0x170,
        }
    }

    fn control(self) -> u16 {
        match self {
            Bus::Primary => 0x3F6,
            Bus::Secondary => 0x376,
        }
    }
}

/// Position of a drive on its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// Drive 0.
    Master,
    /// Drive 1.
    Slave,
}

impl Drive {
    fn select_bits(self) -> u8 {
        match self {
            Drive::Master => 0xE0,
            Drive::Slave => 0xF0,
        }
    }
}

/// A drive that answered IDENTIFY.
#[derive(Debug)]
pub struct AtaDrive {
    bus: Bus,
    drive: Drive,
    sectors: u32,
}

impl AtaDrive {
    /// Identifies the drive at `bus`/`drive`.
    ///
    /// Fails with `NoDevice` when nothing, or a packet (ATAPI) device, answers.
    pub fn probe(bus: Bus, drive: Drive) -> Result<Self, BlockError> {
        let _guard = BUS_LOCK.lock();
        let regs = Registers::new(bus);

        // SAFETY: the legacy IDE ports are owned by this driver.
        unsafe {
            regs.select(drive, 0);
            let status = regs.status();
            if status == 0xFF || status == 0 {
                return Err(BlockError::NoDevice);
            }
            regs.write(REG_SECTOR_COUNT, 0);
            regs.write(REG_LBA_LOW, 0);
            regs.write(REG_LBA_MID, 0);
            regs.write(REG_LBA_HIGH, 0);
            regs.write(REG_COMMAND, CMD_IDENTIFY);
            if regs.status() == 0 {
                return Err(BlockError::NoDevice);
            }
            regs.wait_not_busy()?;
            if regs.read(REG_LBA_MID) != 0 || regs.read(REG_LBA_HIGH) != 0 {
                return Err(BlockError::NoDevice);
            }
            regs.wait_data()?;

            let mut identify = [0u16; 256];
            regs.read_words(&mut identify);
            let sectors = u32::from(identify[60]) | u32::from(identify[61]) << 16;
            log::info!("ata: {:?} {:?}, {} sectors", bus, drive, sectors);
            Ok(AtaDrive { bus, drive, sectors })
        }
    }

    /// Number of LBA28-addressable sectors.
    pub fn sectors(&self) -> u32 {
        self.sectors
    }
}

impl BlockDevice for AtaDrive {
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<(), BlockError> {
        if lba >= self.sectors || lba > 0x0FFF_FFFF {
            return Err(BlockError::OutOfRange);
        }
        let _guard = BUS_LOCK.lock();
        let regs = Registers::new(self.bus);

        // SAFETY: the legacy IDE ports are owned by this driver, and the bus
        // lock is held for the whole command.
        unsafe {
            regs.wait_not_busy()?;
            regs.select(self.drive, lba);
            regs.write(REG_SECTOR_COUNT, 1);
            regs.write(REG_LBA_LOW, lba as u8);
            regs.write(REG_LBA_MID, (lba >> 8) as u8);
            regs.write(REG_LBA_HIGH, (lba >> 16) as u8);
            regs.write(REG_COMMAND, CMD_READ_SECTORS);
            regs.wait_data()?;

            let mut words = [0u16; SECTOR_SIZE / 2];
            regs.read_words(&mut words);
            for (chunk, word) in buf.chunks_exact_mut(2).zip(words.iter()) {
                chunk.copy_from_slice(&word.to_le_bytes());
            }
        }
        Ok(())
    }
}

struct Registers {
    base: u16,
    control: u16,
}

impl Registers {
    fn new(bus: Bus) -> Self {
        Self {
            base: bus.io_base(),
            control: bus.control(),
        }
    }

    unsafe fn read(&self, reg: u16) -> u8 {
        Port::<u8>::new(self.base + reg).read()
    }

    unsafe fn write(&self, reg: u16, value: u8) {
        Port::<u8>::new(self.base + reg).write(value)
    }

    unsafe fn status(&self) -> u8 {
        self.read(REG_STATUS)
    }

    /// Reads the alternate status four times, about 400ns.
    unsafe fn delay(&self) {
        let mut alt: Port<u8> = Port::new(self.control);
        for _ in 0..4 {
            alt.read();
        }
    }

    unsafe fn select(&self, drive: Drive, lba: u32) {
        self.write(REG_DRIVE, drive.select_bits() | ((lba >> 24) as u8 & 0x0F));
        self.delay();
    }

    unsafe fn wait_not_busy(&self) -> Result<(), BlockError> {
        for _ in 0..POLL_LIMIT {
            if self.status() & STATUS_BSY == 0 {
                return Ok(());
            }
        }
        Err(BlockError::Timeout)
    }

    unsafe fn wait_data(&self) -> Result<(), BlockError> {
        for _ in 0..POLL_LIMIT {
            let status = self.status();
            if status & STATUS_BSY != 0 {
                continue;
            }
            if status & (STATUS_ERR | STATUS_DF) != 0 {
                return Err(BlockError::DeviceFault);
            }
            if status & STATUS_DRQ != 0 {
                return Ok(());
            }
        }
        Err(BlockError::Timeout)
    }

    unsafe fn read_words(&self, words: &mut [u16]) {
        let mut data: Port<u16> = Port::new(self.base + REG_DATA);
        for word in words.iter_mut() {
            *word = data.read();
        }
    }
}
