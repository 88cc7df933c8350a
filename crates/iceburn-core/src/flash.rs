//! SPI NOR flash command protocol
//!
//! One method per flash command, each following the same shape:
//! assert chip select, send the opcode (plus 24-bit big-endian address
//! for addressed commands) as a write-only transaction, exchange for
//! the reply on read-type commands, then deassert chip select.
//!
//! Exactly the command subset the iCE40-class NOR parts need; this is
//! deliberately not a general SPI flash driver.

use crate::error::{Error, Result};
use crate::mpsse::MpsseLink;
use crate::transport::Transport;

/// Standard JEDEC opcodes used by this flash family
pub mod opcodes {
    /// Write Enable - required before any write/erase operation
    pub const WREN: u8 = 0x06;
    /// Read Status Register 1
    pub const RDSR: u8 = 0x05;
    /// Read JEDEC ID
    pub const RDID: u8 = 0x9F;
    /// Read Data
    pub const READ: u8 = 0x03;
    /// Page Program
    pub const PP: u8 = 0x02;
    /// Subsector Erase 4 KiB
    pub const SE_20: u8 = 0x20;
    /// Sector Erase 64 KiB
    pub const BE_D8: u8 = 0xD8;
    /// Chip Erase
    pub const CE_C7: u8 = 0xC7;
    /// Release from Deep Power Down
    pub const RDP: u8 = 0xAB;
    /// Deep Power Down
    pub const DP: u8 = 0xB9;

    /// Status Register 1: Write In Progress / Busy
    pub const SR1_WIP: u8 = 0x01;
}

/// Hardware program-page size in bytes
pub const PAGE_SIZE: usize = 256;

/// Subsector erase granularity (opcode 0x20)
pub const SUBSECTOR_SIZE: usize = 4096;

/// Sector erase granularity (opcode 0xD8)
pub const SECTOR_SIZE: usize = 65536;

/// Length of the JEDEC ID payload read by `read_id`
pub const ID_LEN: usize = 20;

/// Interval between busy polls in `wait_ready`
const BUSY_POLL_INTERVAL_US: u32 = 1000;

/// Poll budget for `wait_ready`: 120 000 polls at 1 ms is two minutes,
/// comfortably above the chip-erase worst case.
const MAX_BUSY_POLLS: u32 = 120_000;

/// Encode a 24-bit big-endian flash address.
fn addr_bytes(addr: u32) -> [u8; 3] {
    [(addr >> 16) as u8, (addr >> 8) as u8, addr as u8]
}

/// Flash command protocol over the MPSSE framer
///
/// Borrows the link for the duration of the flash phase of a session.
pub struct Flash<'a, T: Transport> {
    link: &'a mut MpsseLink<T>,
}

impl<'a, T: Transport> Flash<'a, T> {
    /// Attach the protocol to an initialized link.
    pub fn new(link: &'a mut MpsseLink<T>) -> Self {
        Flash { link }
    }

    /// Assert chip select, keeping the FPGA held in reset.
    fn select(&mut self) -> Result<()> {
        self.link.set_pins(true, true)
    }

    /// Deassert chip select, keeping the FPGA held in reset.
    fn deselect(&mut self) -> Result<()> {
        self.link.set_pins(false, true)
    }

    /// Read the 20-byte JEDEC ID payload (opcode 9F).
    pub fn read_id(&mut self) -> Result<[u8; ID_LEN]> {
        let mut buf = [0u8; ID_LEN + 1];
        buf[0] = opcodes::RDID;
        self.select()?;
        self.link.exchange(&mut buf)?;
        self.deselect()?;
        let mut id = [0u8; ID_LEN];
        id.copy_from_slice(&buf[1..]);
        Ok(id)
    }

    /// Release the flash from deep power down (opcode AB).
    pub fn power_up(&mut self) -> Result<()> {
        self.simple_command(opcodes::RDP)
    }

    /// Put the flash into deep power down (opcode B9).
    pub fn power_down(&mut self) -> Result<()> {
        self.simple_command(opcodes::DP)
    }

    /// Set the write-enable latch (opcode 06).
    ///
    /// Must precede every erase and program command; the flash drops
    /// the latch again after each one completes.
    pub fn write_enable(&mut self) -> Result<()> {
        log::trace!("write enable");
        self.simple_command(opcodes::WREN)
    }

    /// Erase the entire chip (opcode C7).
    pub fn bulk_erase(&mut self) -> Result<()> {
        log::info!("bulk erase..");
        self.simple_command(opcodes::CE_C7)
    }

    /// Erase the 64 KiB sector containing `addr` (opcode D8).
    pub fn sector_erase_64k(&mut self, addr: u32) -> Result<()> {
        log::info!("erase 64 KiB sector at 0x{:06X}..", addr);
        self.addressed_command(opcodes::BE_D8, addr)
    }

    /// Erase the 4 KiB subsector containing `addr` (opcode 20).
    pub fn subsector_erase_4k(&mut self, addr: u32) -> Result<()> {
        log::info!("erase 4 KiB subsector at 0x{:06X}..", addr);
        self.addressed_command(opcodes::SE_20, addr)
    }

    /// Program up to one page at `addr` (opcode 02).
    ///
    /// The payload must stay within the 256-byte page containing
    /// `addr`; the flash would silently wrap otherwise.
    pub fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() || (addr as usize % PAGE_SIZE) + data.len() > PAGE_SIZE {
            return Err(Error::PageOverflow {
                addr,
                len: data.len(),
            });
        }
        log::trace!("prog 0x{:06X} +0x{:03X}..", addr, data.len());

        let a = addr_bytes(addr);
        self.select()?;
        self.link.send_only(&[opcodes::PP, a[0], a[1], a[2]])?;
        self.link.send_only(data)?;
        self.deselect()
    }

    /// Read `buf.len()` bytes starting at `addr` (opcode 03).
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        log::trace!("read 0x{:06X} +0x{:03X}..", addr, buf.len());

        let a = addr_bytes(addr);
        self.select()?;
        self.link.send_only(&[opcodes::READ, a[0], a[1], a[2]])?;
        buf.fill(0);
        self.link.exchange(buf)?;
        self.deselect()
    }

    /// Read status register 1 (opcode 05).
    pub fn read_status(&mut self) -> Result<u8> {
        let mut buf = [opcodes::RDSR, 0x00];
        self.select()?;
        self.link.exchange(&mut buf)?;
        self.deselect()?;
        Ok(buf[1])
    }

    /// Poll the status register until the write-in-progress bit clears.
    ///
    /// Mandatory after every erase and program command: the flash
    /// silently ignores new commands while busy, so skipping this wait
    /// corrupts data rather than merely slowing things down. Polls at
    /// a fixed 1 ms interval, bounded by `MAX_BUSY_POLLS`.
    pub fn wait_ready(&mut self) -> Result<()> {
        for _ in 0..MAX_BUSY_POLLS {
            if self.read_status()? & opcodes::SR1_WIP == 0 {
                return Ok(());
            }
            self.link.delay_us(BUSY_POLL_INTERVAL_US);
        }
        Err(Error::BusyTimeout {
            polls: MAX_BUSY_POLLS,
        })
    }

    /// Single-opcode command with no address and no reply.
    fn simple_command(&mut self, opcode: u8) -> Result<()> {
        let mut buf = [opcode];
        self.select()?;
        self.link.exchange(&mut buf)?;
        self.deselect()
    }

    /// Opcode plus 24-bit address, no payload and no reply.
    fn addressed_command(&mut self, opcode: u8, addr: u32) -> Result<()> {
        let a = addr_bytes(addr);
        self.select()?;
        self.link.send_only(&[opcode, a[0], a[1], a[2]])?;
        self.deselect()
    }
}
