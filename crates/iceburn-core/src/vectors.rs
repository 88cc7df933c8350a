//! Multi-image boot vector table
//!
//! iCE40 multi-boot images start with a table of 32-byte vector
//! records at flash offset 0. Each record carries a magic pair and a
//! 24-bit big-endian target address pointing at a bitstream image;
//! record 0 is the reset vector the FPGA follows on power up, records
//! 1 through 4 are the cold/warm boot images selectable over the
//! boot pins.
//!
//! Edits happen in a 4 KiB shadow of subsector 0: swap only touches
//! the 3 target bytes of each record, so commit rewrites an image
//! whose every other byte is exactly what was read back.

use std::str;

use crate::error::{Error, Result};
use crate::flash::{Flash, PAGE_SIZE, SUBSECTOR_SIZE};
use crate::transport::Transport;

/// Magic pair opening every vector record
pub const MAGIC: [u8; 2] = [0x7E, 0xAA];

/// Size of one vector record in bytes
pub const RECORD_SIZE: usize = 0x20;

/// Upper bound on records scanned before giving up
pub const MAX_RECORDS: usize = 50;

/// Offset of the 24-bit target address within a record
const TARGET_OFFSET: usize = 9;

/// Length of the comment field stored ahead of each image
const COMMENT_LEN: usize = 25;

/// One parsed boot vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootVector {
    /// Position in the table
    pub index: usize,
    /// Flash address of the image this vector points at
    pub target: u32,
    /// Printable comment found ahead of the image, if any
    pub comment: Option<String>,
}

impl BootVector {
    /// Human-readable role of this table slot.
    pub fn role(&self) -> String {
        if self.index == 0 {
            "reset".to_string()
        } else {
            format!("boot {}", self.index - 1)
        }
    }
}

/// Shadow copy of the vector table subsector
pub struct BootTable {
    shadow: Vec<u8>,
    records: Vec<BootVector>,
}

impl BootTable {
    /// Parse vector records out of a copy of subsector 0.
    ///
    /// Scans consecutive 32-byte records and stops at the first one
    /// whose magic pair does not match; a blank or corrupt table
    /// simply yields no records.
    pub fn parse(shadow: Vec<u8>) -> Self {
        let mut records = Vec::new();
        for index in 0..MAX_RECORDS {
            let base = index * RECORD_SIZE;
            if base + RECORD_SIZE > shadow.len() {
                break;
            }
            let rec = &shadow[base..base + RECORD_SIZE];
            if rec[0..2] != MAGIC {
                break;
            }
            let target = (u32::from(rec[TARGET_OFFSET]) << 16)
                | (u32::from(rec[TARGET_OFFSET + 1]) << 8)
                | u32::from(rec[TARGET_OFFSET + 2]);
            records.push(BootVector {
                index,
                target,
                comment: None,
            });
        }
        BootTable { shadow, records }
    }

    /// Read subsector 0 from flash, parse it and fetch the comment
    /// stored ahead of each image.
    ///
    /// Comments are best effort: an unreadable or non-printable
    /// comment leaves the field empty rather than failing the scan.
    pub fn load<T: Transport>(flash: &mut Flash<'_, T>) -> Result<Self> {
        let mut shadow = vec![0u8; SUBSECTOR_SIZE];
        flash.read(0, &mut shadow)?;
        let mut table = Self::parse(shadow);
        for rec in &mut table.records {
            rec.comment = read_comment(flash, rec.target);
        }
        Ok(table)
    }

    /// The parsed vectors, in table order.
    pub fn records(&self) -> &[BootVector] {
        &self.records
    }

    /// The shadow buffer as it would be written back.
    pub fn shadow(&self) -> &[u8] {
        &self.shadow
    }

    /// Exchange the targets of records `a` and `b` in the shadow.
    ///
    /// Only the 3 address bytes of each record move; magic, bank
    /// settings and padding stay where the scan found them. Indices
    /// are validated against the records the scan actually produced.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        let count = self.records.len();
        for &idx in &[a, b] {
            if idx >= count {
                return Err(Error::VectorOutOfRange { index: idx, count });
            }
        }
        if a == b {
            return Ok(());
        }
        let off_a = a * RECORD_SIZE + TARGET_OFFSET;
        let off_b = b * RECORD_SIZE + TARGET_OFFSET;
        for i in 0..3 {
            self.shadow.swap(off_a + i, off_b + i);
        }
        // Targets and their comments travel together; the slot index
        // stays with the table position.
        self.records.swap(a, b);
        self.records[a].index = a;
        self.records[b].index = b;
        log::info!("swapped boot vectors {} and {}", a, b);
        Ok(())
    }

    /// Write the shadow back: erase subsector 0, then reprogram it one
    /// page at a time with the mandatory busy wait after each step.
    pub fn commit<T: Transport>(&self, flash: &mut Flash<'_, T>) -> Result<()> {
        log::info!("rewriting boot vector table..");
        flash.write_enable()?;
        flash.subsector_erase_4k(0)?;
        flash.wait_ready()?;
        for (i, page) in self.shadow.chunks(PAGE_SIZE).enumerate() {
            flash.write_enable()?;
            flash.page_program((i * PAGE_SIZE) as u32, page)?;
            flash.wait_ready()?;
        }
        Ok(())
    }
}

/// Fetch the printable comment stored 2 bytes past an image target.
fn read_comment<T: Transport>(flash: &mut Flash<'_, T>, target: u32) -> Option<String> {
    let mut buf = [0u8; COMMENT_LEN];
    if flash.read(target + 2, &mut buf).is_err() {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0x00).unwrap_or(COMMENT_LEN);
    let text = str::from_utf8(&buf[..end]).ok()?;
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return None;
    }
    Some(text.to_string())
}
