//! Programming orchestrator
//!
//! Erase-policy selection, the page-aligned program loop, the verify
//! loop and the read-out loop. All loops stream from/to std I/O
//! handles so the bitstream never has to fit in memory and stdin or
//! stdout can stand in for a file.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::flash::{Flash, PAGE_SIZE, SECTOR_SIZE};
use crate::mpsse::MpsseLink;
use crate::transport::Transport;

/// Chunk size for streaming a bitstream into FPGA SRAM
const SRAM_CHUNK: usize = 4096;

/// Dummy clocks required after the last SRAM configuration byte
const SRAM_TRAILING_CLOCKS: u16 = 49;

/// Erase policy applied before programming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseMode {
    /// Erase the whole chip with a single bulk-erase command.
    Bulk,
    /// Erase the 64 KiB sectors covering the write span.
    Targeted,
    /// Skip erasing; the caller guarantees the destination is blank.
    Skip,
}

/// Progress callbacks for the long-running loops
///
/// All methods default to no-ops; the CLI layers progress bars on top.
pub trait ProgramProgress {
    /// Erase phase started, covering `blocks` sector erases (0 for a
    /// bulk erase).
    fn erase_started(&mut self, _blocks: usize) {}
    /// One sector erase finished.
    fn block_erased(&mut self, _addr: u32) {}
    /// Program phase started.
    fn program_started(&mut self) {}
    /// One page-aligned chunk was programmed.
    fn chunk_programmed(&mut self, _addr: u32, _len: usize) {}
    /// Read or verify phase started; `total` is the byte count when
    /// known up front.
    fn read_started(&mut self, _total: Option<u64>) {}
    /// Cumulative bytes read back so far.
    fn read_advanced(&mut self, _done: u64) {}
}

/// No-op progress reporter
pub struct NoProgress;

impl ProgramProgress for NoProgress {}

/// Compute the 64 KiB-aligned erase span covering `len` bytes written
/// at `offset`.
///
/// Both bounds are sector multiples; the span is the union of the
/// sectors the write touches, so data sharing those sectors is erased
/// too.
pub fn erase_span(offset: u32, len: u32) -> (u32, u32) {
    let mask = (SECTOR_SIZE - 1) as u32;
    let begin = offset & !mask;
    let end = (offset + len + mask) & !mask;
    (begin, end)
}

/// Run the erase phase for a write of `len` bytes at `offset`.
pub fn erase_for_write<T: Transport>(
    flash: &mut Flash<'_, T>,
    mode: EraseMode,
    offset: u32,
    len: u32,
    progress: &mut impl ProgramProgress,
) -> Result<()> {
    match mode {
        EraseMode::Bulk => {
            progress.erase_started(0);
            flash.write_enable()?;
            flash.bulk_erase()?;
            flash.wait_ready()
        }
        EraseMode::Targeted => {
            let (begin, end) = erase_span(offset, len);
            progress.erase_started(((end - begin) as usize) / SECTOR_SIZE);
            let mut addr = begin;
            while addr < end {
                flash.write_enable()?;
                flash.sector_erase_64k(addr)?;
                flash.wait_ready()?;
                progress.block_erased(addr);
                addr += SECTOR_SIZE as u32;
            }
            Ok(())
        }
        EraseMode::Skip => Ok(()),
    }
}

/// Program a bitstream from `input` starting at `offset`.
///
/// The first chunk is `256 - (offset % 256)` bytes so every later
/// chunk is exactly one page and never crosses a page boundary. Each
/// chunk is bracketed by write-enable and the mandatory busy wait.
/// Returns the number of bytes programmed; end of input is a read
/// yielding zero bytes.
pub fn program<T: Transport, R: Read>(
    flash: &mut Flash<'_, T>,
    offset: u32,
    input: &mut R,
    progress: &mut impl ProgramProgress,
) -> Result<u64> {
    log::info!("programming..");
    progress.program_started();

    let mut buf = [0u8; PAGE_SIZE];
    let mut written: u64 = 0;
    loop {
        let addr = offset + written as u32;
        let chunk = PAGE_SIZE - (addr as usize % PAGE_SIZE);
        let n = read_full(input, &mut buf[..chunk])?;
        if n == 0 {
            break;
        }
        flash.write_enable()?;
        flash.page_program(addr, &buf[..n])?;
        flash.wait_ready()?;
        progress.chunk_programmed(addr, n);
        written += n as u64;
    }
    Ok(written)
}

/// Compare flash contents against `input`, 256 bytes at a time.
///
/// The first mismatch aborts with a single diagnostic; there is no
/// partial report beyond that.
pub fn verify<T: Transport, R: Read>(
    flash: &mut Flash<'_, T>,
    offset: u32,
    input: &mut R,
    progress: &mut impl ProgramProgress,
) -> Result<u64> {
    log::info!("verifying..");
    progress.read_started(None);

    let mut file_buf = [0u8; PAGE_SIZE];
    let mut flash_buf = [0u8; PAGE_SIZE];
    let mut done: u64 = 0;
    loop {
        let n = read_full(input, &mut file_buf)?;
        if n == 0 {
            break;
        }
        let addr = offset + done as u32;
        flash.read(addr, &mut flash_buf[..n])?;
        for i in 0..n {
            if file_buf[i] != flash_buf[i] {
                return Err(Error::VerifyMismatch {
                    addr: addr + i as u32,
                    expected: file_buf[i],
                    found: flash_buf[i],
                });
            }
        }
        done += n as u64;
        progress.read_advanced(done);
    }
    log::info!("VERIFY OK");
    Ok(done)
}

/// Stream `size` bytes of flash starting at `offset` into `output`.
pub fn read_out<T: Transport, W: Write>(
    flash: &mut Flash<'_, T>,
    offset: u32,
    size: u32,
    output: &mut W,
    progress: &mut impl ProgramProgress,
) -> Result<()> {
    log::info!("reading..");
    progress.read_started(Some(u64::from(size)));

    let mut buf = [0u8; PAGE_SIZE];
    let mut done: u32 = 0;
    while done < size {
        let n = (size - done).min(PAGE_SIZE as u32) as usize;
        flash.read(offset + done, &mut buf[..n])?;
        output.write_all(&buf[..n])?;
        done += n as u32;
        progress.read_advanced(u64::from(done));
    }
    output.flush()?;
    Ok(())
}

/// Stream a bitstream straight into FPGA configuration SRAM.
///
/// The caller must already have pulsed reset with chip select held
/// (`Session::enter_sram_mode`). After the last byte the iCE40 needs
/// 49 extra clocks to finish its startup sequence.
pub fn program_sram<T: Transport, R: Read>(
    link: &mut MpsseLink<T>,
    input: &mut R,
    progress: &mut impl ProgramProgress,
) -> Result<u64> {
    log::info!("programming SRAM..");
    progress.program_started();

    let mut buf = [0u8; SRAM_CHUNK];
    let mut sent: u64 = 0;
    loop {
        let n = read_full(input, &mut buf)?;
        if n == 0 {
            break;
        }
        link.send_only(&buf[..n])?;
        progress.chunk_programmed(sent as u32, n);
        sent += n as u64;
    }
    link.clock_dummy_bits(SRAM_TRAILING_CLOCKS)?;
    Ok(sent)
}

/// Fill `buf` from `reader`, retrying short reads until the buffer is
/// full or the stream ends. Keeps the program loop page-aligned even
/// when the source is a pipe that returns partial reads.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::Flash;
    use crate::mock::MockBridge;
    use crate::mpsse::MpsseLink;
    use std::io::Cursor;

    #[test]
    fn erase_span_bounds_are_sector_aligned_and_cover_the_write() {
        for &(offset, len) in &[
            (0u32, 300u32),
            (0x100, 0x10000),
            (0xFFFF, 2),
            (0x20000, 1),
            (0x1234, 0x2345),
        ] {
            let (begin, end) = erase_span(offset, len);
            assert_eq!(begin % SECTOR_SIZE as u32, 0);
            assert_eq!(end % SECTOR_SIZE as u32, 0);
            assert!(begin <= offset);
            assert!(end >= offset + len);
        }
    }

    #[test]
    fn program_chunks_stay_page_aligned_after_the_first() {
        let mut link = MpsseLink::new(MockBridge::new(1 << 17));
        let mut flash = Flash::new(&mut link);
        let image = vec![0x5Au8; 1000];
        let offset = 100u32;

        flash.write_enable().unwrap();
        flash.subsector_erase_4k(0).unwrap();
        flash.wait_ready().unwrap();
        program(&mut flash, offset, &mut Cursor::new(&image), &mut NoProgress).unwrap();
        drop(flash);

        let programs = link.transport_mut().programs.clone();
        // First chunk closes out the page at the write offset.
        assert_eq!(programs[0], (100, 156));
        // Every later chunk starts on a page boundary and never
        // exceeds a page.
        for &(addr, len) in &programs[1..] {
            assert_eq!(addr as usize % PAGE_SIZE, 0);
            assert!(len <= PAGE_SIZE);
        }
        let total: usize = programs.iter().map(|&(_, len)| len).sum();
        assert_eq!(total, image.len());
    }

    #[test]
    fn three_hundred_bytes_targeted_scenario() {
        let mut link = MpsseLink::new(MockBridge::new(1 << 17));
        let mut flash = Flash::new(&mut link);
        let image: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();

        erase_for_write(&mut flash, EraseMode::Targeted, 0, 300, &mut NoProgress).unwrap();
        program(&mut flash, 0, &mut Cursor::new(&image), &mut NoProgress).unwrap();

        let mut back = vec![0u8; 300];
        flash.read(0, &mut back).unwrap();
        assert_eq!(back, image);
        drop(flash);

        let bridge = link.transport_mut();
        // Exactly one 64 KiB erase, then 256 + 44 byte programs.
        assert_eq!(bridge.erases, vec![(0xD8, 0)]);
        assert_eq!(bridge.programs, vec![(0, 256), (256, 44)]);
    }

    #[test]
    fn bulk_erase_issues_a_single_chip_erase() {
        let mut link = MpsseLink::new(MockBridge::new(1 << 17));
        let mut flash = Flash::new(&mut link);
        erase_for_write(&mut flash, EraseMode::Bulk, 0x1234, 99, &mut NoProgress).unwrap();
        drop(flash);
        assert_eq!(link.transport_mut().erases, vec![(0xC7, 0)]);
    }

    #[test]
    fn skip_erase_touches_nothing() {
        let mut link = MpsseLink::new(MockBridge::new(1 << 17));
        let mut flash = Flash::new(&mut link);
        erase_for_write(&mut flash, EraseMode::Skip, 0, 1 << 16, &mut NoProgress).unwrap();
        drop(flash);
        assert!(link.transport_mut().erases.is_empty());
    }

    #[test]
    fn verify_reports_the_first_differing_byte() {
        let mut link = MpsseLink::new(MockBridge::new(1 << 17));
        let mut flash = Flash::new(&mut link);
        let image = vec![0xA5u8; 400];

        erase_for_write(&mut flash, EraseMode::Targeted, 0, 400, &mut NoProgress).unwrap();
        program(&mut flash, 0, &mut Cursor::new(&image), &mut NoProgress).unwrap();

        // Matching image verifies clean.
        let n = verify(&mut flash, 0, &mut Cursor::new(&image), &mut NoProgress).unwrap();
        assert_eq!(n, 400);

        // A corrupted reference fails at the exact byte.
        let mut bad = image.clone();
        bad[300] = 0x00;
        let err = verify(&mut flash, 0, &mut Cursor::new(&bad), &mut NoProgress).unwrap_err();
        match err {
            Error::VerifyMismatch {
                addr,
                expected,
                found,
            } => {
                assert_eq!(addr, 300);
                assert_eq!(expected, 0x00);
                assert_eq!(found, 0xA5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn read_out_clamps_the_final_chunk() {
        let mut link = MpsseLink::new(MockBridge::new(1 << 17));
        let mut flash = Flash::new(&mut link);
        let image = vec![0x3Cu8; 700];

        erase_for_write(&mut flash, EraseMode::Targeted, 0, 700, &mut NoProgress).unwrap();
        program(&mut flash, 0, &mut Cursor::new(&image), &mut NoProgress).unwrap();

        let mut out = Vec::new();
        read_out(&mut flash, 0, 700, &mut out, &mut NoProgress).unwrap();
        assert_eq!(out, image);
    }

    #[test]
    fn sram_streaming_appends_trailing_clocks() {
        let mut link = MpsseLink::new(MockBridge::new(1 << 16));
        let image = vec![0x0Fu8; 5000];
        let sent = program_sram(&mut link, &mut Cursor::new(&image), &mut NoProgress).unwrap();
        assert_eq!(sent, 5000);
        let raw = link.transport_mut().raw_sent();
        // The stream ends with 48 dummy clocks plus one extra bit.
        assert_eq!(&raw[raw.len() - 5..], &[0x8F, 0x05, 0x00, 0x8E, 0x00]);
    }
}
