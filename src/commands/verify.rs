//! Verify command implementation

use std::io::Cursor;
use std::path::Path;

use iceburn_core::program;
use iceburn_ftdi::FtdiInterface;

use super::progress::IndicatifProgress;
use super::{open_session, read_input};

/// Run the verify command
pub fn run_verify(
    interface: FtdiInterface,
    input: &Path,
    offset: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_input(input)?;

    let mut session = open_session(interface)?;
    session.enter_flash_mode()?;

    let mut progress = IndicatifProgress::with_program_total(data.len() as u64);
    let mut flash = session.flash();
    let checked = program::verify(&mut flash, offset, &mut Cursor::new(&data), &mut progress)?;
    progress.done();

    session.exit_flash_mode()?;
    println!("Verified {} bytes at 0x{:06X}", checked, offset);
    Ok(())
}
