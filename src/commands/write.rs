//! Write command implementation

use std::io::Cursor;
use std::path::Path;

use iceburn_core::program::{self, EraseMode};
use iceburn_ftdi::FtdiInterface;

use super::progress::IndicatifProgress;
use super::{open_session, read_input};

/// Run the write command
pub fn run_write(
    interface: FtdiInterface,
    input: &Path,
    offset: u32,
    bulk_erase: bool,
    no_erase: bool,
    do_verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_input(input)?;

    let erase_mode = if bulk_erase {
        EraseMode::Bulk
    } else if no_erase {
        EraseMode::Skip
    } else {
        EraseMode::Targeted
    };

    let mut session = open_session(interface)?;
    session.enter_flash_mode()?;

    let mut progress = IndicatifProgress::with_program_total(data.len() as u64);
    let mut flash = session.flash();
    program::erase_for_write(
        &mut flash,
        erase_mode,
        offset,
        data.len() as u32,
        &mut progress,
    )?;
    let written = program::program(&mut flash, offset, &mut Cursor::new(&data), &mut progress)?;
    log::info!("wrote {} bytes at 0x{:06X}", written, offset);

    if do_verify {
        program::verify(&mut flash, offset, &mut Cursor::new(&data), &mut progress)?;
    }
    progress.done();

    session.exit_flash_mode()?;
    println!("Write complete!");
    Ok(())
}
