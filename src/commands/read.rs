//! Read command implementation

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use iceburn_core::program;
use iceburn_ftdi::FtdiInterface;

use super::open_session;
use super::progress::IndicatifProgress;

/// Run the read command
pub fn run_read(
    interface: FtdiInterface,
    output: &Path,
    offset: u32,
    size: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(interface)?;
    session.enter_flash_mode()?;

    let mut progress = IndicatifProgress::new();
    let mut flash = session.flash();
    if output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut sink = stdout.lock();
        program::read_out(&mut flash, offset, size, &mut sink, &mut progress)?;
    } else {
        let mut sink = BufWriter::new(File::create(output)?);
        program::read_out(&mut flash, offset, size, &mut sink, &mut progress)?;
        sink.flush()?;
    }
    progress.done();

    session.exit_flash_mode()?;
    log::info!("read {} bytes from 0x{:06X}", size, offset);
    Ok(())
}
