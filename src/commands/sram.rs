//! SRAM command implementation

use std::io::Cursor;
use std::path::Path;

use iceburn_core::program;
use iceburn_ftdi::FtdiInterface;

use super::progress::IndicatifProgress;
use super::{open_session, read_input};

/// Run the sram command: stream a bitstream straight into the FPGA's
/// configuration SRAM. Flash is never touched and the configuration
/// is lost at the next power cycle.
pub fn run_sram(
    interface: FtdiInterface,
    input: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_input(input)?;

    let mut session = open_session(interface)?;
    session.enter_sram_mode()?;

    let mut progress = IndicatifProgress::with_program_total(data.len() as u64);
    let sent = program::program_sram(session.link(), &mut Cursor::new(&data), &mut progress)?;
    progress.done();
    log::info!("streamed {} bytes into SRAM", sent);

    // cdone going high is the FPGA's own success signal here.
    session.log_cdone()?;
    println!("SRAM configuration complete");
    Ok(())
}
