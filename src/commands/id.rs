//! Id command implementation

use iceburn_ftdi::FtdiInterface;

use super::open_session;

/// Run the id command: wake the flash, print its JEDEC ID and leave
/// the contents untouched.
pub fn run_id(interface: FtdiInterface) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(interface)?;
    session.enter_flash_mode()?;

    let id = session.flash().read_id()?;
    let hex: Vec<String> = id.iter().map(|b| format!("{:02X}", b)).collect();
    println!("JEDEC ID: {}", hex.join(" "));

    session.exit_flash_mode()?;
    Ok(())
}
