//! Command implementations

pub mod id;
pub mod read;
pub mod sram;
pub mod vectors;
pub mod verify;
pub mod write;

mod progress;

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use iceburn_core::session::Session;
use iceburn_ftdi::{FtdiBridge, FtdiConfig, FtdiInterface};

/// Open the bridge on the chosen channel and start a session.
pub fn open_session(
    interface: FtdiInterface,
) -> Result<Session<FtdiBridge>, Box<dyn std::error::Error>> {
    let config = FtdiConfig {
        interface,
        ..FtdiConfig::default()
    };
    let bridge = FtdiBridge::open(&config)?;
    Ok(Session::open(bridge)?)
}

/// Read an entire input into memory; `-` means stdin.
///
/// Bitstreams are a few hundred KiB at most, and holding the whole
/// image lets the verify pass reuse it without reopening a pipe.
pub fn read_input(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(path)?
    };
    if data.is_empty() {
        return Err(format!("Input {} is empty", path.display()).into());
    }
    log::info!("read {} bytes from {}", data.len(), path.display());
    Ok(data)
}
