//! FTDI MPSSE bridge implementation
//!
//! Opens an FT2232H-class device through the libftdi1 bindings, puts
//! it into MPSSE mode and exposes it as an `iceburn-core` transport.

use std::io::{Read, Write};
use std::time::Duration;

use ftdi::{find_by_vid_pid, BitMode, Device, Interface};
use iceburn_core::error::Error as CoreError;
use iceburn_core::transport::Transport;

use crate::error::{FtdiError, Result};

/// Latency timer while the session is active, in milliseconds.
/// 1 ms keeps the status-poll round trips tight.
const SESSION_LATENCY_MS: u8 = 1;

/// Poll interval while waiting for reply bytes
const READ_POLL: Duration = Duration::from_micros(100);

/// Read poll budget: 600 000 polls at 100 us is one minute, well past
/// any reply the bridge can legitimately still be assembling.
const MAX_READ_POLLS: u32 = 600_000;

/// Interface/channel on the FTDI device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FtdiInterface {
    /// Channel A (the channel wired to flash on the iCE40 boards)
    #[default]
    A,
    /// Channel B
    B,
    /// Channel C
    C,
    /// Channel D
    D,
}

impl FtdiInterface {
    /// Parse a channel letter.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(FtdiInterface::A),
            'B' => Some(FtdiInterface::B),
            'C' => Some(FtdiInterface::C),
            'D' => Some(FtdiInterface::D),
            _ => None,
        }
    }

    /// The channel letter.
    pub fn letter(&self) -> char {
        match self {
            FtdiInterface::A => 'A',
            FtdiInterface::B => 'B',
            FtdiInterface::C => 'C',
            FtdiInterface::D => 'D',
        }
    }
}

/// Configuration for opening the bridge
#[derive(Debug, Clone)]
pub struct FtdiConfig {
    /// Interface/channel to use
    pub interface: FtdiInterface,
    /// USB vendor ID
    pub vendor_id: u16,
    /// USB product ID
    pub product_id: u16,
}

impl Default for FtdiConfig {
    fn default() -> Self {
        // FT2232H as found on the iCEstick and HX8K breakout board.
        FtdiConfig {
            interface: FtdiInterface::A,
            vendor_id: 0x0403,
            product_id: 0x6010,
        }
    }
}

/// An open FTDI bridge in MPSSE mode
pub struct FtdiBridge {
    device: Device,
    /// Latency timer value the device had before the session, put
    /// back on close
    saved_latency: u8,
}

impl FtdiBridge {
    /// Open and configure the bridge: USB reset, fast latency timer,
    /// MPSSE bit mode with all ADBUS pins claimable.
    pub fn open(config: &FtdiConfig) -> Result<Self> {
        log::info!("opening FTDI channel {}", config.interface.letter());
        log::debug!(
            "looking for FTDI device VID={:04X} PID={:04X}",
            config.vendor_id,
            config.product_id
        );

        let interface = match config.interface {
            FtdiInterface::A => Interface::A,
            FtdiInterface::B => Interface::B,
            FtdiInterface::C => Interface::C,
            FtdiInterface::D => Interface::D,
        };

        let mut device = find_by_vid_pid(config.vendor_id, config.product_id)
            .interface(interface)
            .open()
            .map_err(|e| FtdiError::OpenFailed(format!("{}", e)))?;

        device
            .usb_reset()
            .map_err(|e| FtdiError::ConfigFailed(format!("USB reset failed: {}", e)))?;

        let saved_latency = device
            .latency_timer()
            .map_err(|e| FtdiError::ConfigFailed(format!("get latency timer failed: {}", e)))?;
        log::debug!(
            "lowering latency timer from {} ms to {} ms",
            saved_latency,
            SESSION_LATENCY_MS
        );

        device
            .set_latency_timer(SESSION_LATENCY_MS)
            .map_err(|e| FtdiError::ConfigFailed(format!("set latency timer failed: {}", e)))?;

        device
            .set_bitmode(0xFF, BitMode::Mpsse)
            .map_err(|e| FtdiError::ConfigFailed(format!("set MPSSE mode failed: {}", e)))?;

        Ok(FtdiBridge {
            device,
            saved_latency,
        })
    }
}

impl Drop for FtdiBridge {
    fn drop(&mut self) {
        // Put the latency timer back where the session found it; the
        // pins were already released by the framer's teardown.
        if self.device.set_latency_timer(self.saved_latency).is_err() {
            log::warn!("failed to restore FTDI latency timer on close");
        }
    }
}

impl Transport for FtdiBridge {
    fn send(&mut self, data: &[u8]) -> iceburn_core::Result<()> {
        self.device
            .write_all(data)
            .map_err(|e| CoreError::Transport(format!("USB write failed: {}", e)))?;
        log::trace!("sent {} bytes", data.len());
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> iceburn_core::Result<()> {
        let mut total = 0;
        let mut polls = 0;
        while total < buf.len() {
            match self.device.read(&mut buf[total..]) {
                // No data queued yet, the chip is still clocking.
                Ok(0) => {
                    polls += 1;
                    if polls > MAX_READ_POLLS {
                        return Err(CoreError::Transport(format!(
                            "USB read stalled: {} of {} bytes",
                            total,
                            buf.len()
                        )));
                    }
                    std::thread::sleep(READ_POLL);
                }
                Ok(n) => total += n,
                Err(e) => {
                    return Err(CoreError::Transport(format!("USB read failed: {}", e)));
                }
            }
        }
        log::trace!("received {} bytes", total);
        Ok(())
    }

    fn drain(&mut self) -> usize {
        let mut count = 0;
        let mut byte = [0u8; 1];
        while let Ok(n) = self.device.read(&mut byte) {
            if n == 0 {
                break;
            }
            log::debug!("unexpected rx byte: 0x{:02X}", byte[0]);
            count += 1;
        }
        count
    }
}
