//! MPSSE command framing
//!
//! Translates logical operations (pin set, clock config, write-only
//! SPI send, full-duplex SPI exchange) into the byte opcodes the
//! FT2232H MPSSE engine understands, and decodes the replies.
//!
//! Based on FTDI AN_108 (Command Processor for MPSSE) and the pin
//! assignment used by the iCEstick / iCE40-HX8K breakout boards.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::transport::Transport;

// ============================================================================
// MPSSE command opcodes
// ============================================================================

/// Write bytes on negative clock edge, no read (SPI mode 0)
pub const DATA_OUT_BYTES: u8 = 0x11;

/// Write bytes on negative edge, read on positive edge (full duplex)
pub const DATA_XFER_BYTES: u8 = 0x31;

/// Clock out dummy bits without data (bit mode, no read)
pub const CLOCK_OUT_BITS: u8 = 0x8E;

/// Clock out dummy bytes without data (byte mode, no read)
pub const CLOCK_OUT_BYTES: u8 = 0x8F;

/// Set data bits low byte (value + direction)
pub const SET_BITS_LOW: u8 = 0x80;

/// Get data bits low byte (one reply byte)
pub const GET_BITS_LOW: u8 = 0x81;

/// Set clock divisor (two divisor bytes, little endian)
pub const TCK_DIVISOR: u8 = 0x86;

/// Enable divide-by-5 prescaler (12 MHz base clock)
pub const EN_DIV_5: u8 = 0x8B;

/// Maximum payload of a single 0x11/0x31 frame (length field is 16-bit
/// length-minus-one)
const MAX_FRAME_LEN: usize = 65536;

bitflags! {
    /// ADBUS pin assignment on the iCE40 programmer boards
    ///
    /// Chip select and reset are both active low. CDONE is an input
    /// reflecting the FPGA's configuration-done state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Pins: u8 {
        /// SPI clock (ADBUS0)
        const SCK = 0x01;
        /// SPI data out, FTDI to flash (ADBUS1)
        const MOSI = 0x02;
        /// SPI data in, flash to FTDI (ADBUS2)
        const MISO = 0x04;
        /// Flash chip select, active low (ADBUS4 / GPIOL0)
        const SS = 0x10;
        /// FPGA configuration done, input (ADBUS6 / GPIOL2)
        const CDONE = 0x40;
        /// FPGA reset, active low (ADBUS7 / GPIOL3)
        const CRESET = 0x80;
    }
}

/// Pins driven as outputs: SCK, MOSI, SS, CRESET
const PIN_DIRECTION: u8 = Pins::SCK.bits() | Pins::MOSI.bits() | Pins::SS.bits() | Pins::CRESET.bits();

/// MPSSE command framer over a raw byte transport
///
/// Owns the link for the lifetime of the session. Dropping the framer
/// releases the hardware lines (both chip select and reset driven
/// inactive) on a best-effort basis, so the abort path never leaves
/// the FPGA held in reset.
pub struct MpsseLink<T: Transport> {
    link: T,
}

impl<T: Transport> MpsseLink<T> {
    /// Wrap a transport in the MPSSE framer.
    pub fn new(link: T) -> Self {
        MpsseLink { link }
    }

    /// Configure the SPI clock: divide-by-5 prescaler on, divisor 0.
    ///
    /// 12 MHz base / ((0 + 1) * 2) = 6 MHz SPI clock.
    pub fn configure_clock(&mut self) -> Result<()> {
        log::debug!("configuring MPSSE clock for 6 MHz SPI");
        self.link.send(&[EN_DIV_5])?;
        self.link.send(&[TCK_DIVISOR, 0x00, 0x00])
    }

    /// Drive the chip-select and reset lines.
    ///
    /// Both lines are active low: `asserted` means the line is driven
    /// low. SCK idles high between transactions.
    pub fn set_pins(&mut self, cs_asserted: bool, reset_asserted: bool) -> Result<()> {
        let mut value = Pins::SCK;
        if !cs_asserted {
            value |= Pins::SS;
        }
        if !reset_asserted {
            value |= Pins::CRESET;
        }
        self.link.send(&[SET_BITS_LOW, value.bits(), PIN_DIRECTION])
    }

    /// Sample the ADBUS pin states.
    pub fn read_pins(&mut self) -> Result<Pins> {
        self.link.send(&[GET_BITS_LOW])?;
        let mut data = [0u8; 1];
        self.link.recv(&mut data)?;
        Ok(Pins::from_bits_retain(data[0]))
    }

    /// Sample the FPGA configuration-done line.
    ///
    /// Diagnostics only; protocol correctness never depends on it.
    pub fn cdone(&mut self) -> Result<bool> {
        Ok(self.read_pins()?.contains(Pins::CDONE))
    }

    /// Send bytes over SPI, discarding whatever the device shifts out.
    pub fn send_only(&mut self, data: &[u8]) -> Result<()> {
        for chunk in data.chunks(MAX_FRAME_LEN) {
            let n = chunk.len() - 1;
            let mut frame = Vec::with_capacity(3 + chunk.len());
            frame.push(DATA_OUT_BYTES);
            frame.push((n & 0xFF) as u8);
            frame.push((n >> 8) as u8);
            frame.extend_from_slice(chunk);
            self.link.send(&frame)?;
        }
        Ok(())
    }

    /// Full-duplex SPI exchange: `data` is sent and overwritten in
    /// place with the device's reply, one reply byte per payload byte.
    pub fn exchange(&mut self, data: &mut [u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len();
        for start in (0..len).step_by(MAX_FRAME_LEN) {
            let chunk = &mut data[start..len.min(start + MAX_FRAME_LEN)];
            let n = chunk.len() - 1;
            let mut frame = Vec::with_capacity(3 + chunk.len());
            frame.push(DATA_XFER_BYTES);
            frame.push((n & 0xFF) as u8);
            frame.push((n >> 8) as u8);
            frame.extend_from_slice(chunk);
            self.link.send(&frame)?;
            self.link.recv(chunk)?;
        }
        Ok(())
    }

    /// Clock out dummy bits with no data on the wire.
    ///
    /// Used after SRAM configuration: the iCE40 needs at least 49
    /// extra clocks to finish its internal startup sequence.
    pub fn clock_dummy_bits(&mut self, bits: u16) -> Result<()> {
        if bits == 0 {
            return Err(Error::Transport("cannot clock zero dummy bits".into()));
        }
        let bytes = bits / 8;
        let rem = bits % 8;
        if bytes > 0 {
            let n = bytes - 1;
            self.link
                .send(&[CLOCK_OUT_BYTES, (n & 0xFF) as u8, (n >> 8) as u8])?;
        }
        if rem > 0 {
            self.link.send(&[CLOCK_OUT_BITS, (rem - 1) as u8])?;
        }
        Ok(())
    }

    /// Drive both lines inactive, releasing the flash and the FPGA.
    pub fn release(&mut self) -> Result<()> {
        self.set_pins(false, false)
    }

    /// Sleep helper, routed through the transport so tests can stub it.
    pub fn delay_us(&mut self, us: u32) {
        self.link.delay_us(us);
    }

    /// Access the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.link
    }
}

impl<T: Transport> Drop for MpsseLink<T> {
    fn drop(&mut self) {
        // Release lines on every exit path, including aborts. Stray
        // reply bytes from a partially-issued command are flushed
        // first so the release frame is not misinterpreted.
        let stray = self.link.drain();
        if stray > 0 {
            log::warn!("drained {} stray bytes from the bridge", stray);
        }
        if self.release().is_err() {
            log::warn!("failed to release bridge pins on close");
        }
    }
}
