//! Duplex byte transport to the USB bridge
//!
//! The transport is a raw byte channel with no framing of its own;
//! the MPSSE layer above it builds command frames out of these bytes.
//! Implementations are synchronous and blocking throughout.

use std::time::Duration;

use crate::error::Result;

/// A duplex byte channel to the MPSSE bridge
///
/// `recv` must block until the buffer is completely filled, retrying
/// short reads with a bounded fixed-interval poll. Both `send` and
/// `recv` fail hard on any link error; callers treat every transport
/// error as fatal.
pub trait Transport {
    /// Send all of `data` to the bridge.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive exactly `buf.len()` bytes, retrying short reads.
    fn recv(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Read and discard any bytes already queued on the link.
    ///
    /// Used on the abort path: a partially-issued multi-byte command
    /// can leave stale reply bytes in the channel, and draining them
    /// keeps the bridge state sane for the next open.
    fn drain(&mut self) -> usize;

    /// Sleep for the given number of microseconds.
    ///
    /// Test transports override this with a no-op so the reset settle
    /// delays and busy-poll intervals cost no wall-clock time.
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }
}
