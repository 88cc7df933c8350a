//! Error types for iceburn-core
//!
//! Every fatal condition in the stack unwinds through this one error
//! type to a single top-level handler. There is no local recovery
//! tier: a transport failure or a verify mismatch aborts the whole
//! operation, and the Drop impls on the link take care of restoring
//! hardware state on the way out.

use thiserror::Error;

/// Errors that can occur while talking to the bridge or the flash
#[derive(Debug, Error)]
pub enum Error {
    /// Link-level send/receive failure. Always fatal, never retried
    /// beyond the bounded short-read wait inside the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The flash never cleared its write-in-progress bit within the
    /// poll budget.
    #[error("flash stayed busy after {polls} status polls")]
    BusyTimeout {
        /// Number of status polls issued before giving up
        polls: u32,
    },

    /// Flash contents differ from the reference image.
    #[error("verify mismatch at 0x{addr:06X}: expected 0x{expected:02X}, found 0x{found:02X}")]
    VerifyMismatch {
        /// Flash address of the first differing byte
        addr: u32,
        /// Byte expected from the reference image
        expected: u8,
        /// Byte actually read from flash
        found: u8,
    },

    /// A page program would cross the 256-byte page boundary.
    #[error("page program of {len} bytes at 0x{addr:06X} crosses a page boundary")]
    PageOverflow {
        /// Target flash address
        addr: u32,
        /// Requested payload length
        len: usize,
    },

    /// A boot-vector index is outside the parsed table.
    #[error("boot vector {index} out of range (table has {count} valid records)")]
    VectorOutOfRange {
        /// Requested record index
        index: usize,
        /// Number of records confirmed valid by the scan
        count: usize,
    },

    /// File I/O failure on the bitstream input or output stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core error type
pub type Result<T> = std::result::Result<T, Error>;
