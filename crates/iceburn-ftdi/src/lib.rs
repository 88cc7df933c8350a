//! FTDI MPSSE bridge backend for iceburn
//!
//! Wraps the libftdi1 bindings in the `iceburn-core` transport trait.
//! All MPSSE command framing lives in the core crate; this crate only
//! moves raw bytes over USB and manages device setup and teardown.

pub mod device;
pub mod error;

pub use device::{FtdiBridge, FtdiConfig, FtdiInterface};
pub use error::{FtdiError, Result};
