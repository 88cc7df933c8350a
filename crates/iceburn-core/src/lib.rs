//! Core programming logic for iCE40 SPI NOR flash
//!
//! Everything hardware-independent lives here: the MPSSE command
//! framer, the flash command protocol, the session/reset sequencing,
//! the erase-and-program orchestrator and the boot vector table
//! editor. Hardware access goes through the [`transport::Transport`]
//! trait; the `iceburn-ftdi` crate provides the libftdi1-backed
//! implementation and tests run against an in-memory mock.

pub mod error;
pub mod flash;
pub mod mpsse;
pub mod program;
pub mod session;
pub mod transport;
pub mod vectors;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{Error, Result};
