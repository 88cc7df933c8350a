//! Error types for the FTDI bridge

use std::fmt;

/// Result type for FTDI operations
pub type Result<T> = std::result::Result<T, FtdiError>;

/// Errors that can occur while opening or configuring the bridge
#[derive(Debug)]
pub enum FtdiError {
    /// Failed to open device
    OpenFailed(String),

    /// Failed to configure device
    ConfigFailed(String),

    /// Invalid channel/port specification
    InvalidChannel(String),

    /// libftdi error
    LibFtdi(String),
}

impl fmt::Display for FtdiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtdiError::OpenFailed(s) => write!(f, "Failed to open device: {}", s),
            FtdiError::ConfigFailed(s) => write!(f, "Failed to configure device: {}", s),
            FtdiError::InvalidChannel(s) => write!(f, "Invalid channel: {}", s),
            FtdiError::LibFtdi(s) => write!(f, "libftdi error: {}", s),
        }
    }
}

impl std::error::Error for FtdiError {}

impl From<ftdi::Error> for FtdiError {
    fn from(e: ftdi::Error) -> Self {
        FtdiError::LibFtdi(e.to_string())
    }
}
