//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use iceburn_ftdi::FtdiInterface;

/// Parse a flash offset: decimal, or hex with a 0x prefix.
fn parse_offset(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a byte count: decimal or 0x hex, with an optional k or M
/// binary suffix.
fn parse_size(s: &str) -> Result<u32, String> {
    let (digits, shift) = match s.strip_suffix(['k', 'K']) {
        Some(rest) => (rest, 10u32),
        None => match s.strip_suffix('M') {
            Some(rest) => (rest, 20),
            None => (s, 0),
        },
    };
    let base = parse_offset(digits)?;
    base.checked_shl(shift)
        .filter(|_| shift == 0 || base < (1 << (32 - shift)))
        .ok_or_else(|| format!("Size too large: {}", s))
}

/// Parse an FTDI channel letter.
fn parse_interface(s: &str) -> Result<FtdiInterface, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => FtdiInterface::from_char(c)
            .ok_or_else(|| format!("Invalid channel '{}': must be A, B, C, or D", s)),
        _ => Err(format!("Invalid channel '{}': must be A, B, C, or D", s)),
    }
}

#[derive(Parser)]
#[command(name = "iceburn")]
#[command(author, version, about = "iCE40 flash and SRAM programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// FTDI interface/channel to use (A, B, C, or D)
    #[arg(short, long, global = true, default_value = "A", value_parser = parse_interface)]
    pub interface: FtdiInterface,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a bitstream to flash
    Write {
        /// Input file path, or - for stdin
        input: PathBuf,

        /// Flash offset to write at (hex with 0x prefix or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_offset)]
        offset: u32,

        /// Erase the whole chip instead of just the write span
        #[arg(short, long, conflicts_with = "no_erase")]
        bulk_erase: bool,

        /// Don't erase before writing
        #[arg(short, long)]
        no_erase: bool,

        /// Skip the verify pass after writing
        #[arg(long)]
        no_verify: bool,
    },

    /// Read flash contents to a file
    Read {
        /// Output file path, or - for stdout
        output: PathBuf,

        /// Flash offset to read from
        #[arg(short, long, default_value = "0", value_parser = parse_offset)]
        offset: u32,

        /// Number of bytes to read (suffixes k and M accepted)
        #[arg(short, long, default_value = "256k", value_parser = parse_size)]
        size: u32,
    },

    /// Verify flash contents against a file without writing
    Verify {
        /// Input file path, or - for stdin
        input: PathBuf,

        /// Flash offset to compare at
        #[arg(short, long, default_value = "0", value_parser = parse_offset)]
        offset: u32,
    },

    /// Report the flash JEDEC ID without touching its contents
    Id,

    /// Load a bitstream straight into FPGA SRAM, leaving flash alone
    Sram {
        /// Input file path, or - for stdin
        input: PathBuf,
    },

    /// Inspect or edit the multi-boot vector table
    Vectors {
        #[command(subcommand)]
        command: VectorCommands,
    },
}

#[derive(Subcommand)]
pub enum VectorCommands {
    /// List the boot vectors found at the start of flash
    List,

    /// Swap the targets of two boot vectors
    Swap {
        /// First vector index (0 is the reset vector)
        a: usize,

        /// Second vector index
        b: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accept_hex_and_decimal() {
        assert_eq!(parse_offset("0x10000").unwrap(), 0x10000);
        assert_eq!(parse_offset("4096").unwrap(), 4096);
        assert!(parse_offset("0xZZ").is_err());
    }

    #[test]
    fn sizes_accept_binary_suffixes() {
        assert_eq!(parse_size("256k").unwrap(), 256 * 1024);
        assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("512").unwrap(), 512);
        assert!(parse_size("5000M").is_err());
    }

    #[test]
    fn interface_letters_parse_case_insensitively() {
        assert_eq!(parse_interface("A").unwrap(), FtdiInterface::A);
        assert_eq!(parse_interface("b").unwrap(), FtdiInterface::B);
        assert!(parse_interface("E").is_err());
        assert!(parse_interface("AB").is_err());
    }
}
