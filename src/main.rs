//! iceburn - flash and SRAM programmer for FTDI-based iCE40 boards
//!
//! Talks to the SPI NOR flash (or the FPGA's slave configuration
//! port) behind an FT2232H in MPSSE mode: write, read back and verify
//! bitstreams, stream a bitstream straight into configuration SRAM,
//! and inspect or reorder the multi-boot vector table.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, VectorCommands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The filter level has to go into the builder: raising
    // log::set_max_level afterwards cannot pass records the
    // env_logger filter was built to discard.
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Write {
            input,
            offset,
            bulk_erase,
            no_erase,
            no_verify,
        } => {
            commands::write::run_write(cli.interface, &input, offset, bulk_erase, no_erase, !no_verify)
        }
        Commands::Read {
            output,
            offset,
            size,
        } => commands::read::run_read(cli.interface, &output, offset, size),
        Commands::Verify { input, offset } => {
            commands::verify::run_verify(cli.interface, &input, offset)
        }
        Commands::Id => commands::id::run_id(cli.interface),
        Commands::Sram { input } => commands::sram::run_sram(cli.interface, &input),
        Commands::Vectors { command } => match command {
            VectorCommands::List => commands::vectors::run_list(cli.interface),
            VectorCommands::Swap { a, b } => commands::vectors::run_swap(cli.interface, a, b),
        },
    }
}
