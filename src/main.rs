//! s2mosaic CLI entrypoint.
//!
//! Parses arguments and hands over to the `cli` module.
//! For programmatic use, prefer the library API (`s2mosaic::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
