use anyhow::{Context, Result};
use clap::Parser;

mod commands;
mod logging;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => commands::run(args).context("serve"),
        Commands::Register(args) => commands::register(args),
        Commands::Scan => commands::scan(),
    }
}
