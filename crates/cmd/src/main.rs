// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cmd::load::{LoadArgs, exit_code, load_command};
use diagnostics::error;

/// Load Sparkify event files into query tables and check them
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "sparkify")]
struct Cli {
    #[command(flatten)]
    load: LoadArgs,

    /// Show query statements and every recovered error
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    diagnostics::init_diagnostics_with_default("info");

    let cli = Cli::parse();
    let config = cli.load.resolve()?;

    let report = match load_command(&config, cli.verbose, |output| print!("{output}")).await {
        Ok(report) => report,
        Err(err) => {
            let message = format!("{err:#}");
            error!("Run aborted: {message}", message: message);
            return Err(err);
        }
    };

    Ok(ExitCode::from(exit_code(&config, &report)))
}
