use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use tracing::error;

mod cli;
mod commands;
mod logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("{:#}", e);
        return ExitCode::from(2);
    }

    let outcome = match &cli.command {
        Commands::Check(args) => commands::check(args).await,
        Commands::Fmt(args) => commands::fmt(args).await,
        Commands::List(args) => commands::list(args).await,
        Commands::Export(args) => commands::export(args).await,
        Commands::Diff(args) => commands::diff_files(args).await,
        Commands::Snapshot(args) => commands::snapshot(args).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
