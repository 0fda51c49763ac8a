use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pin_raider::Severity;

#[derive(Parser)]
#[command(version, about = "Parse, lint and normalize Python dependency pin files", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Also write error-level log records to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parses a pin file and reports duplicate, conflicting and unpinned requirements
    Check(CheckArgs),
    /// Prints the pin file in canonical form
    Fmt(FmtArgs),
    /// Prints a summary and every entry of the pin file
    List(ListArgs),
    /// Writes the parsed pin file as JSON or BSON
    Export(ExportArgs),
    /// Compares the packages of two pin files
    Diff(DiffArgs),
    /// Saves pin files as named snapshots and compares against them
    Snapshot(SnapshotArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Bson,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the pin file
    pub file: PathBuf,
    /// Lint settings file (defaults to ./pin-raider.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Also load files pulled in with -r / -c and lint them as one set
    #[arg(long)]
    pub follow_includes: bool,
    /// Do not report requirements without an exact pin
    #[arg(long)]
    pub allow_unpinned: bool,
    /// Report identical duplicate pins as errors
    #[arg(long)]
    pub deny_duplicates: bool,
    /// Lowest severity that makes the check fail
    #[arg(long, value_enum)]
    pub fail_on: Option<Severity>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct FmtArgs {
    /// Path to the pin file
    pub file: PathBuf,
    /// Drop comments and duplicates and sort requirements by name
    #[arg(long)]
    pub normalize: bool,
    /// Rewrite the file in place instead of printing it
    #[arg(long, conflicts_with = "check")]
    pub write: bool,
    /// Exit with status 1 when the file is not already formatted
    #[arg(long)]
    pub check: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Path to the pin file
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Path to the pin file
    pub file: PathBuf,
    /// Destination file
    #[arg(long, short)]
    pub output: PathBuf,
    #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
    pub format: ExportFormat,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Earlier pin file
    pub old: PathBuf,
    /// Later pin file
    pub new: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct SnapshotArgs {
    /// Directory holding the snapshots
    #[arg(long, default_value = ".pin-raider/snapshots")]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: SnapshotCommands,
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Parses a pin file and stores it under a name
    Save(SnapshotSaveArgs),
    /// Prints a stored snapshot in canonical form
    Show(SnapshotShowArgs),
    /// Compares a pin file against a stored snapshot
    Diff(SnapshotDiffArgs),
    /// Lists stored snapshot names
    List,
}

#[derive(Args)]
pub struct SnapshotSaveArgs {
    /// Snapshot name
    #[arg(long)]
    pub name: String,
    /// Path to the pin file
    pub file: PathBuf,
}

#[derive(Args)]
pub struct SnapshotShowArgs {
    /// Snapshot name
    #[arg(long)]
    pub name: String,
}

#[derive(Args)]
pub struct SnapshotDiffArgs {
    /// Snapshot name
    #[arg(long)]
    pub name: String,
    /// Path to the pin file
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
