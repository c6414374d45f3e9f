use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ftl",
    about = "Freight Token Ledger: audited token accounting on a proof-of-work hash chain",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a scenario and print the resulting chain and balances
    Run(RunArgs),
    /// Run a scenario and print only the chain validation report
    Verify(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Scenario file: a list of [[op]] tables
    pub scenario: PathBuf,

    /// Ledger configuration (TOML); defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
