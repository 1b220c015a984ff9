use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "custody",
    about = "Custody ledger: record, query, and transfer custody records",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Ledger log file [default: state_path from --config, else .custody/ledger.log]
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Invoke a contract operation by name
    Invoke(InvokeArgs),
    /// Show the record stored under a key
    Query(QueryArgs),
    /// List every record in the scan range
    QueryAll,
    /// Create or overwrite a record
    Record(RecordArgs),
    /// Hand a record to a new custodian
    Transfer(TransferArgs),
    /// Write the demonstration records under keys 1..8
    Seed,
    /// Rewrite the ledger log keeping only current values
    Compact,
    /// Serve the ledger over HTTP
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct InvokeArgs {
    pub function: String,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct QueryArgs {
    pub key: String,
}

#[derive(Args)]
pub struct RecordArgs {
    pub key: String,
    #[arg(long)]
    pub owner: String,
    #[arg(long, default_value = "")]
    pub details: String,
    #[arg(long)]
    pub timestamp: String,
    #[arg(long)]
    pub custodian: String,
}

#[derive(Args)]
pub struct TransferArgs {
    pub key: String,
    pub custodian: String,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Listen address, overriding the config file
    #[arg(long)]
    pub bind: Option<String>,
}
