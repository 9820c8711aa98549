//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

/// Satchel - package, deliver and verify archival bags
#[derive(Parser, Debug)]
#[command(name = "satchel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to satchel.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bag a payload, pack it and deposit the archive
    Deliver(DeliverArgs),

    /// Check deposited bags against the ingest API
    Verify(VerifyArgs),

    /// Show recorded delivery status
    Status(StatusArgs),

    /// Validate a bag on disk
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct DeliverArgs {
    /// Local directory holding the payload
    #[arg(long, conflicts_with = "from_remote", required_unless_present = "from_remote")]
    pub source: Option<Utf8PathBuf>,

    /// Pull the payload from this configured remote instead of a local directory
    #[arg(long, requires = "remote_path")]
    pub from_remote: Option<String>,

    /// Directory on the source remote holding the payload
    #[arg(long)]
    pub remote_path: Option<String>,

    /// Object identifier in the source system
    #[arg(long)]
    pub object_id: String,

    /// Context segment of the bag identifier
    #[arg(long)]
    pub context: Option<String>,

    /// Part segment of the bag identifier
    #[arg(long)]
    pub part_id: Option<String>,

    /// Title for the repository metadata tag
    #[arg(long)]
    pub title: String,

    /// Description for the repository metadata tag
    #[arg(long)]
    pub description: Option<String>,

    /// Creator for the repository metadata tag
    #[arg(long)]
    pub creator: Option<String>,

    /// Extra tag file to write at the bag root (repeatable)
    #[arg(long = "tag-file", value_name = "PATH")]
    pub tag_files: Vec<Utf8PathBuf>,

    /// Deposit to this configured remote instead of the default one
    #[arg(long)]
    pub remote: Option<String>,

    /// Package locally without depositing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Repeat every N seconds instead of running once
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Stop after this many runs (with --interval)
    #[arg(long, requires = "interval")]
    pub runs: Option<u32>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show the full history of one bag
    #[arg(long)]
    pub identifier: Option<String>,

    /// Only bags whose latest event is at or after this time (RFC 3339)
    #[arg(long, conflicts_with = "identifier")]
    pub since: Option<DateTime<Utc>>,

    /// Only bags whose latest event still awaits a final outcome
    #[arg(long, conflicts_with = "identifier")]
    pub pending: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Bag directory
    pub path: Utf8PathBuf,

    /// Also reject payload files missing from the manifests
    #[arg(long)]
    pub strict: bool,
}
