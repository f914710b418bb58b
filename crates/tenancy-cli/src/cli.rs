use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tenancy",
    about = "Tenant provisioning against an in-memory revisioned datastore",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Caller roles, comma-separated, as sent in the role header
    #[arg(long, global = true, default_value = "skylight-admin")]
    pub role: String,

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
    /// Create a tenant and its default resources
    Provision(ProvisionArgs),
    /// Walk through provisioning, integrity-gated deletes, and patching
    Demo(DemoArgs),
    /// Feed newline-delimited baseline messages from stdin to the consumer
    Ingest(IngestArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ProvisionArgs {
    #[arg(long)]
    pub name: String,
    /// URL subdomain; derived from the name when omitted
    #[arg(long)]
    pub subdomain: Option<String>,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Tenant name used by the walkthrough
    #[arg(long, default_value = "Demo")]
    pub tenant: String,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Acknowledge only messages that decode and apply in full
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct ConfigArgs {}
