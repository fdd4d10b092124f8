//! Clap derive structures for the `opnwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// opnwatch -- presence indicators for OPNsense firewalls
#[derive(Debug, Parser)]
#[command(
    name = "opnwatch",
    version,
    about = "Watch OPNsense CARP, notice and firmware status from the command line",
    long_about = "Polls an OPNsense firewall's status endpoint and derives binary\n\
        indicators from it: CARP status, pending notices, firmware updates.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'd', env = "OPNWATCH_DEVICE", global = true)]
    pub device: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "OPNWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Firewall URL (overrides the profile)
    #[arg(long, env = "OPNWATCH_URL", global = true)]
    pub url: Option<String>,

    /// OPNsense API key
    #[arg(long, env = "OPNWATCH_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// OPNsense API secret
    #[arg(long, env = "OPNWATCH_API_SECRET", global = true, hide_env_values = true)]
    pub api_secret: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "OPNWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides the profile)
    #[arg(long, env = "OPNWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll once and print every indicator
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Poll continuously and print indicator changes until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Output format
    #[arg(long, short = 'o', env = "OPNWATCH_OUTPUT", default_value = "table")]
    pub output: OutputFormat,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides the profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Print the resolved configuration (secrets redacted)
    Show,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
