//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use url::Url;

/// Keeper - installs and reconciles first-party browser extensions
#[derive(Parser, Debug)]
#[command(name = "keeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to keeper.yaml config file
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Install extensions, then keep them reconciled
    Run(RunArgs),

    /// Inspect desired-state manifests
    #[command(subcommand)]
    Manifest(ManifestCommands),

    /// Show the health of tracked extensions
    Status(StatusArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Install, run one maintenance cycle, then exit
    #[arg(long)]
    pub once: bool,

    /// Manifest URL, overriding configuration and the alpha flag
    #[arg(long)]
    pub manifest_url: Option<Url>,

    /// Bundled package directory
    #[arg(long)]
    pub bundled_dir: Option<Utf8PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ManifestCommands {
    /// Fetch or read a manifest and report which entries are accepted
    Check(ManifestCheckArgs),
}

#[derive(Args, Debug)]
pub struct ManifestCheckArgs {
    /// Manifest URL or local file path
    pub source: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
