use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "warden")]
#[command(version)]
#[command(about = "Installs, configures and supervises a local IPFS node", long_about = None)]
pub(crate) struct Cli {
    /// Override the CPU ABI (e.g., arm64-v8a, x86_64). Can also be set via WARDEN_ABI env var.
    #[arg(long, global = true)]
    pub abi: Option<String>,

    /// Override the data root holding the node directory. Can also be set via WARDEN_DATA_ROOT.
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Install and start the node, then read lifecycle actions (start, stop, restart, exit) from stdin
    Serve,

    /// Install the node binary for this architecture
    Install,

    /// Apply the API header patch to an existing node config
    Configure,

    /// Print the node config
    Config,

    /// Print the resolved ABI and binary variant
    Arch,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
