mod args;
mod commands;

use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use warden::WardenSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let settings = WardenSettings::load()?.with_cli_overrides(cli.abi, cli.data_root);

    match cli.command {
        Commands::Serve => commands::serve::cmd_serve(&settings).await?,
        Commands::Install => commands::install::cmd_install(&settings).await?,
        Commands::Configure => commands::config::cmd_configure(&settings).await?,
        Commands::Config => commands::config::cmd_show(&settings).await?,
        Commands::Arch => commands::install::cmd_arch(&settings),
        Commands::Completions { shell } => commands::completions::cmd_completions(shell),
    }

    Ok(())
}

/// Logs go to stderr; stdout carries node output.
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
