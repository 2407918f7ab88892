use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use warden::{BinaryInstaller, BinaryVariant, Installer, WardenSettings};

pub(crate) async fn cmd_install(settings: &WardenSettings) -> Result<()> {
    let paths = settings.paths();
    let installer = BinaryInstaller::new(
        settings.resolved_abi(),
        &paths.assets_dir,
        &paths.binary_path,
    );

    let pb = create_progress_bar(&format!("Installing node binary for {}", installer.abi()));

    let result = installer.install().await;

    pb.finish_with_message(match &result {
        Ok(binary) => format!(
            "Installed {} binary at {}",
            binary.variant.asset_name(),
            binary.path.display()
        ),
        Err(e) => format!("Failed: {}", e),
    });

    result?;
    Ok(())
}

pub(crate) fn cmd_arch(settings: &WardenSettings) {
    let abi = settings.resolved_abi();
    match BinaryVariant::for_abi(&abi) {
        Ok(variant) => println!("{} -> {}", abi, variant.asset_name()),
        Err(e) => println!("{} -> {}", abi, e),
    }
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
