use anyhow::{Context, Result};
use warden::{ConfigStore, CorsPolicy, WardenSettings};

/// Only safe while no daemon is running against the same node directory.
pub(crate) async fn cmd_configure(settings: &WardenSettings) -> Result<()> {
    let paths = settings.paths();
    let store = ConfigStore::new(&paths.config_path);
    let policy = CorsPolicy::default().with_origins(settings.extra_origins.iter().cloned());

    store
        .patch(|config| policy.apply(config))
        .await
        .with_context(|| format!("Failed to patch {}", store.path().display()))?;

    println!("Patched {}", store.path().display());
    Ok(())
}

pub(crate) async fn cmd_show(settings: &WardenSettings) -> Result<()> {
    let store = ConfigStore::new(settings.paths().config_path);
    let config = store.read().await?;
    eprintln!("# {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
