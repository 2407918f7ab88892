use std::path::PathBuf;

const WARDEN_CONFIG_DIR: &str = "WARDEN_CONFIG_DIR";
const WARDEN_DATA_ROOT: &str = "WARDEN_DATA_ROOT";
const WARDEN_FILES_DIR: &str = "WARDEN_FILES_DIR";
const WARDEN_ASSETS_DIR: &str = "WARDEN_ASSETS_DIR";
const WARDEN_ABI: &str = "WARDEN_ABI";

const FALLBACK_CONFIG_DIR: &str = "~/.config";
const FALLBACK_DATA_DIR: &str = "~/.local/share";
const WARDEN_SUBDIR: &str = "warden";

/// Non-empty value of an environment variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Warden config directory ($WARDEN_CONFIG_DIR or ~/.config/warden)
pub fn config_dir() -> PathBuf {
    let dir = env_opt(WARDEN_CONFIG_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from(FALLBACK_CONFIG_DIR))
                .join(WARDEN_SUBDIR)
        });
    tracing::trace!(dir = %dir.display(), "Resolved config directory");
    dir
}

/// Default data root (~/.local/share/warden)
pub fn default_data_root() -> PathBuf {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
        .join(WARDEN_SUBDIR);
    tracing::trace!(dir = %dir.display(), "Resolved default data root");
    dir
}

/// Data root override ($WARDEN_DATA_ROOT)
pub fn data_root() -> Option<PathBuf> {
    let val = env_opt(WARDEN_DATA_ROOT).map(PathBuf::from);
    tracing::trace!(value = ?val, "WARDEN_DATA_ROOT env var");
    val
}

/// Private files directory override ($WARDEN_FILES_DIR)
pub fn files_dir() -> Option<PathBuf> {
    let val = env_opt(WARDEN_FILES_DIR).map(PathBuf::from);
    tracing::trace!(value = ?val, "WARDEN_FILES_DIR env var");
    val
}

/// Bundled assets directory override ($WARDEN_ASSETS_DIR)
pub fn assets_dir() -> Option<PathBuf> {
    let val = env_opt(WARDEN_ASSETS_DIR).map(PathBuf::from);
    tracing::trace!(value = ?val, "WARDEN_ASSETS_DIR env var");
    val
}

/// ABI override ($WARDEN_ABI)
pub fn abi() -> Option<String> {
    let val = env_opt(WARDEN_ABI);
    tracing::trace!(value = ?val, "WARDEN_ABI env var");
    val
}
