use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::clienv;

const DEFAULT_BINARY_NAME: &str = "goipfs";
const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Host settings for warden itself. The node's own JSON config is handled by
/// [`crate::config_store::ConfigStore`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WardenSettings {
    /// App-private root holding the node's working directory
    pub data_root: Option<PathBuf>,
    /// Directory the node binary is installed into (default: <data_root>/files)
    pub files_dir: Option<PathBuf>,
    /// Directory holding the bundled `arm` and `386` binaries (default: <data_root>/assets)
    pub assets_dir: Option<PathBuf>,
    /// File name of the installed binary (default: "goipfs")
    pub binary_name: Option<String>,
    /// CPU ABI override (e.g., "arm64-v8a", "x86_64")
    pub abi: Option<String>,
    /// Seconds to wait after SIGTERM before killing the daemon
    pub stop_timeout_secs: Option<u64>,
    /// Cap on buffered node log lines; unset keeps every line
    pub max_log_lines: Option<usize>,
    /// Origins allowed in addition to the required ones
    pub extra_origins: Vec<String>,
}

impl WardenSettings {
    /// $WARDEN_CONFIG_DIR/config.toml or ~/.config/warden/config.toml
    pub fn settings_path() -> PathBuf {
        clienv::config_dir().join("config.toml")
    }

    /// Load settings from the default location, then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::settings_path())?;
        settings.apply_env();
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::trace!(path = %path.display(), "Loading settings");

        if !path.exists() {
            tracing::trace!("Settings file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;

        tracing::trace!(data_root = ?settings.data_root, abi = ?settings.abi, "Settings loaded");
        Ok(settings)
    }

    /// Environment variables take precedence over the settings file.
    pub fn apply_env(&mut self) {
        if let Some(root) = clienv::data_root() {
            self.data_root = Some(root);
        }
        if let Some(dir) = clienv::files_dir() {
            self.files_dir = Some(dir);
        }
        if let Some(dir) = clienv::assets_dir() {
            self.assets_dir = Some(dir);
        }
        if let Some(abi) = clienv::abi() {
            self.abi = Some(abi);
        }
    }

    /// Command-line flags take precedence over everything else.
    pub fn with_cli_overrides(mut self, abi: Option<String>, data_root: Option<PathBuf>) -> Self {
        if abi.is_some() {
            self.abi = abi;
        }
        if data_root.is_some() {
            self.data_root = data_root;
        }
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS))
    }

    /// The ABI to install for: configured override, else the host's.
    pub fn resolved_abi(&self) -> String {
        self.abi
            .clone()
            .unwrap_or_else(crate::installer::host_abi)
    }

    pub fn paths(&self) -> NodePaths {
        let data_root = self
            .data_root
            .clone()
            .unwrap_or_else(clienv::default_data_root);
        let files_dir = self
            .files_dir
            .clone()
            .unwrap_or_else(|| data_root.join("files"));
        let assets_dir = self
            .assets_dir
            .clone()
            .unwrap_or_else(|| data_root.join("assets"));
        let binary_name = self
            .binary_name
            .as_deref()
            .unwrap_or(DEFAULT_BINARY_NAME);

        NodePaths::new(&data_root, &files_dir, &assets_dir, binary_name)
    }
}

/// Filesystem layout of one node installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePaths {
    /// The node's working directory, exported as `IPFS_PATH`
    pub ipfs_path: PathBuf,
    /// JSON config owned by the node
    pub config_path: PathBuf,
    /// Installed executable
    pub binary_path: PathBuf,
    pub assets_dir: PathBuf,
}

impl NodePaths {
    pub fn new(data_root: &Path, files_dir: &Path, assets_dir: &Path, binary_name: &str) -> Self {
        let ipfs_path = data_root.join("ipfs");
        Self {
            config_path: ipfs_path.join("config"),
            ipfs_path,
            binary_path: files_dir.join(binary_name),
            assets_dir: assets_dir.to_path_buf(),
        }
    }
}
