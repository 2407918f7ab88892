use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("unsupported ABI: {abi}")]
    UnsupportedArchitecture { abi: String },

    #[error("failed to copy binary asset to {}: {source}", path.display())]
    AssetCopyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("node config at {} is unreadable: {detail}", path.display())]
    ConfigUnreadable { path: PathBuf, detail: String },

    #[error("failed to write node config to {}: {source}", path.display())]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An existing key holds a value of another JSON type.
    #[error("config key '{key}' is not {expected}")]
    UnexpectedConfigShape { key: String, expected: &'static str },

    #[error("failed to launch {}: {source}", binary.display())]
    LaunchFailed {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WardenError {
    /// Short machine-readable slug, used when reporting failures to a host.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::UnsupportedArchitecture { .. } => "unsupported-architecture",
            Self::AssetCopyFailed { .. } => "asset-copy-failed",
            Self::ConfigUnreadable { .. } => "config-unreadable",
            Self::ConfigWriteFailed { .. } => "config-write-failed",
            Self::UnexpectedConfigShape { .. } => "config-shape",
            Self::LaunchFailed { .. } => "launch-failed",
            Self::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_architecture_message() {
        let err = WardenError::UnsupportedArchitecture {
            abi: "mips".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported ABI: mips");
        assert_eq!(err.slug(), "unsupported-architecture");
    }

    #[test]
    fn test_io_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: WardenError = io.into();
        assert_eq!(err.slug(), "io");
    }
}
