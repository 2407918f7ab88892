use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, WardenError};

/// Prebuilt node executables shipped as bundled assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryVariant {
    Arm,
    X86,
}

impl BinaryVariant {
    /// Selects the variant by ABI prefix: `arm*` or `x86*`.
    pub fn for_abi(abi: &str) -> Result<Self> {
        if abi.starts_with("arm") {
            Ok(Self::Arm)
        } else if abi.starts_with("x86") {
            Ok(Self::X86)
        } else {
            Err(WardenError::UnsupportedArchitecture {
                abi: abi.to_string(),
            })
        }
    }

    /// Name of the bundled asset holding this variant.
    pub fn asset_name(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::X86 => "386",
        }
    }
}

/// The host CPU expressed in Android ABI terms.
pub fn host_abi() -> String {
    abi_for_arch(std::env::consts::ARCH)
}

fn abi_for_arch(arch: &str) -> String {
    match arch {
        "aarch64" => "arm64-v8a",
        "arm" => "armeabi-v7a",
        "x86_64" => "x86_64",
        "x86" => "x86",
        other => other,
    }
    .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledBinary {
    pub path: PathBuf,
    pub variant: BinaryVariant,
}

/// Puts an executable node binary in place.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self) -> Result<InstalledBinary>;
}

/// Copies the ABI-matched asset from the bundled assets directory to the
/// binary path, replacing whatever was there.
pub struct BinaryInstaller {
    abi: String,
    assets_dir: PathBuf,
    target: PathBuf,
}

impl BinaryInstaller {
    pub fn new(abi: impl Into<String>, assets_dir: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            abi: abi.into(),
            assets_dir: assets_dir.into(),
            target: target.into(),
        }
    }

    pub fn abi(&self) -> &str {
        &self.abi
    }

    pub fn variant(&self) -> Result<BinaryVariant> {
        BinaryVariant::for_abi(&self.abi)
    }

    async fn copy_asset(&self, variant: BinaryVariant) -> Result<u64> {
        let asset = self.assets_dir.join(variant.asset_name());

        // Both handles are dropped, and so closed, on every return path.
        let mut input = File::open(&asset).await.map_err(copy_failed(&asset))?;

        if let Some(parent) = self.target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(copy_failed(&self.target))?;
        }

        match fs::remove_file(&self.target).await {
            Ok(()) => debug!("Removed previous binary at {}", self.target.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(copy_failed(&self.target)(e)),
        }

        let mut output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.target)
            .await
            .map_err(copy_failed(&self.target))?;

        let bytes = tokio::io::copy(&mut input, &mut output)
            .await
            .map_err(copy_failed(&self.target))?;
        output.flush().await.map_err(copy_failed(&self.target))?;
        output.sync_all().await.map_err(copy_failed(&self.target))?;

        // Executing a file that is still open for writing fails with ETXTBSY.
        drop(output.into_std().await);

        Ok(bytes)
    }

    async fn mark_executable(&self) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            fs::set_permissions(&self.target, perms)
                .await
                .map_err(copy_failed(&self.target))?;
        }
        Ok(())
    }
}

fn copy_failed(path: &Path) -> impl FnOnce(std::io::Error) -> WardenError {
    let path = path.to_path_buf();
    move |source| WardenError::AssetCopyFailed { path, source }
}

#[async_trait]
impl Installer for BinaryInstaller {
    async fn install(&self) -> Result<InstalledBinary> {
        let variant = self.variant()?;
        debug!(abi = %self.abi, asset = variant.asset_name(), "Selected binary variant");

        let bytes = self.copy_asset(variant).await?;
        self.mark_executable().await?;

        info!(
            "Installed {} binary ({} bytes) at {}",
            variant.asset_name(),
            bytes,
            self.target.display()
        );

        Ok(InstalledBinary {
            path: self.target.clone(),
            variant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets(dir: &Path) -> PathBuf {
        let assets = dir.join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("arm"), b"arm-binary").unwrap();
        std::fs::write(assets.join("386"), b"x86-binary-contents").unwrap();
        assets
    }

    #[test]
    fn test_variant_selection() {
        assert_eq!(BinaryVariant::for_abi("armeabi-v7a").unwrap(), BinaryVariant::Arm);
        assert_eq!(BinaryVariant::for_abi("arm64-v8a").unwrap(), BinaryVariant::Arm);
        assert_eq!(BinaryVariant::for_abi("x86").unwrap(), BinaryVariant::X86);
        assert_eq!(BinaryVariant::for_abi("x86_64").unwrap(), BinaryVariant::X86);
        assert_eq!(BinaryVariant::Arm.asset_name(), "arm");
        assert_eq!(BinaryVariant::X86.asset_name(), "386");
    }

    #[test]
    fn test_unsupported_abi() {
        for abi in ["mips", "riscv64", "", "ARM64"] {
            let err = BinaryVariant::for_abi(abi).unwrap_err();
            assert!(matches!(err, WardenError::UnsupportedArchitecture { .. }), "{abi}");
        }
    }

    #[test]
    fn test_host_arch_mapping() {
        assert_eq!(abi_for_arch("aarch64"), "arm64-v8a");
        assert_eq!(abi_for_arch("arm"), "armeabi-v7a");
        assert_eq!(abi_for_arch("x86_64"), "x86_64");
        assert_eq!(abi_for_arch("riscv64"), "riscv64");
    }

    #[tokio::test]
    async fn test_install_twice_replaces_binary() {
        let dir = tempfile::tempdir().unwrap();
        let assets = assets(dir.path());
        let target = dir.path().join("files").join("goipfs");

        let installer = BinaryInstaller::new("arm64-v8a", &assets, &target);
        installer.install().await.unwrap();

        std::fs::write(&target, b"stale and much longer than the real binary").unwrap();
        let installed = installer.install().await.unwrap();

        assert_eq!(installed.path, target);
        assert_eq!(installed.variant, BinaryVariant::Arm);
        assert_eq!(std::fs::read(&target).unwrap(), b"arm-binary");

        let entries = std::fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[tokio::test]
    async fn test_install_x86_variant() {
        let dir = tempfile::tempdir().unwrap();
        let assets = assets(dir.path());
        let target = dir.path().join("goipfs");

        BinaryInstaller::new("x86_64", &assets, &target)
            .install()
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"x86-binary-contents");
    }

    #[tokio::test]
    async fn test_unsupported_abi_leaves_target_alone() {
        let dir = tempfile::tempdir().unwrap();
        let assets = assets(dir.path());
        let target = dir.path().join("goipfs");
        std::fs::write(&target, b"previous").unwrap();

        let err = BinaryInstaller::new("mips", &assets, &target)
            .install()
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::UnsupportedArchitecture { .. }));
        assert_eq!(std::fs::read(&target).unwrap(), b"previous");
    }

    #[tokio::test]
    async fn test_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("goipfs");

        let err = BinaryInstaller::new("x86", dir.path().join("nowhere"), &target)
            .install()
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::AssetCopyFailed { .. }));
    }
}
