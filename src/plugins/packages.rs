use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Runs after every plugin batch.
#[async_trait]
pub trait PackageManager: Send + Sync {
    async fn init(&self) -> Result<()>;
}

/// Installed package entry in packages.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPackage {
    pub name: String,
    pub manifest_url: String,
}

/// Package list persisted in `<data-dir>/packages.json`.
pub struct LocalPackageManager {
    path: PathBuf,
    installed: Mutex<Vec<InstalledPackage>>,
}

impl LocalPackageManager {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            path: data_dir.join("packages.json"),
            installed: Mutex::new(Vec::new()),
        }
    }

    pub fn installed(&self) -> Vec<InstalledPackage> {
        self.installed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PackageManager for LocalPackageManager {
    async fn init(&self) -> Result<()> {
        let packages: Vec<InstalledPackage> = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse package list: {:?}", self.path))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No package list at {:?}", self.path);
                Vec::new()
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read package list: {:?}", self.path))
            }
        };

        info!("📦 Package manager ready ({} installed)", packages.len());
        *self
            .installed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = packages;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_without_package_list() {
        let tmp = tempdir().unwrap();
        let manager = LocalPackageManager::new(tmp.path().to_path_buf());
        manager.init().await.unwrap();
        assert!(manager.installed().is_empty());
    }

    #[tokio::test]
    async fn test_init_reads_package_list() {
        let tmp = tempdir().unwrap();
        std::fs::write(
            tmp.path().join("packages.json"),
            r#"[{"name": "theme", "manifestUrl": "https://example.net/theme.json"}]"#,
        )
        .unwrap();

        let manager = LocalPackageManager::new(tmp.path().to_path_buf());
        manager.init().await.unwrap();
        let installed = manager.installed();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].name, "theme");
    }

    #[tokio::test]
    async fn test_init_rejects_malformed_list() {
        let tmp = tempdir().unwrap();
        std::fs::write(tmp.path().join("packages.json"), "{").unwrap();
        let manager = LocalPackageManager::new(tmp.path().to_path_buf());
        assert!(manager.init().await.is_err());
    }
}
