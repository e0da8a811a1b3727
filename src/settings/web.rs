//! Web configuration (`config.json`).
//!
//! The web config ships next to the client assets and names the servers a
//! multiserver build may connect to plus the plugins to load at startup. It
//! is read once and cached for the lifetime of the process.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

/// Contents of config.json
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebConfig {
    /// Whether the client may pick among several servers
    #[serde(default)]
    pub multiserver: bool,
    /// Candidate server addresses, in preference order
    #[serde(default)]
    pub servers: Vec<String>,
    /// Plugin identifiers, in load order
    #[serde(default)]
    pub plugins: Vec<String>,
}

/// Source of the remote plugin list.
#[async_trait]
pub trait WebSettings: Send + Sync {
    async fn list_plugins(&self) -> Result<Vec<String>>;
}

/// config.json read from disk on first use.
pub struct WebConfigFile {
    path: PathBuf,
    config: OnceCell<WebConfig>,
}

impl WebConfigFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            config: OnceCell::new(),
        }
    }

    /// Load (once) and return the parsed config.
    pub async fn config(&self) -> Result<&WebConfig> {
        self.config
            .get_or_try_init(|| async {
                let content = tokio::fs::read_to_string(&self.path)
                    .await
                    .with_context(|| format!("Failed to read web config: {:?}", self.path))?;
                let config: WebConfig = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse web config: {:?}", self.path))?;
                debug!(
                    "Loaded web config: {} server(s), {} plugin(s)",
                    config.servers.len(),
                    config.plugins.len()
                );
                Ok::<_, anyhow::Error>(config)
            })
            .await
    }
}

#[async_trait]
impl WebSettings for WebConfigFile {
    async fn list_plugins(&self) -> Result<Vec<String>> {
        Ok(self.config().await?.plugins.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_list_plugins_from_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "multiserver": true,
                "servers": ["https://media.example.net"],
                "plugins": ["playAccessValidation/plugin", "sessionPlayer/plugin"]
            }"#,
        )
        .unwrap();

        let settings = WebConfigFile::new(path);
        let plugins = settings.list_plugins().await.unwrap();
        assert_eq!(
            plugins,
            vec!["playAccessValidation/plugin", "sessionPlayer/plugin"]
        );
        assert!(settings.config().await.unwrap().multiserver);
    }

    #[tokio::test]
    async fn test_missing_fields_default() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();

        let file = WebConfigFile::new(path);
        let config = file.config().await.unwrap();
        assert!(!config.multiserver);
        assert!(config.servers.is_empty());
        assert!(config.plugins.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let tmp = tempdir().unwrap();
        let settings = WebConfigFile::new(tmp.path().join("absent.json"));
        assert!(settings.list_plugins().await.is_err());
    }
}
