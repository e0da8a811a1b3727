//! Stored server credentials.
//!
//! Persists one entry per server in `<data-dir>/credentials.json`. The
//! `MEDIABOOT_ACCESS_TOKEN` environment variable, when set, supplies the
//! token for whichever server is being connected to.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Environment variable overriding the stored access token
pub const ACCESS_TOKEN_ENV: &str = "MEDIABOOT_ACCESS_TOKEN";

/// One server's credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCredentials {
    pub url: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub date_last_accessed: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    servers: Vec<ServerCredentials>,
}

/// Credentials store backed by credentials.json
pub struct CredentialStore {
    path: PathBuf,
}

fn normalize(url: &str) -> &str {
    url.trim_end_matches('/')
}

impl CredentialStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            path: data_dir.join("credentials.json"),
        }
    }

    fn read(&self) -> Result<CredentialsFile> {
        if !self.path.exists() {
            return Ok(CredentialsFile::default());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials file: {:?}", self.path))?;

        match serde_json::from_str(&content) {
            Ok(file) => Ok(file),
            Err(e) => {
                warn!("Invalid credentials file, ignoring it: {}", e);
                Ok(CredentialsFile::default())
            }
        }
    }

    fn write(&self, file: &CredentialsFile) -> Result<()> {
        let content =
            serde_json::to_string_pretty(file).context("Failed to serialize credentials")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write credentials file: {:?}", self.path))?;
        debug!("Credentials saved to {:?}", self.path);
        Ok(())
    }

    /// Access token for `server_url`.
    ///
    /// Priority:
    /// 1. MEDIABOOT_ACCESS_TOKEN environment variable
    /// 2. credentials.json entry for the server
    pub fn access_token(&self, server_url: &str) -> Result<Option<String>> {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                return Ok(Some(token));
            }
        }

        Ok(self.get(server_url)?.map(|c| c.access_token))
    }

    pub fn get(&self, server_url: &str) -> Result<Option<ServerCredentials>> {
        let file = self.read()?;
        Ok(file
            .servers
            .into_iter()
            .find(|c| normalize(&c.url) == normalize(server_url)))
    }

    /// Insert or replace the entry for `server_url`.
    pub fn save(&self, server_url: &str, access_token: &str, user_id: Option<&str>) -> Result<()> {
        let mut file = self.read()?;
        file.servers
            .retain(|c| normalize(&c.url) != normalize(server_url));
        file.servers.push(ServerCredentials {
            url: normalize(server_url).to_string(),
            access_token: access_token.to_string(),
            user_id: user_id.map(ToOwned::to_owned),
            date_last_accessed: Utc::now(),
        });
        self.write(&file)?;
        info!("Credentials saved for {}", server_url);
        Ok(())
    }

    /// Drop the entry for `server_url`, if any.
    pub fn remove(&self, server_url: &str) -> Result<bool> {
        let mut file = self.read()?;
        let before = file.servers.len();
        file.servers
            .retain(|c| normalize(&c.url) != normalize(server_url));
        let removed = file.servers.len() != before;
        if removed {
            self.write(&file)?;
            info!("Credentials removed for {}", server_url);
        }
        Ok(removed)
    }
}
