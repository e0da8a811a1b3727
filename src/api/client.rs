use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::http::{send_with_retry, RetryPolicy};

/// Default request timeout in seconds
pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Timeout for reachability checks
const PROBE_TIMEOUT_SECS: u64 = 5;

/// Client name sent in the authorization header
pub const CLIENT_NAME: &str = "mediaboot";

/// Client version (from Cargo.toml)
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A response came back with a non-success status.
///
/// Displays as `"<code> <reason>"`, e.g. `503 Service Unavailable`.
#[derive(Debug, Error)]
#[error("{status}")]
pub struct HttpStatusError {
    pub status: StatusCode,
}

/// Identity of this client installation.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub id: String,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// HTTP client for the media server API.
pub struct ApiClient {
    client: Client,
    ping_client: Client,
    device: DeviceInfo,
}

impl ApiClient {
    pub fn new(device: DeviceInfo) -> Result<Self> {
        let user_agent = format!("{}/{}", CLIENT_NAME, CLIENT_VERSION);

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .user_agent(user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        let ping_client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP ping client")?;

        Ok(Self {
            client,
            ping_client,
            device,
        })
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Join `endpoint` onto `base`, treating `base` as a directory.
    pub fn build_url(base: &Url, endpoint: &str) -> Result<Url> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(endpoint.trim_start_matches('/'))
            .with_context(|| format!("Failed to build URL for endpoint: {}", endpoint))
    }

    /// `MediaBrowser Client="…", Device="…", DeviceId="…", Version="…"[, Token="…"]`
    pub fn authorization_header(&self, access_token: Option<&str>) -> String {
        let mut header = format!(
            "MediaBrowser Client=\"{}\", Device=\"{}\", DeviceId=\"{}\", Version=\"{}\"",
            CLIENT_NAME, self.device.name, self.device.id, CLIENT_VERSION
        );
        if let Some(token) = access_token {
            header.push_str(&format!(", Token=\"{}\"", token));
        }
        header
    }

    /// GET `url` with the default retry policy, returning the body text.
    ///
    /// Non-success statuses become an [`HttpStatusError`].
    pub async fn get_text(&self, url: &Url, access_token: Option<&str>) -> Result<String> {
        self.get_text_with(url, access_token, RetryPolicy::default())
            .await
    }

    pub(super) async fn get_text_with(
        &self,
        url: &Url,
        access_token: Option<&str>,
        retry: RetryPolicy,
    ) -> Result<String> {
        debug!("GET {}", url);

        let authorization = self.authorization_header(access_token);
        let response = send_with_retry(retry, || {
            self.client
                .get(url.clone())
                .header("Authorization", &authorization)
        })
        .await
        .with_context(|| format!("Failed to send request to {}", url))?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);

        if !status.is_success() {
            return Err(HttpStatusError { status }.into());
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))
    }

    /// Single short GET; true when the server answered with a success status.
    pub async fn ping(&self, url: &Url) -> bool {
        let result = send_with_retry(RetryPolicy::none(), || {
            self.ping_client
                .get(url.clone())
                .header("Authorization", self.authorization_header(None))
        })
        .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!("Probe {} answered {}", url, response.status());
                false
            }
            Err(e) => {
                debug!("Probe {} failed: {:#}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(DeviceInfo::new("test-host", "device-1")).unwrap()
    }

    #[test]
    fn test_build_url() {
        let base = Url::parse("https://media.example.net").unwrap();
        let url = ApiClient::build_url(&base, "Branding/Css").unwrap();
        assert_eq!(url.as_str(), "https://media.example.net/Branding/Css");

        let base = Url::parse("https://example.net/jellyfin").unwrap();
        let url = ApiClient::build_url(&base, "/System/Info/Public").unwrap();
        assert_eq!(url.as_str(), "https://example.net/jellyfin/System/Info/Public");
    }

    #[test]
    fn test_authorization_header() {
        let client = client();
        let anonymous = client.authorization_header(None);
        assert!(anonymous.starts_with("MediaBrowser Client=\"mediaboot\""));
        assert!(anonymous.contains("DeviceId=\"device-1\""));
        assert!(!anonymous.contains("Token="));

        let authed = client.authorization_header(Some("abc"));
        assert!(authed.ends_with(", Token=\"abc\""));
    }

    #[test]
    fn test_http_status_error_display() {
        let err = HttpStatusError {
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(err.to_string(), "503 Service Unavailable");
    }
}
