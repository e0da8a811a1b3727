//! Server connection and API session.
//!
//! Resolves which server to talk to, opens an API session for it, and
//! raises sign-in/sign-out events. Startup only sees the
//! [`ConnectionProvider`] and [`ApiSession`] traits.

mod credentials;

pub use credentials::CredentialStore;

use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::ApiClient;
use crate::events::{Event, EventBus, EventSource};
use crate::settings::WebConfigFile;

/// Endpoint answering anonymously when a server is up
pub const PUBLIC_INFO_PATH: &str = "System/Info/Public";

/// Endpoint used to confirm the realtime channel
pub const PING_PATH: &str = "System/Ping";

/// An API session bound to one server.
#[async_trait]
pub trait ApiSession: Send + Sync {
    fn server_url(&self) -> &Url;

    /// Absolute URL for an API path on this session's server.
    fn get_url(&self, path: &str) -> Result<Url>;

    /// Re-establish the realtime channel if it is down.
    async fn ensure_realtime_channel(&self) -> Result<()>;
}

/// Server resolution and session ownership.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Pick the server to connect to; `None` means run without one.
    async fn resolve_server_address(&self) -> Result<Option<Url>>;

    /// Open a session for `address`, replacing any existing one.
    async fn init_session(&self, address: &Url) -> Result<()>;

    fn current_session(&self) -> Option<Arc<dyn ApiSession>>;
}

/// Session over the HTTP API.
pub struct HttpSession {
    api: Arc<ApiClient>,
    server_url: Url,
    access_token: Option<String>,
    realtime_confirmed_at: Mutex<Option<DateTime<Utc>>>,
}

impl HttpSession {
    pub fn new(api: Arc<ApiClient>, server_url: Url, access_token: Option<String>) -> Self {
        Self {
            api,
            server_url,
            access_token,
            realtime_confirmed_at: Mutex::new(None),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// When the realtime channel was last confirmed, if ever.
    pub fn realtime_confirmed_at(&self) -> Option<DateTime<Utc>> {
        *self
            .realtime_confirmed_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ApiSession for HttpSession {
    fn server_url(&self) -> &Url {
        &self.server_url
    }

    fn get_url(&self, path: &str) -> Result<Url> {
        ApiClient::build_url(&self.server_url, path)
    }

    async fn ensure_realtime_channel(&self) -> Result<()> {
        let url = self.get_url(PING_PATH)?;
        self.api
            .get_text(&url, self.access_token())
            .await
            .with_context(|| format!("Realtime channel to {} unavailable", self.server_url))?;

        let now = Utc::now();
        *self
            .realtime_confirmed_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(now);
        debug!("Realtime channel confirmed at {}", now.to_rfc3339());
        Ok(())
    }
}

/// Connection manager for the HTTP API.
pub struct ServerConnections {
    api: Arc<ApiClient>,
    explicit_server: Option<String>,
    web_config: Option<Arc<WebConfigFile>>,
    credentials: CredentialStore,
    events: EventBus,
    session: RwLock<Option<Arc<HttpSession>>>,
}

impl ServerConnections {
    pub fn new(
        api: Arc<ApiClient>,
        explicit_server: Option<String>,
        web_config: Option<Arc<WebConfigFile>>,
        credentials: CredentialStore,
        events: EventBus,
    ) -> Self {
        Self {
            api,
            explicit_server,
            web_config,
            credentials,
            events,
            session: RwLock::new(None),
        }
    }

    /// The current session, with its concrete token and realtime state.
    pub fn session(&self) -> Option<Arc<HttpSession>> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace_session(&self, session: Option<Arc<HttpSession>>) {
        *self
            .session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session;
    }

    /// Store credentials for the current server and announce the sign-in.
    pub async fn sign_in(&self, user_id: &str, access_token: &str) -> Result<()> {
        let session = self
            .session()
            .context("Cannot sign in without a server session")?;
        let server = session.server_url().clone();

        self.credentials
            .save(server.as_str(), access_token, Some(user_id))?;
        self.replace_session(Some(Arc::new(HttpSession::new(
            self.api.clone(),
            server,
            Some(access_token.to_string()),
        ))));

        info!("User {} signed in", user_id);
        self.events
            .trigger(
                EventSource::ServerConnections,
                Event::LocalUserSignedIn {
                    user_id: user_id.to_string(),
                },
            )
            .await;
        Ok(())
    }

    /// Forget credentials for the current server and announce the sign-out.
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session() else {
            debug!("Sign out requested without a session");
            return Ok(());
        };
        let server = session.server_url().clone();

        self.credentials.remove(server.as_str())?;
        self.replace_session(Some(Arc::new(HttpSession::new(
            self.api.clone(),
            server,
            None,
        ))));

        info!("User signed out");
        self.events
            .trigger(EventSource::ServerConnections, Event::LocalUserSignedOut)
            .await;
        Ok(())
    }

    async fn first_reachable(&self, servers: &[String]) -> Option<Url> {
        for server in servers {
            let base = match Url::parse(server) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping invalid server address {}: {}", server, e);
                    continue;
                }
            };

            let info_url = match ApiClient::build_url(&base, PUBLIC_INFO_PATH) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping server {}: {:#}", server, e);
                    continue;
                }
            };

            if self.api.ping(&info_url).await {
                debug!("Server {} is reachable", base);
                return Some(base);
            }
            debug!("Server {} did not answer", base);
        }
        None
    }
}

#[async_trait]
impl ConnectionProvider for ServerConnections {
    async fn resolve_server_address(&self) -> Result<Option<Url>> {
        if let Some(server) = &self.explicit_server {
            let url = Url::parse(server)
                .with_context(|| format!("Invalid server address: {}", server))?;
            return Ok(Some(url));
        }

        let Some(web_config) = &self.web_config else {
            return Ok(None);
        };

        let config = web_config.config().await?;
        if !config.multiserver || config.servers.is_empty() {
            debug!("No server configured");
            return Ok(None);
        }

        Ok(self.first_reachable(&config.servers).await)
    }

    async fn init_session(&self, address: &Url) -> Result<()> {
        let token = self.credentials.access_token(address.as_str())?;
        if token.is_none() {
            debug!("No stored credentials for {}", address);
        }

        self.replace_session(Some(Arc::new(HttpSession::new(
            self.api.clone(),
            address.clone(),
            token,
        ))));
        info!("🔗 API session initialized for {}", address);
        Ok(())
    }

    fn current_session(&self) -> Option<Arc<dyn ApiSession>> {
        self.session().map(|s| s as Arc<dyn ApiSession>)
    }
}
