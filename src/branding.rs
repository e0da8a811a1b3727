//! Branding stylesheet.
//!
//! The server's branding CSS is fetched once per applier and layered under
//! the user's custom CSS in a single `<style id="cssBranding">` element. Every
//! trigger recomputes the whole payload and overwrites the element, so the
//! last trigger wins and repeated triggers are harmless.
//!
//! The fetch happens on the first trigger even while custom CSS is disabled,
//! so re-enabling it later does not wait on the server.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::api::{HttpStatusError, TextFetcher};
use crate::connection::ApiSession;
use crate::events::{Event, EventBus, EventKind, EventSource};
use crate::host::Document;
use crate::settings::{UserSettings, PROP_CUSTOM_CSS, PROP_DISABLE_CUSTOM_CSS};

/// Id of the injected style element
pub const BRANDING_STYLE_ID: &str = "cssBranding";

/// Server endpoint serving branding CSS
pub const BRANDING_CSS_PATH: &str = "Branding/Css";

pub struct BrandingApplier {
    session: Arc<dyn ApiSession>,
    fetcher: Arc<dyn TextFetcher>,
    settings: Arc<dyn UserSettings>,
    document: Arc<dyn Document>,
    branding_css: OnceCell<Option<String>>,
}

impl BrandingApplier {
    pub fn new(
        session: Arc<dyn ApiSession>,
        fetcher: Arc<dyn TextFetcher>,
        settings: Arc<dyn UserSettings>,
        document: Arc<dyn Document>,
    ) -> Self {
        Self {
            session,
            fetcher,
            settings,
            document,
            branding_css: OnceCell::new(),
        }
    }

    /// Branding CSS, fetched on first use. `None` when the fetch failed.
    pub async fn branding_css(&self) -> Option<&str> {
        self.branding_css
            .get_or_init(|| self.fetch_branding_css())
            .await
            .as_deref()
    }

    async fn fetch_branding_css(&self) -> Option<String> {
        let result = match self.session.get_url(BRANDING_CSS_PATH) {
            Ok(url) => self.fetcher.fetch_text(&url).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(css) => {
                debug!("Fetched {} bytes of branding css", css.len());
                Some(css)
            }
            Err(e) => {
                match e.downcast_ref::<HttpStatusError>() {
                    Some(HttpStatusError { status }) => {
                        warn!("Error applying custom css: server answered {}", status)
                    }
                    None => warn!("Error applying custom css: {:#}", e),
                }
                None
            }
        }
    }

    /// Recompute the style payload and write it to the style element.
    ///
    /// Returns the written text.
    pub async fn handle_style_change(&self) -> String {
        let style = self.document.get_or_create_style(BRANDING_STYLE_ID);
        let branding = self.branding_css().await;

        let mut css: Vec<String> = Vec::with_capacity(2);
        if !self.settings.disable_custom_css() {
            if let Some(branding) = branding {
                css.push(branding.to_string());
            }
        }
        css.push(self.settings.custom_css());

        let text = css.join("\n");
        style.set_text_content(text.clone());
        text
    }

    /// Register the sign-in, sign-out and settings-change triggers.
    pub fn subscribe(self: &Arc<Self>, events: &EventBus) {
        for kind in [EventKind::LocalUserSignedIn, EventKind::LocalUserSignedOut] {
            let applier = self.clone();
            events.on(EventSource::ServerConnections, kind, move |_| {
                let applier = applier.clone();
                async move {
                    applier.handle_style_change().await;
                }
            });
        }

        let applier = self.clone();
        events.on(
            EventSource::UserSettings,
            EventKind::SettingChanged,
            move |event| {
                let applier = applier.clone();
                async move {
                    if let Event::SettingChanged { property } = event {
                        if property == PROP_DISABLE_CUSTOM_CSS || property == PROP_CUSTOM_CSS {
                            applier.handle_style_change().await;
                        }
                    }
                }
            },
        );
    }
}
