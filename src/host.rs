//! Host-side collaborators: the document, router, UI root, input helpers and
//! cast integration.
//!
//! [`HeadlessDocument`] implements the document-facing traits in memory; the
//! binary runs against it and tests inspect it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::connection::ApiSession;

/// Id of the container the UI is mounted into
pub const ROOT_CONTAINER_ID: &str = "reactRoot";

/// Shared handle to a `<style>` element's text.
#[derive(Debug, Clone, Default)]
pub struct StyleElement {
    text: Arc<Mutex<String>>,
}

impl StyleElement {
    pub fn set_text_content(&self, text: String) {
        *self
            .text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = text;
    }

    pub fn text_content(&self) -> String {
        self.text
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// The page the client runs in.
pub trait Document: Send + Sync {
    fn title(&self) -> String;
    fn set_title(&self, title: &str);

    /// Remove everything inside container `id` (the splash logo).
    fn clear_container(&self, id: &str);

    fn query_style(&self, id: &str) -> Option<StyleElement>;
    /// Style element `id`, appended to the body if it does not exist yet.
    ///
    /// Lookup and insertion happen under one lock, so concurrent callers share
    /// a single element.
    fn get_or_create_style(&self, id: &str) -> StyleElement;

    fn set_header_class(&self, class: &str, enabled: bool);
}

/// Client-side router.
#[async_trait]
pub trait Router: Send + Sync {
    async fn start(&self) -> Result<()>;
}

/// Root of the UI tree.
#[async_trait]
pub trait UiRoot: Send + Sync {
    /// Render the app into `container` inside a strict-mode boundary.
    async fn mount(&self, container: &str) -> Result<()>;
}

/// Keyboard navigation and auto-focus.
pub trait Navigation: Send + Sync {
    fn enable_keyboard_navigation(&self);
    fn enable_auto_focus(&self);
}

/// Cast integration started once the connection is known.
#[async_trait]
pub trait CastIntegration: Send + Sync {
    async fn initialize(&self, session: Option<Arc<dyn ApiSession>>);
}

/// Reconnects to a remembered cast target once a session exists.
pub struct AutoCast {
    target: Option<String>,
    active: Mutex<Option<String>>,
}

impl AutoCast {
    pub fn new(target: Option<String>) -> Self {
        Self {
            target,
            active: Mutex::new(None),
        }
    }

    /// Target autocast is watching for, if initialized with one.
    pub fn active_target(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl CastIntegration for AutoCast {
    async fn initialize(&self, session: Option<Arc<dyn ApiSession>>) {
        let (Some(session), Some(target)) = (session, self.target.as_ref()) else {
            debug!("Autocast idle");
            return;
        };

        info!("📺 Autocast watching for {} on {}", target, session.server_url());
        *self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(target.clone());
    }
}

#[derive(Debug, Default)]
struct DocumentState {
    title: String,
    cleared: Vec<String>,
    styles: HashMap<String, StyleElement>,
    styles_created: usize,
    header_classes: HashSet<String>,
    mounted: Vec<String>,
    router_started: bool,
    keyboard_navigation: bool,
    auto_focus: bool,
}

/// In-memory document, router and UI root.
#[derive(Debug, Default)]
pub struct HeadlessDocument {
    state: Mutex<DocumentState>,
}

impl HeadlessDocument {
    pub fn new(title: impl Into<String>) -> Self {
        let doc = Self::default();
        doc.lock().title = title.into();
        doc
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DocumentState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Containers mounted into, in order.
    pub fn mounted(&self) -> Vec<String> {
        self.lock().mounted.clone()
    }

    #[cfg(test)]
    pub fn cleared(&self) -> Vec<String> {
        self.lock().cleared.clone()
    }

    #[cfg(test)]
    pub fn styles_created(&self) -> usize {
        self.lock().styles_created
    }

    #[cfg(test)]
    pub fn has_header_class(&self, class: &str) -> bool {
        self.lock().header_classes.contains(class)
    }

    #[cfg(test)]
    pub fn router_started(&self) -> bool {
        self.lock().router_started
    }

    pub fn keyboard_navigation(&self) -> bool {
        self.lock().keyboard_navigation
    }

    pub fn auto_focus(&self) -> bool {
        self.lock().auto_focus
    }
}

impl Document for HeadlessDocument {
    fn title(&self) -> String {
        self.lock().title.clone()
    }

    fn set_title(&self, title: &str) {
        self.lock().title = title.to_string();
    }

    fn clear_container(&self, id: &str) {
        self.lock().cleared.push(id.to_string());
    }

    fn query_style(&self, id: &str) -> Option<StyleElement> {
        self.lock().styles.get(id).cloned()
    }

    fn get_or_create_style(&self, id: &str) -> StyleElement {
        let mut state = self.lock();
        let DocumentState {
            styles,
            styles_created,
            ..
        } = &mut *state;
        styles
            .entry(id.to_string())
            .or_insert_with(|| {
                *styles_created += 1;
                StyleElement::default()
            })
            .clone()
    }

    fn set_header_class(&self, class: &str, enabled: bool) {
        let mut state = self.lock();
        if enabled {
            state.header_classes.insert(class.to_string());
        } else {
            state.header_classes.remove(class);
        }
    }
}

#[async_trait]
impl Router for HeadlessDocument {
    async fn start(&self) -> Result<()> {
        self.lock().router_started = true;
        debug!("Router started");
        Ok(())
    }
}

#[async_trait]
impl UiRoot for HeadlessDocument {
    async fn mount(&self, container: &str) -> Result<()> {
        let mut state = self.lock();
        anyhow::ensure!(state.router_started, "Router must start before mount");
        state.mounted.push(container.to_string());
        info!("🖥️  UI mounted into #{}", container);
        Ok(())
    }
}

impl Navigation for HeadlessDocument {
    fn enable_keyboard_navigation(&self) {
        self.lock().keyboard_navigation = true;
    }

    fn enable_auto_focus(&self) {
        self.lock().auto_focus = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_element_is_shared() {
        let doc = HeadlessDocument::new("Media");
        assert!(doc.query_style("cssBranding").is_none());

        let created = doc.get_or_create_style("cssBranding");
        created.set_text_content("body{}".to_string());

        let found = doc.query_style("cssBranding").unwrap();
        assert_eq!(found.text_content(), "body{}");
        assert_eq!(doc.get_or_create_style("cssBranding").text_content(), "body{}");
        assert_eq!(doc.styles_created(), 1);
    }

    #[test]
    fn test_concurrent_get_or_create_style_appends_once() {
        let doc = Arc::new(HeadlessDocument::new("Media"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let doc = doc.clone();
                std::thread::spawn(move || {
                    doc.get_or_create_style("cssBranding")
                        .set_text_content(format!("writer{}", i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(doc.styles_created(), 1);
        let text = doc.query_style("cssBranding").unwrap().text_content();
        assert!(text.starts_with("writer"));
    }

    #[tokio::test]
    async fn test_mount_requires_router() {
        let doc = HeadlessDocument::new("Media");
        assert!(doc.mount(ROOT_CONTAINER_ID).await.is_err());

        doc.start().await.unwrap();
        doc.mount(ROOT_CONTAINER_ID).await.unwrap();
        assert_eq!(doc.mounted(), vec![ROOT_CONTAINER_ID.to_string()]);
    }

    #[test]
    fn test_header_class_toggle() {
        let doc = HeadlessDocument::new("Media");
        doc.set_header_class("noHeaderRight", true);
        assert!(doc.has_header_class("noHeaderRight"));
        doc.set_header_class("noHeaderRight", false);
        assert!(!doc.has_header_class("noHeaderRight"));
    }

    #[tokio::test]
    async fn test_autocast_needs_session_and_target() {
        let autocast = AutoCast::new(Some("Living Room".to_string()));
        autocast.initialize(None).await;
        assert!(autocast.active_target().is_none());
    }
}
