//! Event bus and subscription table.
//!
//! Collaborators publish events tagged with the source that raised them
//! (connections, app host, user settings, page views). Subscriptions are
//! (source, kind, handler) rows registered once during startup. Dispatch is
//! sequential in registration order and awaits each handler, so `trigger`
//! returns only after every matching handler ran.

use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Who raised an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    ServerConnections,
    AppHost,
    UserSettings,
    Pages,
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LocalUserSignedIn { user_id: String },
    LocalUserSignedOut,
    Resume,
    SettingChanged { property: String },
    ViewShow { classes: Vec<String> },
    ViewHide { classes: Vec<String> },
}

/// Payload-free discriminator used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    LocalUserSignedIn,
    LocalUserSignedOut,
    Resume,
    SettingChanged,
    ViewShow,
    ViewHide,
}

impl EventKind {
    /// The source that raises this kind of event.
    pub fn source(self) -> EventSource {
        match self {
            EventKind::LocalUserSignedIn | EventKind::LocalUserSignedOut => {
                EventSource::ServerConnections
            }
            EventKind::Resume => EventSource::AppHost,
            EventKind::SettingChanged => EventSource::UserSettings,
            EventKind::ViewShow | EventKind::ViewHide => EventSource::Pages,
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::LocalUserSignedIn { .. } => EventKind::LocalUserSignedIn,
            Event::LocalUserSignedOut => EventKind::LocalUserSignedOut,
            Event::Resume => EventKind::Resume,
            Event::SettingChanged { .. } => EventKind::SettingChanged,
            Event::ViewShow { .. } => EventKind::ViewShow,
            Event::ViewHide { .. } => EventKind::ViewHide,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

struct Subscription {
    source: EventSource,
    kind: EventKind,
    handler: EventHandler,
}

/// Shared subscription table.
///
/// Cloning is cheap; all clones see the same subscriptions.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind` events raised by `source`.
    pub fn on<F, Fut>(&self, source: EventSource, kind: EventKind, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handler: EventHandler =
            Arc::new(move |event| -> BoxFuture<'static, ()> { Box::pin(handler(event)) });

        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscriptions.push(Subscription {
            source,
            kind,
            handler,
        });
        debug!(
            "Subscribed {:?}/{:?} ({} total)",
            source,
            kind,
            subscriptions.len()
        );
    }

    /// Dispatch `event` to every matching handler, in registration order.
    pub async fn trigger(&self, source: EventSource, event: Event) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = {
            let subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            subscriptions
                .iter()
                .filter(|s| s.source == source && s.kind == kind)
                .map(|s| s.handler.clone())
                .collect()
        };

        debug!(
            "Dispatching {:?}/{:?} to {} handler(s)",
            source,
            kind,
            handlers.len()
        );

        for handler in handlers {
            handler(event.clone()).await;
        }
    }
}
