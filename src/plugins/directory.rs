//! Plugin runtime backed by a directory of manifests.
//!
//! Identifier `htmlAudioPlayer/plugin` resolves to
//! `<plugins-dir>/htmlAudioPlayer/plugin.json`. A manifest may name the
//! client events the plugin listens to and the scheduled tasks it wants
//! controls for; both are wired through the load's [`PluginContext`].

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{PluginContext, PluginRuntime};
use crate::events::EventKind;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("plugin {identifier} not found at {path:?}")]
    NotFound { identifier: String, path: PathBuf },
    #[error("failed to read plugin {identifier}: {source}")]
    Io {
        identifier: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest for plugin {identifier}: {source}")]
    Manifest {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    MediaPlayer,
    PreplayIntercept,
    Screensaver,
    SyncProfile,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventKind>,
    #[serde(default, rename = "taskKeys", skip_serializing_if = "Vec::is_empty")]
    pub task_keys: Vec<String>,
}

/// Registered plugin, after a successful load.
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    pub identifier: String,
    pub manifest: PluginManifest,
    events_received: Arc<AtomicUsize>,
}

impl LoadedPlugin {
    /// Events delivered to the plugin since it loaded.
    pub fn events_received(&self) -> usize {
        self.events_received.load(Ordering::SeqCst)
    }
}

pub struct DirectoryPluginRuntime {
    root: PathBuf,
    loaded: Mutex<Vec<LoadedPlugin>>,
}

impl DirectoryPluginRuntime {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            loaded: Mutex::new(Vec::new()),
        }
    }

    fn manifest_path(&self, identifier: &str) -> Result<PathBuf, PluginError> {
        let valid = identifier
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
            && Path::new(identifier)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(PluginError::InvalidIdentifier(identifier.to_string()));
        }

        Ok(self.root.join(format!("{}.json", identifier)))
    }

    /// Plugins loaded so far, in completion order.
    pub fn loaded(&self) -> Vec<LoadedPlugin> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    async fn read_manifest(&self, identifier: &str) -> Result<PluginManifest, PluginError> {
        let path = self.manifest_path(identifier)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PluginError::NotFound {
                    identifier: identifier.to_string(),
                    path,
                })
            }
            Err(source) => {
                return Err(PluginError::Io {
                    identifier: identifier.to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| PluginError::Manifest {
            identifier: identifier.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PluginRuntime for DirectoryPluginRuntime {
    async fn load_plugin(&self, identifier: &str, context: &PluginContext) -> Result<()> {
        let manifest = self.read_manifest(identifier).await?;
        debug!(
            "Loaded plugin {} ({}, {:?})",
            identifier, manifest.name, manifest.plugin_type
        );

        let events_received = Arc::new(AtomicUsize::new(0));
        for kind in &manifest.events {
            let received = events_received.clone();
            let plugin = identifier.to_string();
            context.events.on(kind.source(), *kind, move |event| {
                let received = received.clone();
                let plugin = plugin.clone();
                async move {
                    received.fetch_add(1, Ordering::SeqCst);
                    debug!("Plugin {} received {:?}", plugin, event.kind());
                }
            });
        }
        for task_key in &manifest.task_keys {
            context.task_button.bind(task_key);
        }

        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LoadedPlugin {
                identifier: identifier.to_string(),
                manifest,
                events_received,
            });
        Ok(())
    }
}
