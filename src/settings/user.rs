//! Per-user display settings.
//!
//! Persisted in `<data-dir>/user-settings.json`. Every setter writes the file
//! and raises a `SettingChanged` event carrying the property name, which is
//! what the branding applier listens to. Setters are serialized from the
//! in-memory change through the file write, so the file always holds the
//! latest state.

use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::events::{Event, EventBus, EventSource};

pub const PROP_CUSTOM_CSS: &str = "customCss";
pub const PROP_DISABLE_CUSTOM_CSS: &str = "disableCustomCss";
pub const PROP_LANGUAGE: &str = "language";

/// Read side of the user settings, as consumed by startup.
pub trait UserSettings: Send + Sync {
    /// Whether server branding CSS is suppressed.
    fn disable_custom_css(&self) -> bool;
    /// User-supplied CSS, empty when unset.
    fn custom_css(&self) -> String;
    /// Preferred UI culture, e.g. `fr-ca`.
    fn language(&self) -> Option<String>;
}

/// Values stored in user-settings.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettingsData {
    #[serde(default)]
    pub custom_css: String,
    #[serde(default)]
    pub disable_custom_css: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// The current user's settings.
pub struct CurrentSettings {
    path: PathBuf,
    data: RwLock<UserSettingsData>,
    /// Held from applying a change until its file write finished
    write_lock: Mutex<()>,
    events: EventBus,
}

impl CurrentSettings {
    /// Load settings from `<data_dir>/user-settings.json`, defaulting when absent.
    pub fn load(data_dir: PathBuf, events: EventBus) -> Result<Self> {
        let path = data_dir.join("user-settings.json");

        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read user settings: {:?}", path))?;
            match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Ignoring malformed user settings {:?}: {}", path, e);
                    UserSettingsData::default()
                }
            }
        } else {
            UserSettingsData::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
            write_lock: Mutex::new(()),
            events,
        })
    }

    pub fn snapshot(&self) -> UserSettingsData {
        self.read().clone()
    }

    pub async fn set_custom_css(&self, css: impl Into<String>) -> Result<()> {
        let css = css.into();
        self.update(PROP_CUSTOM_CSS, |data| data.custom_css = css)
            .await
    }

    pub async fn set_disable_custom_css(&self, disabled: bool) -> Result<()> {
        self.update(PROP_DISABLE_CUSTOM_CSS, |data| {
            data.disable_custom_css = disabled
        })
        .await
    }

    pub async fn set_language(&self, language: Option<String>) -> Result<()> {
        self.update(PROP_LANGUAGE, |data| data.language = language)
            .await
    }

    async fn update(
        &self,
        property: &str,
        apply: impl FnOnce(&mut UserSettingsData),
    ) -> Result<()> {
        let write_guard = self.write_lock.lock().await;

        let changed = {
            let mut data = self
                .data
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = data.clone();
            apply(&mut data);
            if *data == before {
                None
            } else {
                Some(data.clone())
            }
        };

        let Some(data) = changed else {
            return Ok(());
        };

        let content =
            serde_json::to_string_pretty(&data).context("Failed to serialize user settings")?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write user settings: {:?}", self.path))?;
        debug!("User setting {} saved to {:?}", property, self.path);
        drop(write_guard);

        self.events
            .trigger(
                EventSource::UserSettings,
                Event::SettingChanged {
                    property: property.to_string(),
                },
            )
            .await;

        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, UserSettingsData> {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UserSettings for CurrentSettings {
    fn disable_custom_css(&self) -> bool {
        self.read().disable_custom_css
    }

    fn custom_css(&self) -> String {
        self.read().custom_css.clone()
    }

    fn language(&self) -> Option<String> {
        self.read().language.clone()
    }
}
