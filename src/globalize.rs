//! Localization dictionaries.
//!
//! Dictionaries are flat JSON objects (`{"Key": "Text"}`) stored as
//! `<strings-dir>/<culture>.json`. The `en-us` dictionary is always loaded
//! first and the selected culture is layered over it, so a partial
//! translation falls back to English key by key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::settings::UserSettings;

/// Culture used when nothing else is configured
pub const DEFAULT_CULTURE: &str = "en-us";

/// Module name of the core dictionary
pub const CORE_MODULE: &str = "core";

/// Localization as consumed by startup.
#[async_trait]
pub trait Localization: Send + Sync {
    /// Load the core dictionary for the current culture.
    async fn load_core_dictionary(&self) -> Result<()>;

    /// Reload dictionaries if the preferred culture changed.
    async fn update_current_culture(&self) -> Result<()>;

    /// Replace every `${Key}` token in `html` using `module`'s dictionary.
    fn translate_html(&self, html: &str, module: &str) -> String;
}

type Dictionary = HashMap<String, String>;

#[derive(Default)]
struct State {
    culture: Option<String>,
    modules: HashMap<String, Dictionary>,
}

/// File-backed localization.
pub struct Globalize {
    strings_dir: PathBuf,
    settings: Arc<dyn UserSettings>,
    state: RwLock<State>,
}

/// Normalize `en_US.UTF-8` / `en-US` style identifiers to `en-us`.
pub fn normalize_culture(raw: &str) -> Option<String> {
    let base = raw.split('.').next().unwrap_or_default().trim();
    if base.is_empty() || base.eq_ignore_ascii_case("c") || base.eq_ignore_ascii_case("posix") {
        return None;
    }
    Some(base.replace('_', "-").to_lowercase())
}

async fn read_dictionary(path: &Path) -> Result<Dictionary> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read dictionary: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse dictionary: {:?}", path))
}

impl Globalize {
    pub fn new(strings_dir: PathBuf, settings: Arc<dyn UserSettings>) -> Self {
        Self {
            strings_dir,
            settings,
            state: RwLock::new(State::default()),
        }
    }

    /// Culture from user settings, then `LANG`, then the default.
    pub fn preferred_culture(&self) -> String {
        self.settings
            .language()
            .as_deref()
            .and_then(normalize_culture)
            .or_else(|| {
                std::env::var("LANG")
                    .ok()
                    .as_deref()
                    .and_then(normalize_culture)
            })
            .unwrap_or_else(|| DEFAULT_CULTURE.to_string())
    }

    pub fn current_culture(&self) -> Option<String> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .culture
            .clone()
    }

    /// Look up `key`, returning the key itself when untranslated.
    pub fn translate(&self, key: &str, module: &str) -> String {
        let state = self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state
            .modules
            .get(module)
            .and_then(|dict| dict.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    async fn load_culture(&self, culture: &str) -> Result<()> {
        let mut dictionary = read_dictionary(&self.strings_dir.join(format!("{}.json", DEFAULT_CULTURE)))
            .await
            .context("Fallback dictionary unavailable")?;

        if culture != DEFAULT_CULTURE {
            let path = self.strings_dir.join(format!("{}.json", culture));
            match read_dictionary(&path).await {
                Ok(localized) => dictionary.extend(localized),
                Err(e) => warn!("Using {} strings for {}: {:#}", DEFAULT_CULTURE, culture, e),
            }
        }

        debug!("Loaded {} strings for {}", dictionary.len(), culture);

        let mut state = self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.culture = Some(culture.to_string());
        state.modules.insert(CORE_MODULE.to_string(), dictionary);
        Ok(())
    }
}

#[async_trait]
impl Localization for Globalize {
    async fn load_core_dictionary(&self) -> Result<()> {
        let culture = self.preferred_culture();
        self.load_culture(&culture).await?;
        info!("🌐 Loaded core dictionary ({})", culture);
        Ok(())
    }

    async fn update_current_culture(&self) -> Result<()> {
        let culture = self.preferred_culture();
        if self.current_culture().as_deref() == Some(culture.as_str()) {
            debug!("Culture unchanged ({})", culture);
            return Ok(());
        }
        self.load_culture(&culture).await?;
        info!("🌐 Culture changed to {}", culture);
        Ok(())
    }

    fn translate_html(&self, html: &str, module: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut rest = html;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(end) => {
                    out.push_str(&self.translate(&after[..end], module));
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}
