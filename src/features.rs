//! Optional feature bundles and the capability rules that gate them.
//!
//! The gating rules are pure functions over [`CapabilityFacts`] so they can
//! be checked exhaustively; loading goes through [`ModuleLoader`].

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::capabilities::{AppMode, CapabilityFacts};

/// Script registered as the service worker
pub const SERVICE_WORKER_SCRIPT: &str = "serviceworker.js";

/// Lazily loaded bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureModule {
    FontsSized,
    Fonts,
    FontsNoto,
    IosStyles,
    NowPlayingBar,
    PlayerSelectionMenu,
    RemoteControlAutoplay,
    VolumeOsd,
    MediaSession,
    PlaybackOrientation,
    Notifications,
}

impl FeatureModule {
    /// Bundle location relative to the assets directory.
    pub fn bundle_path(&self) -> &'static str {
        match self {
            FeatureModule::FontsSized => "styles/fonts.sized.css",
            FeatureModule::Fonts => "styles/fonts.css",
            FeatureModule::FontsNoto => "styles/fonts.noto.css",
            FeatureModule::IosStyles => "styles/ios.css",
            FeatureModule::NowPlayingBar => "components/nowPlayingBar/nowPlayingBar.js",
            FeatureModule::PlayerSelectionMenu => "components/playback/playerSelectionMenu.js",
            FeatureModule::RemoteControlAutoplay => {
                "components/playback/remotecontrolautoplay.js"
            }
            FeatureModule::VolumeOsd => "components/playback/volumeosd.js",
            FeatureModule::MediaSession => "components/playback/mediasession.js",
            FeatureModule::PlaybackOrientation => "components/playback/playbackorientation.js",
            FeatureModule::Notifications => "components/notifications/notifications.js",
        }
    }
}

/// Font set chosen once the dictionary is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontBundle {
    /// System fonts with explicit sizes, for TV screens
    SizedSystem,
    System,
    /// Bundled fonts plus Noto for glyph coverage
    Default,
}

impl FontBundle {
    pub fn modules(&self) -> &'static [FeatureModule] {
        match self {
            FontBundle::SizedSystem => &[FeatureModule::FontsSized],
            FontBundle::System => &[FeatureModule::Fonts],
            FontBundle::Default => &[FeatureModule::Fonts, FeatureModule::FontsNoto],
        }
    }
}

/// TV (non-Android) beats the system-fonts flag, which beats the default.
pub fn select_font_bundle(facts: &CapabilityFacts, use_system_fonts: bool) -> FontBundle {
    if facts.tv && !facts.android {
        FontBundle::SizedSystem
    } else if use_system_fonts {
        FontBundle::System
    } else {
        FontBundle::Default
    }
}

/// Modules loaded right after mount, in spawn order.
pub fn post_mount_modules(facts: &CapabilityFacts) -> Vec<FeatureModule> {
    let mut modules = Vec::new();

    if !facts.tv && !facts.xbox_one && !facts.ps4 {
        modules.push(FeatureModule::NowPlayingBar);
    }

    if facts.supports_remote_control {
        modules.push(FeatureModule::PlayerSelectionMenu);
        modules.push(FeatureModule::RemoteControlAutoplay);
    }

    if !facts.supports_physical_volume_control || facts.touch {
        modules.push(FeatureModule::VolumeOsd);
    }

    if facts.media_session_api || facts.native_shell {
        modules.push(FeatureModule::MediaSession);
    }

    if !facts.is_tv_or_xbox() {
        modules.push(FeatureModule::PlaybackOrientation);
        if facts.notification_api {
            modules.push(FeatureModule::Notifications);
        }
    }

    modules
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceWorkerDecision {
    /// TV or Xbox: not attempted at all
    NotApplicable,
    Register,
    /// Attempted but the shell cannot host one
    Unsupported,
}

pub fn service_worker_decision(facts: &CapabilityFacts) -> ServiceWorkerDecision {
    if facts.is_tv_or_xbox() {
        ServiceWorkerDecision::NotApplicable
    } else if facts.service_worker_api
        && !matches!(facts.app_mode, AppMode::Cordova | AppMode::Android)
    {
        ServiceWorkerDecision::Register
    } else {
        ServiceWorkerDecision::Unsupported
    }
}

/// Lazy bundle loading.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, module: FeatureModule) -> Result<()>;
    async fn register_service_worker(&self, script: &str) -> Result<()>;
}

/// Loads bundles from the assets directory.
pub struct AssetModuleLoader {
    root: PathBuf,
    loaded: Mutex<Vec<FeatureModule>>,
    service_worker: Mutex<Option<String>>,
}

impl AssetModuleLoader {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            loaded: Mutex::new(Vec::new()),
            service_worker: Mutex::new(None),
        }
    }

    pub fn loaded(&self) -> Vec<FeatureModule> {
        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn service_worker(&self) -> Option<String> {
        self.service_worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl ModuleLoader for AssetModuleLoader {
    async fn load(&self, module: FeatureModule) -> Result<()> {
        let path = self.root.join(module.bundle_path());
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to load bundle {:?}", path))?;
        debug!("Loaded {:?} ({} bytes)", module, bytes.len());

        self.loaded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(module);
        Ok(())
    }

    async fn register_service_worker(&self, script: &str) -> Result<()> {
        let path = self.root.join(script);
        tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Service worker script missing: {:?}", path))?;

        *self
            .service_worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(script.to_string());
        Ok(())
    }
}
