//! Plugin discovery and loading.
//!
//! The plugin list comes from the web config, is filtered by capability
//! facts, gets the native shell's plugins appended, and is then loaded
//! concurrently. One plugin failing never fails the others or the batch.
//! Package manager initialization runs after every batch, whatever happened.

mod context;
mod directory;
mod packages;

pub use context::{PluginContext, ScheduledTaskButtons, TaskButton};
pub use directory::DirectoryPluginRuntime;
pub use packages::{LocalPackageManager, PackageManager};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::capabilities::CapabilityFacts;
use crate::settings::WebSettings;

/// Prefix of plugins that control playback on another session
pub const SESSION_PLAYER_PREFIX: &str = "sessionPlayer";

/// Prefix of chromecast sender plugins
pub const CHROMECAST_PLAYER_PREFIX: &str = "chromecastPlayer";

/// Loads a single plugin by identifier.
#[async_trait]
pub trait PluginRuntime: Send + Sync {
    async fn load_plugin(&self, identifier: &str, context: &PluginContext) -> Result<()>;
}

/// Embedding host contributing its own plugins.
pub trait NativeShell: Send + Sync {
    fn plugins(&self) -> Vec<String>;
}

/// Native shell with a fixed plugin list.
#[derive(Debug, Clone, Default)]
pub struct StaticNativeShell {
    plugins: Vec<String>,
}

impl StaticNativeShell {
    pub fn new(plugins: Vec<String>) -> Self {
        Self { plugins }
    }
}

impl NativeShell for StaticNativeShell {
    fn plugins(&self) -> Vec<String> {
        self.plugins.clone()
    }
}

/// Drop plugins the current environment cannot host.
///
/// Matching is by name prefix: anything starting with a reserved prefix
/// belongs to that category.
pub fn filter_plugins(list: Vec<String>, facts: &CapabilityFacts) -> Vec<String> {
    if !facts.supports_remote_control {
        list.into_iter()
            .filter(|p| {
                !p.starts_with(SESSION_PLAYER_PREFIX) && !p.starts_with(CHROMECAST_PLAYER_PREFIX)
            })
            .collect()
    } else if !facts.browser.supports_chromecast() {
        list.into_iter()
            .filter(|p| !p.starts_with(CHROMECAST_PLAYER_PREFIX))
            .collect()
    } else {
        list
    }
}

/// Outcome of one `load_plugins` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginLoadReport {
    /// Identifiers attempted, in list order
    pub requested: Vec<String>,
    pub loaded: usize,
    pub failed: Vec<String>,
}

/// Filters and loads plugins, then initializes the package manager.
pub struct PluginLoader {
    facts: Arc<CapabilityFacts>,
    settings: Arc<dyn WebSettings>,
    native_shell: Option<Arc<dyn NativeShell>>,
    runtime: Arc<dyn PluginRuntime>,
    package_manager: Arc<dyn PackageManager>,
    context: PluginContext,
}

impl PluginLoader {
    pub fn new(
        facts: Arc<CapabilityFacts>,
        settings: Arc<dyn WebSettings>,
        native_shell: Option<Arc<dyn NativeShell>>,
        runtime: Arc<dyn PluginRuntime>,
        package_manager: Arc<dyn PackageManager>,
        context: PluginContext,
    ) -> Self {
        Self {
            facts,
            settings,
            native_shell,
            runtime,
            package_manager,
            context,
        }
    }

    /// Final plugin list: filtered remote list followed by native plugins.
    ///
    /// An unreachable remote list counts as empty; native plugins still load.
    pub async fn plugin_list(&self) -> Vec<String> {
        let remote = match self.settings.list_plugins().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Failed to get plugin list: {:#}", e);
                Vec::new()
            }
        };

        let mut list = filter_plugins(remote, &self.facts);

        if let Some(shell) = &self.native_shell {
            let native = shell.plugins();
            debug!("Adding {} native plugin(s)", native.len());
            list.extend(native);
        }

        list
    }

    /// Load every plugin concurrently. Never fails.
    pub async fn load_plugins(&self) -> PluginLoadReport {
        async {
            let list = self.plugin_list().await;
            debug!("Loading plugins: {:?}", list);

            let results = join_all(
                list.iter()
                    .map(|id| self.runtime.load_plugin(id, &self.context)),
            )
            .await;

            let mut report = PluginLoadReport {
                requested: list.clone(),
                ..Default::default()
            };
            for (id, result) in list.iter().zip(results) {
                match result {
                    Ok(()) => report.loaded += 1,
                    Err(e) => {
                        warn!("Failed loading plugin {}: {:#}", id, e);
                        report.failed.push(id.clone());
                    }
                }
            }

            if report.failed.is_empty() {
                debug!("Finished loading plugins");
            } else {
                warn!(
                    "Failed loading plugins: {} of {} failed",
                    report.failed.len(),
                    report.requested.len()
                );
            }

            if let Err(e) = self.package_manager.init().await {
                warn!("Package manager initialization failed: {:#}", e);
            }

            info!(
                "🧩 Plugins ready: {} loaded, {} failed",
                report.loaded,
                report.failed.len()
            );
            report
        }
        .instrument(info_span!("load_plugins"))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::BrowserFamily;
    use crate::events::EventBus;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn facts(remote_control: bool, browser: BrowserFamily) -> CapabilityFacts {
        CapabilityFacts {
            supports_remote_control: remote_control,
            browser,
            ..CapabilityFacts::default()
        }
    }

    struct FixedList(Result<Vec<String>, String>);

    #[async_trait]
    impl WebSettings for FixedList {
        async fn list_plugins(&self) -> Result<Vec<String>> {
            self.0.clone().map_err(anyhow::Error::msg)
        }
    }

    struct FailingRuntime {
        failing: HashSet<String>,
        attempts: Mutex<Vec<String>>,
    }

    impl FailingRuntime {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PluginRuntime for FailingRuntime {
        async fn load_plugin(&self, identifier: &str, context: &PluginContext) -> Result<()> {
            self.attempts.lock().unwrap().push(identifier.to_string());
            context.task_button.bind(identifier);
            if self.failing.contains(identifier) {
                anyhow::bail!("{} exploded", identifier);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPackages(AtomicUsize);

    #[async_trait]
    impl PackageManager for CountingPackages {
        async fn init(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn context() -> PluginContext {
        PluginContext::new(EventBus::new(), Arc::new(ScheduledTaskButtons::new()))
    }

    const ALL: &[&str] = &[
        "sessionPlayerFoo",
        "chromecastPlayerBar",
        "dashboard",
        "htmlAudioPlayer/plugin",
    ];

    #[test]
    fn test_filter_without_remote_control() {
        let filtered = filter_plugins(
            list(&["sessionPlayerFoo", "chromecastPlayerBar", "dashboard"]),
            &facts(false, BrowserFamily::Chrome),
        );
        assert_eq!(filtered, list(&["dashboard"]));
    }

    #[test]
    fn test_filter_every_capability_combination() {
        let browsers = [
            BrowserFamily::Chrome,
            BrowserFamily::EdgeChromium,
            BrowserFamily::Opera,
            BrowserFamily::Firefox,
            BrowserFamily::Safari,
            BrowserFamily::Other,
        ];

        for remote_control in [false, true] {
            for browser in browsers {
                let filtered = filter_plugins(list(ALL), &facts(remote_control, browser));
                let expected: Vec<String> = ALL
                    .iter()
                    .filter(|p| {
                        if !remote_control {
                            !p.starts_with(SESSION_PLAYER_PREFIX)
                                && !p.starts_with(CHROMECAST_PLAYER_PREFIX)
                        } else if !browser.supports_chromecast() {
                            !p.starts_with(CHROMECAST_PLAYER_PREFIX)
                        } else {
                            true
                        }
                    })
                    .map(|s| s.to_string())
                    .collect();
                assert_eq!(filtered, expected, "remote={} browser={:?}", remote_control, browser);
            }
        }
    }

    #[test]
    fn test_filter_is_prefix_based() {
        let filtered = filter_plugins(
            list(&["chromecastPlayer", "chromecastPlayer/plugin", "myChromecastPlayer"]),
            &facts(true, BrowserFamily::Firefox),
        );
        assert_eq!(filtered, list(&["myChromecastPlayer"]));
    }

    #[tokio::test]
    async fn test_native_plugins_are_never_filtered() {
        let loader = PluginLoader::new(
            Arc::new(facts(false, BrowserFamily::Firefox)),
            Arc::new(FixedList(Ok(list(&["sessionPlayerFoo", "dashboard"])))),
            Some(Arc::new(StaticNativeShell::new(list(&["sessionPlayerNative"])))),
            Arc::new(FailingRuntime::new(&[])),
            Arc::new(CountingPackages::default()),
            context(),
        );

        assert_eq!(
            loader.plugin_list().await,
            list(&["dashboard", "sessionPlayerNative"])
        );
    }

    #[tokio::test]
    async fn test_load_settles_with_partial_failures() {
        let runtime = Arc::new(FailingRuntime::new(&["b"]));
        let packages = Arc::new(CountingPackages::default());
        let loader = PluginLoader::new(
            Arc::new(CapabilityFacts::default()),
            Arc::new(FixedList(Ok(list(&["a", "b", "c"])))),
            None,
            runtime.clone(),
            packages.clone(),
            context(),
        );

        let report = loader.load_plugins().await;
        assert_eq!(report.requested, list(&["a", "b", "c"]));
        assert_eq!(report.loaded, 2);
        assert_eq!(report.failed, list(&["b"]));
        assert_eq!(runtime.attempts.lock().unwrap().len(), 3);
        assert_eq!(packages.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_settles_when_all_fail_or_none_requested() {
        let packages = Arc::new(CountingPackages::default());

        let all_fail = PluginLoader::new(
            Arc::new(CapabilityFacts::default()),
            Arc::new(FixedList(Ok(list(&["a", "b"])))),
            None,
            Arc::new(FailingRuntime::new(&["a", "b"])),
            packages.clone(),
            context(),
        );
        let report = all_fail.load_plugins().await;
        assert_eq!(report.loaded, 0);
        assert_eq!(report.failed.len(), 2);

        let empty = PluginLoader::new(
            Arc::new(CapabilityFacts::default()),
            Arc::new(FixedList(Ok(Vec::new()))),
            None,
            Arc::new(FailingRuntime::new(&[])),
            packages.clone(),
            context(),
        );
        let report = empty.load_plugins().await;
        assert!(report.requested.is_empty());

        assert_eq!(packages.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_every_plugin_gets_the_loader_context() {
        let buttons = Arc::new(ScheduledTaskButtons::new());
        let loader = PluginLoader::new(
            Arc::new(CapabilityFacts::default()),
            Arc::new(FixedList(Ok(list(&["a", "b"])))),
            None,
            Arc::new(FailingRuntime::new(&["b"])),
            Arc::new(CountingPackages::default()),
            PluginContext::new(EventBus::new(), buttons.clone()),
        );

        loader.load_plugins().await;
        assert_eq!(buttons.bound(), list(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_unreachable_list_still_loads_native_and_finalizes() {
        let runtime = Arc::new(FailingRuntime::new(&[]));
        let packages = Arc::new(CountingPackages::default());
        let loader = PluginLoader::new(
            Arc::new(CapabilityFacts::default()),
            Arc::new(FixedList(Err("config.json unreachable".to_string()))),
            Some(Arc::new(StaticNativeShell::new(list(&["nativePlayer"])))),
            runtime.clone(),
            packages.clone(),
            context(),
        );

        let report = loader.load_plugins().await;
        assert_eq!(report.requested, list(&["nativePlayer"]));
        assert_eq!(*runtime.attempts.lock().unwrap(), list(&["nativePlayer"]));
        assert_eq!(packages.0.load(Ordering::SeqCst), 1);
    }
}
