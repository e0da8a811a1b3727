//! Startup pipeline.
//!
//! ```text
//! start()
//!   resolve server address ──> init session ──> autocast (spawned)
//!   load core dictionary (spawned) ──> on_globalize_init()
//!        title, fonts (spawned) ──> load_plugins() ──> on_app_ready()
//!             router start ──> mount ──> optional modules (spawned) ──> branding
//!   keyboard navigation, auto focus, culture refresh listeners
//! ```
//!
//! Nothing in here returns an error to the caller. Every step logs its own
//! failure and the pipeline carries on with whatever is left.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, error, info, warn};

use crate::api::TextFetcher;
use crate::branding::BrandingApplier;
use crate::capabilities::{AppMode, CapabilityFacts};
use crate::connection::ConnectionProvider;
use crate::events::{Event, EventBus, EventKind, EventSource};
use crate::features::{
    post_mount_modules, select_font_bundle, service_worker_decision, FeatureModule,
    ModuleLoader, ServiceWorkerDecision, SERVICE_WORKER_SCRIPT,
};
use crate::globalize::{Localization, CORE_MODULE};
use crate::host::{CastIntegration, Document, Navigation, Router, UiRoot, ROOT_CONTAINER_ID};
use crate::plugins::{
    NativeShell, PackageManager, PluginContext, PluginLoadReport, PluginLoader, PluginRuntime,
    TaskButton,
};
use crate::settings::{UserSettings, WebSettings};

use super::tasks::BackgroundTasks;

/// Launch URL marker of a headless background-sync start on Android
pub const BACKGROUND_SYNC_MARKER: &str = "start=backgroundsync";

/// Page class that hides the right side of the header
pub const STANDALONE_PAGE_CLASS: &str = "standalonePage";
pub const NO_HEADER_RIGHT_CLASS: &str = "noHeaderRight";

/// Furthest point the pipeline reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapStage {
    Init,
    ConnectionResolved,
    LocalizationReady,
    PluginsLoaded,
    UiMounted,
    /// Optional module loads dispatched
    FeaturesLoaded,
}

#[derive(Debug, Clone)]
pub struct BootOptions {
    /// URL the client was launched with
    pub launch_url: String,
    pub use_system_fonts: bool,
    pub container_id: String,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self {
            launch_url: "index.html".to_string(),
            use_system_fonts: false,
            container_id: ROOT_CONTAINER_ID.to_string(),
        }
    }
}

/// Every collaborator the pipeline talks to.
pub struct BootstrapDeps {
    pub facts: Arc<CapabilityFacts>,
    pub options: BootOptions,
    pub events: EventBus,
    pub connections: Arc<dyn ConnectionProvider>,
    pub localization: Arc<dyn Localization>,
    pub web_settings: Arc<dyn WebSettings>,
    pub user_settings: Arc<dyn UserSettings>,
    pub plugin_runtime: Arc<dyn PluginRuntime>,
    pub package_manager: Arc<dyn PackageManager>,
    pub native_shell: Option<Arc<dyn NativeShell>>,
    /// Scheduled-task helper handed to plugins along with `events`
    pub task_button: Arc<dyn TaskButton>,
    pub modules: Arc<dyn ModuleLoader>,
    pub fetcher: Arc<dyn TextFetcher>,
    pub document: Arc<dyn Document>,
    pub router: Arc<dyn Router>,
    pub ui: Arc<dyn UiRoot>,
    pub navigation: Arc<dyn Navigation>,
    pub cast: Arc<dyn CastIntegration>,
}

struct Inner {
    deps: BootstrapDeps,
    plugin_loader: PluginLoader,
    tasks: BackgroundTasks,
    stage: Mutex<BootstrapStage>,
    app_ready: AtomicBool,
    branding: OnceLock<Arc<BrandingApplier>>,
}

/// The startup orchestrator. Cloning shares the same pipeline.
#[derive(Clone)]
pub struct Bootstrap {
    inner: Arc<Inner>,
}

impl Bootstrap {
    pub fn new(deps: BootstrapDeps) -> Self {
        let plugin_loader = PluginLoader::new(
            deps.facts.clone(),
            deps.web_settings.clone(),
            deps.native_shell.clone(),
            deps.plugin_runtime.clone(),
            deps.package_manager.clone(),
            PluginContext::new(deps.events.clone(), deps.task_button.clone()),
        );

        Self {
            inner: Arc::new(Inner {
                deps,
                plugin_loader,
                tasks: BackgroundTasks::new(),
                stage: Mutex::new(BootstrapStage::Init),
                app_ready: AtomicBool::new(false),
                branding: OnceLock::new(),
            }),
        }
    }

    pub fn stage(&self) -> BootstrapStage {
        *self
            .inner
            .stage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn advance(&self, stage: BootstrapStage) {
        let mut current = self
            .inner
            .stage
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if stage > *current {
            debug!("Bootstrap stage {:?} -> {:?}", *current, stage);
            *current = stage;
        }
    }

    /// Branding applier, present once the UI mounted with a session.
    pub fn branding(&self) -> Option<Arc<BrandingApplier>> {
        self.inner.branding.get().cloned()
    }

    /// Wait until every spawned step has finished.
    pub async fn wait_idle(&self) {
        self.inner.tasks.wait_idle().await;
    }

    fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.tasks.spawn(name, task);
    }

    fn spawn_module(&self, module: FeatureModule) {
        let modules = self.inner.deps.modules.clone();
        self.spawn("feature_module", async move {
            if let Err(e) = modules.load(module).await {
                warn!("Failed to load {:?}: {:#}", module, e);
            }
        });
    }

    /// Kick off the pipeline. Must be called inside a tokio runtime.
    pub fn start(&self) {
        info!(
            "[{}]\nversion: {}\ncommit: {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            option_env!("MEDIABOOT_COMMIT").unwrap_or("unknown")
        );

        self.register_page_hooks();

        let this = self.clone();
        self.spawn("init", async move { this.init().await });
    }

    async fn init(&self) {
        let deps = &self.inner.deps;

        let address = match deps.connections.resolve_server_address().await {
            Ok(address) => address,
            Err(e) => {
                warn!("Failed to resolve server address: {:#}", e);
                None
            }
        };

        match address {
            Some(address) => {
                if let Err(e) = deps.connections.init_session(&address).await {
                    warn!("Failed to initialize session for {}: {:#}", address, e);
                }
            }
            None => info!("No server resolved, continuing without a session"),
        }
        self.advance(BootstrapStage::ConnectionResolved);

        let cast = deps.cast.clone();
        let session = deps.connections.current_session();
        self.spawn("autocast", async move { cast.initialize(session).await });

        let this = self.clone();
        self.spawn("globalize", async move {
            if let Err(e) = this.inner.deps.localization.load_core_dictionary().await {
                warn!("Failed to load core dictionary: {:#}", e);
            }
            this.on_globalize_init().await;
        });

        deps.navigation.enable_keyboard_navigation();
        deps.navigation.enable_auto_focus();

        for kind in [EventKind::LocalUserSignedIn, EventKind::LocalUserSignedOut] {
            let localization = deps.localization.clone();
            deps.events
                .on(EventSource::ServerConnections, kind, move |_| {
                    let localization = localization.clone();
                    async move {
                        if let Err(e) = localization.update_current_culture().await {
                            warn!("Failed to update culture: {:#}", e);
                        }
                    }
                });
        }
    }

    fn register_page_hooks(&self) {
        let deps = &self.inner.deps;

        for (kind, enabled) in [(EventKind::ViewShow, true), (EventKind::ViewHide, false)] {
            let document = deps.document.clone();
            deps.events.on(EventSource::Pages, kind, move |event| {
                let document = document.clone();
                async move {
                    let classes = match event {
                        Event::ViewShow { classes } | Event::ViewHide { classes } => classes,
                        _ => return,
                    };
                    if classes.iter().any(|c| c == STANDALONE_PAGE_CLASS) {
                        document.set_header_class(NO_HEADER_RIGHT_CLASS, enabled);
                    }
                }
            });
        }
    }

    fn is_background_sync_launch(&self) -> bool {
        let deps = &self.inner.deps;
        deps.facts.app_mode == AppMode::Android
            && deps
                .options
                .launch_url
                .to_lowercase()
                .contains(BACKGROUND_SYNC_MARKER)
    }

    /// Continue once the core dictionary is available.
    pub async fn on_globalize_init(&self) {
        self.advance(BootstrapStage::LocalizationReady);

        if self.is_background_sync_launch() {
            info!("Background sync launch, skipping UI startup");
            return;
        }

        let deps = &self.inner.deps;
        let title = deps.document.title();
        deps.document
            .set_title(&deps.localization.translate_html(&title, CORE_MODULE));

        let fonts = select_font_bundle(&deps.facts, deps.options.use_system_fonts);
        debug!("Font bundle: {:?}", fonts);
        for module in fonts.modules() {
            self.spawn_module(*module);
        }

        self.load_plugins().await;
        self.on_app_ready().await;
    }

    pub async fn load_plugins(&self) -> PluginLoadReport {
        let report = self.inner.plugin_loader.load_plugins().await;
        self.advance(BootstrapStage::PluginsLoaded);
        report
    }

    /// Mount the UI and dispatch optional modules. Only the first call runs.
    pub async fn on_app_ready(&self) {
        if self.inner.app_ready.swap(true, Ordering::SeqCst) {
            debug!("App already ready, ignoring");
            return;
        }
        debug!("Begin app ready");

        let deps = &self.inner.deps;

        if deps.facts.ios {
            self.spawn_module(FeatureModule::IosStyles);
        }

        let connections = deps.connections.clone();
        deps.events
            .on(EventSource::AppHost, EventKind::Resume, move |_| {
                let connections = connections.clone();
                async move {
                    let Some(session) = connections.current_session() else {
                        return;
                    };
                    if let Err(e) = session.ensure_realtime_channel().await {
                        warn!("Failed to restore realtime channel: {:#}", e);
                    }
                }
            });

        let container = deps.options.container_id.as_str();
        deps.document.clear_container(container);

        if let Err(e) = deps.router.start().await {
            error!("Router failed to start: {:#}", e);
            return;
        }
        if let Err(e) = deps.ui.mount(container).await {
            error!("Failed to mount UI: {:#}", e);
            return;
        }
        self.advance(BootstrapStage::UiMounted);

        for module in post_mount_modules(&deps.facts) {
            self.spawn_module(module);
        }

        match service_worker_decision(&deps.facts) {
            ServiceWorkerDecision::Register => {
                let modules = deps.modules.clone();
                self.spawn("service_worker", async move {
                    match modules.register_service_worker(SERVICE_WORKER_SCRIPT).await {
                        Ok(()) => debug!("Service worker registered"),
                        Err(e) => warn!("Service worker registration failed: {:#}", e),
                    }
                });
            }
            ServiceWorkerDecision::Unsupported => warn!("serviceWorker unsupported"),
            ServiceWorkerDecision::NotApplicable => {}
        }
        self.advance(BootstrapStage::FeaturesLoaded);
        info!("✅ UI ready");

        let Some(session) = deps.connections.current_session() else {
            debug!("No session, skipping branding");
            return;
        };

        let applier = Arc::new(BrandingApplier::new(
            session,
            deps.fetcher.clone(),
            deps.user_settings.clone(),
            deps.document.clone(),
        ));
        applier.subscribe(&deps.events);
        let applier = self.inner.branding.get_or_init(|| applier).clone();
        applier.handle_style_change().await;
    }
}
