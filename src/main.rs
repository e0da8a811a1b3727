use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod api;
mod bootstrap;
mod branding;
mod capabilities;
mod cli;
mod command;
mod connection;
mod events;
mod features;
mod globalize;
mod host;
mod plugins;
mod settings;

use api::{ApiClient, DeviceInfo};
use bootstrap::{BootOptions, Bootstrap, BootstrapDeps};
use capabilities::CapabilityFacts;
use cli::{asset_path, resolve_data_dir, Cli};
use command::{Console, ConsoleFlow, StatusView};
use connection::{CredentialStore, ServerConnections};
use events::EventBus;
use features::AssetModuleLoader;
use globalize::Globalize;
use host::{AutoCast, HeadlessDocument, ROOT_CONTAINER_ID};
use plugins::{
    DirectoryPluginRuntime, LocalPackageManager, NativeShell, ScheduledTaskButtons,
    StaticNativeShell,
};
use settings::{CurrentSettings, WebConfigFile};

/// Title of the page before localization
const PAGE_TITLE: &str = "${AppName}";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let assets_dir = PathBuf::from(&cli.assets_dir);

    let facts = Arc::new(CapabilityFacts::detect(
        &cli.user_agent,
        &cli.capability_overrides(),
    ));
    info!(
        "🔎 Detected {:?} in {} mode (tv: {}, touch: {})",
        facts.browser, facts.app_mode, facts.tv, facts.touch
    );

    let events = EventBus::new();
    let api = Arc::new(ApiClient::new(device_info(&data_dir))?);
    info!("🔐 Device {} ({})", api.device().name, api.device().id);
    let web_config = Arc::new(WebConfigFile::new(asset_path(
        &assets_dir,
        cli.web_config.as_deref(),
        "config.json",
    )));
    let user_settings = Arc::new(CurrentSettings::load(data_dir.clone(), events.clone())?);
    let connections = Arc::new(ServerConnections::new(
        api.clone(),
        cli.server.clone(),
        Some(web_config.clone()),
        CredentialStore::new(data_dir.clone()),
        events.clone(),
    ));
    let globalize = Arc::new(Globalize::new(
        asset_path(&assets_dir, cli.strings_dir.as_deref(), "strings"),
        user_settings.clone(),
    ));
    let plugin_runtime = Arc::new(DirectoryPluginRuntime::new(asset_path(
        &assets_dir,
        cli.plugins_dir.as_deref(),
        "plugins",
    )));
    let packages = Arc::new(LocalPackageManager::new(data_dir.clone()));
    let modules = Arc::new(AssetModuleLoader::new(assets_dir.clone()));
    let document = Arc::new(HeadlessDocument::new(PAGE_TITLE));
    let autocast = Arc::new(AutoCast::new(cli.autocast_target.clone()));
    let task_buttons = Arc::new(ScheduledTaskButtons::new());
    let native_shell: Option<Arc<dyn NativeShell>> = if facts.native_shell {
        Some(Arc::new(StaticNativeShell::new(cli.native_plugins.clone())))
    } else {
        None
    };

    let bootstrap = Bootstrap::new(BootstrapDeps {
        facts: facts.clone(),
        options: BootOptions {
            launch_url: cli.launch_url.clone(),
            use_system_fonts: cli.use_system_fonts,
            container_id: ROOT_CONTAINER_ID.to_string(),
        },
        events: events.clone(),
        connections: connections.clone(),
        localization: globalize.clone(),
        web_settings: web_config,
        user_settings: user_settings.clone(),
        plugin_runtime: plugin_runtime.clone(),
        package_manager: packages.clone(),
        native_shell,
        task_button: task_buttons.clone(),
        modules: modules.clone(),
        fetcher: api,
        document: document.clone(),
        router: document.clone(),
        ui: document.clone(),
        navigation: document.clone(),
        cast: autocast.clone(),
    });

    bootstrap.start();
    bootstrap.wait_idle().await;

    let status = StatusView {
        bootstrap: bootstrap.clone(),
        connections: connections.clone(),
        settings: user_settings.clone(),
        globalize,
        plugins: plugin_runtime,
        packages,
        modules,
        document,
        autocast,
        task_buttons,
    };
    status.print();

    if cli.exit_after_boot {
        return Ok(());
    }

    let console = Console::new(events, connections, user_settings);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!("👂 Client running, type 'help' for commands or press Ctrl-C to exit");
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match console.run_line(&line).await {
                    Ok(ConsoleFlow::Continue) => {}
                    Ok(ConsoleFlow::Status) => {
                        bootstrap.wait_idle().await;
                        status.print();
                    }
                    Ok(ConsoleFlow::Quit) => break,
                    Err(e) => warn!("Command failed: {:#}", e),
                },
                None => {
                    debug!("stdin closed, waiting for Ctrl-C");
                    stdin_open = false;
                }
            },
        }
    }

    info!("👋 Shutting down");
    Ok(())
}

/// Device identity derived from the host name and data directory.
fn device_info(data_dir: &std::path::Path) -> DeviceInfo {
    let name = std::env::var("HOSTNAME").unwrap_or_else(|_| "mediaboot".to_string());
    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        data_dir.to_string_lossy().as_bytes(),
    );
    DeviceInfo::new(name, id.to_string())
}
