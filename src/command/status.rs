use std::sync::Arc;

use crate::bootstrap::Bootstrap;
use crate::branding::BRANDING_STYLE_ID;
use crate::connection::{ApiSession, ServerConnections};
use crate::features::AssetModuleLoader;
use crate::globalize::Globalize;
use crate::host::{AutoCast, Document, HeadlessDocument};
use crate::plugins::{DirectoryPluginRuntime, LocalPackageManager, ScheduledTaskButtons};
use crate::settings::CurrentSettings;

/// Everything `status` reports on.
pub struct StatusView {
    pub bootstrap: Bootstrap,
    pub connections: Arc<ServerConnections>,
    pub settings: Arc<CurrentSettings>,
    pub globalize: Arc<Globalize>,
    pub plugins: Arc<DirectoryPluginRuntime>,
    pub packages: Arc<LocalPackageManager>,
    pub modules: Arc<AssetModuleLoader>,
    pub document: Arc<HeadlessDocument>,
    pub autocast: Arc<AutoCast>,
    pub task_buttons: Arc<ScheduledTaskButtons>,
}

impl StatusView {
    pub fn print(&self) {
        println!("Startup stage:  {:?}", self.bootstrap.stage());

        match self.connections.session() {
            Some(session) => {
                println!("Server:         {}", session.server_url());
                if session.access_token().is_some() {
                    println!("✅ Signed in");
                } else {
                    println!("❌ Not signed in");
                }
                if let Some(at) = session.realtime_confirmed_at() {
                    println!("Realtime:       confirmed {}", at.to_rfc3339());
                }
            }
            None => println!("Server:         (none)"),
        }

        println!(
            "Culture:        {}",
            self.globalize
                .current_culture()
                .unwrap_or_else(|| "-".to_string())
        );
        println!(
            "Plugins:        {}",
            self.plugins
                .loaded()
                .iter()
                .map(|p| format!("{} ({} events)", p.identifier, p.events_received()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Task buttons:   {}", self.task_buttons.bound().join(", "));
        println!("Packages:       {}", self.packages.installed().len());
        println!("Modules:        {:?}", self.modules.loaded());
        println!(
            "Service worker: {}",
            self.modules
                .service_worker()
                .unwrap_or_else(|| "-".to_string())
        );
        println!("Mounted into:   {:?}", self.document.mounted());
        println!(
            "Navigation:     keyboard {}, auto focus {}",
            on_off(self.document.keyboard_navigation()),
            on_off(self.document.auto_focus())
        );

        let settings = self.settings.snapshot();
        println!(
            "Branding css:   {}",
            on_off(!settings.disable_custom_css)
        );
        if self.bootstrap.branding().is_none() {
            println!("Style:          (not applied)");
        } else if let Some(style) = self.document.query_style(BRANDING_STYLE_ID) {
            println!(
                "Style:          {} bytes in #{}",
                style.text_content().len(),
                BRANDING_STYLE_ID
            );
        }
        if let Some(target) = self.autocast.active_target() {
            println!("Autocast:       {}", target);
        }
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
