use clap::Parser;

use crate::capabilities::{AppMode, CapabilityOverrides};

/// Default user agent when the host does not supply one.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// mediaboot - startup orchestrator for the media client shell
#[derive(Parser, Debug)]
#[command(name = "mediaboot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server address to connect to (skips multiserver probing)
    #[arg(short = 's', long, env = "MEDIABOOT_SERVER")]
    pub server: Option<String>,

    /// Directory for credentials, user settings and installed packages. Defaults to ~/.mediaboot
    #[arg(long, env = "MEDIABOOT_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Directory holding lazily loaded bundles (styles, components, serviceworker.js)
    #[arg(long, env = "MEDIABOOT_ASSETS_DIR", default_value = "web")]
    pub assets_dir: String,

    /// Web config file (defaults to <assets-dir>/config.json)
    #[arg(long)]
    pub web_config: Option<String>,

    /// Localization dictionaries directory (defaults to <assets-dir>/strings)
    #[arg(long)]
    pub strings_dir: Option<String>,

    /// Plugin manifests directory (defaults to <assets-dir>/plugins)
    #[arg(long)]
    pub plugins_dir: Option<String>,

    /// User agent used for capability detection
    #[arg(long, env = "MEDIABOOT_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Shell the client runs in (browser, android, cordova)
    #[arg(long, default_value = "browser")]
    pub app_mode: AppMode,

    /// Launch URL of the client page
    #[arg(long, default_value = "index.html")]
    pub launch_url: String,

    /// Force touch input on or off
    #[arg(long)]
    pub touch: Option<bool>,

    /// Force remote control support on or off
    #[arg(long)]
    pub remote_control: Option<bool>,

    /// Force physical volume control on or off
    #[arg(long)]
    pub physical_volume_control: Option<bool>,

    /// Force media session API availability
    #[arg(long)]
    pub media_session: Option<bool>,

    /// Force notification API availability
    #[arg(long)]
    pub notifications: Option<bool>,

    /// Force service worker API availability
    #[arg(long)]
    pub service_worker: Option<bool>,

    /// Plugin supplied by the native shell (repeatable; any value enables the native shell)
    #[arg(long = "native-plugin")]
    pub native_plugins: Vec<String>,

    /// Use system fonts instead of the bundled font set
    #[arg(long)]
    pub use_system_fonts: bool,

    /// Cast target to reconnect to once a session exists
    #[arg(long)]
    pub autocast_target: Option<String>,

    /// Exit once the startup pipeline is idle instead of waiting for Ctrl-C
    #[arg(long)]
    pub exit_after_boot: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn capability_overrides(&self) -> CapabilityOverrides {
        CapabilityOverrides {
            app_mode: Some(self.app_mode),
            touch: self.touch,
            remote_control: self.remote_control,
            physical_volume_control: self.physical_volume_control,
            native_shell: (!self.native_plugins.is_empty()).then_some(true),
            media_session_api: self.media_session,
            notification_api: self.notifications,
            service_worker_api: self.service_worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["mediaboot"]).unwrap();
        assert_eq!(cli.app_mode, AppMode::Browser);
        assert_eq!(cli.assets_dir, "web");
        assert!(cli.native_plugins.is_empty());
        assert!(cli.capability_overrides().native_shell.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::try_parse_from([
            "mediaboot",
            "--app-mode",
            "android",
            "--remote-control",
            "false",
            "--native-plugin",
            "nativeAudioPlayer/plugin",
            "--native-plugin",
            "nativeVideoPlayer/plugin",
        ])
        .unwrap();

        let overrides = cli.capability_overrides();
        assert_eq!(overrides.app_mode, Some(AppMode::Android));
        assert_eq!(overrides.remote_control, Some(false));
        assert_eq!(overrides.native_shell, Some(true));
        assert_eq!(cli.native_plugins.len(), 2);
    }
}
