//! Capability detection.
//!
//! Produces the immutable [`CapabilityFacts`] snapshot the rest of the
//! startup pipeline gates on. Facts are derived once from the host's
//! user-agent string, then adjusted by explicit overrides from the command
//! line. Nothing mutates them after startup.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Browser engine family, as far as plugin gating cares about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BrowserFamily {
    Chrome,
    EdgeChromium,
    Opera,
    Firefox,
    Safari,
    Other,
}

impl BrowserFamily {
    /// Families able to host the chromecast sender.
    pub fn supports_chromecast(&self) -> bool {
        matches!(
            self,
            BrowserFamily::Chrome | BrowserFamily::EdgeChromium | BrowserFamily::Opera
        )
    }

    fn from_user_agent(ua: &str) -> Self {
        // Order matters: Edge and Opera both advertise "chrome" as well.
        if ua.contains("edg/") {
            BrowserFamily::EdgeChromium
        } else if ua.contains("opr/") || ua.contains("opera") {
            BrowserFamily::Opera
        } else if ua.contains("chrome") || ua.contains("crios") {
            BrowserFamily::Chrome
        } else if ua.contains("firefox") || ua.contains("fxios") {
            BrowserFamily::Firefox
        } else if ua.contains("safari") {
            BrowserFamily::Safari
        } else {
            BrowserFamily::Other
        }
    }
}

/// Shell the client is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    #[default]
    Browser,
    Android,
    Cordova,
}

impl AppMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppMode::Browser => "browser",
            AppMode::Android => "android",
            AppMode::Cordova => "cordova",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "browser" => Ok(AppMode::Browser),
            "android" => Ok(AppMode::Android),
            "cordova" => Ok(AppMode::Cordova),
            other => Err(format!("unknown app mode: {}", other)),
        }
    }
}

/// Explicit adjustments applied on top of user-agent detection.
///
/// `None` keeps the detected value.
#[derive(Debug, Clone, Default)]
pub struct CapabilityOverrides {
    pub app_mode: Option<AppMode>,
    pub touch: Option<bool>,
    pub remote_control: Option<bool>,
    pub physical_volume_control: Option<bool>,
    pub native_shell: Option<bool>,
    pub media_session_api: Option<bool>,
    pub notification_api: Option<bool>,
    pub service_worker_api: Option<bool>,
}

/// Immutable snapshot of environment predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityFacts {
    pub tv: bool,
    pub android: bool,
    pub ios: bool,
    pub xbox_one: bool,
    pub ps4: bool,
    pub touch: bool,
    pub browser: BrowserFamily,
    pub app_mode: AppMode,
    pub supports_remote_control: bool,
    pub supports_physical_volume_control: bool,
    pub native_shell: bool,
    pub media_session_api: bool,
    pub notification_api: bool,
    pub service_worker_api: bool,
}

const TV_MARKERS: &[&str] = &[
    "tv", "smart-tv", "smarttv", "appletv", "googletv", "hbbtv", "netcast", "web0s", "tizen",
];

impl CapabilityFacts {
    /// Detect facts from a user-agent string, then apply overrides.
    pub fn detect(user_agent: &str, overrides: &CapabilityOverrides) -> Self {
        let ua = user_agent.to_lowercase();

        let tv = TV_MARKERS.iter().any(|marker| ua.contains(marker));
        let android = ua.contains("android");
        let ios = ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod");
        let xbox_one = ua.contains("xbox");
        let ps4 = ua.contains("playstation 4");
        let mobile = android || ios || ua.contains("mobile");
        let console = xbox_one || ps4;

        let mut facts = Self {
            tv,
            android,
            ios,
            xbox_one,
            ps4,
            touch: mobile,
            browser: BrowserFamily::from_user_agent(&ua),
            app_mode: AppMode::Browser,
            supports_remote_control: !tv && !console,
            supports_physical_volume_control: tv || console || mobile,
            native_shell: false,
            media_session_api: !tv && !console,
            notification_api: !tv && !console,
            service_worker_api: !tv && !console,
        };

        facts.apply(overrides);
        facts
    }

    fn apply(&mut self, overrides: &CapabilityOverrides) {
        if let Some(mode) = overrides.app_mode {
            self.app_mode = mode;
        }
        if let Some(v) = overrides.touch {
            self.touch = v;
        }
        if let Some(v) = overrides.remote_control {
            self.supports_remote_control = v;
        }
        if let Some(v) = overrides.physical_volume_control {
            self.supports_physical_volume_control = v;
        }
        if let Some(v) = overrides.native_shell {
            self.native_shell = v;
        }
        if let Some(v) = overrides.media_session_api {
            self.media_session_api = v;
        }
        if let Some(v) = overrides.notification_api {
            self.notification_api = v;
        }
        if let Some(v) = overrides.service_worker_api {
            self.service_worker_api = v;
        }
    }

    /// TV-class or console device where the full desktop chrome is unwanted.
    pub fn is_tv_or_xbox(&self) -> bool {
        self.tv || self.xbox_one
    }
}

impl Default for CapabilityFacts {
    /// A desktop Chrome browser with every optional web API available.
    fn default() -> Self {
        Self {
            tv: false,
            android: false,
            ios: false,
            xbox_one: false,
            ps4: false,
            touch: false,
            browser: BrowserFamily::Chrome,
            app_mode: AppMode::Browser,
            supports_remote_control: true,
            supports_physical_volume_control: false,
            native_shell: false,
            media_session_api: true,
            notification_api: true,
            service_worker_api: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP_CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const DESKTOP_EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 Edg/120.0";
    const DESKTOP_FIREFOX: &str =
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const ANDROID_TV: &str = "Mozilla/5.0 (Linux; Android 11; BRAVIA 4K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 SmartTV";
    const TIZEN: &str = "Mozilla/5.0 (SMART-TV; LINUX; Tizen 6.0) AppleWebKit/537.36 (KHTML, like Gecko) 76.0 TV Safari/537.36";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const XBOX: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; Xbox; Xbox One) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 Edg/120.0";

    #[test]
    fn test_detect_desktop_chrome() {
        let facts = CapabilityFacts::detect(DESKTOP_CHROME, &CapabilityOverrides::default());
        assert_eq!(facts.browser, BrowserFamily::Chrome);
        assert!(!facts.tv);
        assert!(facts.supports_remote_control);
        assert!(!facts.supports_physical_volume_control);
        assert!(!facts.touch);
    }

    #[test]
    fn test_detect_browser_families() {
        let none = CapabilityOverrides::default();
        assert_eq!(
            CapabilityFacts::detect(DESKTOP_EDGE, &none).browser,
            BrowserFamily::EdgeChromium
        );
        assert_eq!(
            CapabilityFacts::detect(DESKTOP_FIREFOX, &none).browser,
            BrowserFamily::Firefox
        );
        assert_eq!(
            CapabilityFacts::detect(IPHONE, &none).browser,
            BrowserFamily::Safari
        );
        assert!(!BrowserFamily::Firefox.supports_chromecast());
        assert!(BrowserFamily::Opera.supports_chromecast());
    }

    #[test]
    fn test_detect_tv_devices() {
        let none = CapabilityOverrides::default();

        let android_tv = CapabilityFacts::detect(ANDROID_TV, &none);
        assert!(android_tv.tv);
        assert!(android_tv.android);
        assert!(!android_tv.supports_remote_control);
        assert!(android_tv.supports_physical_volume_control);

        let tizen = CapabilityFacts::detect(TIZEN, &none);
        assert!(tizen.tv);
        assert!(!tizen.android);
    }

    #[test]
    fn test_detect_consoles_and_mobile() {
        let none = CapabilityOverrides::default();

        let xbox = CapabilityFacts::detect(XBOX, &none);
        assert!(xbox.xbox_one);
        assert!(xbox.is_tv_or_xbox());
        assert!(!xbox.supports_remote_control);

        let iphone = CapabilityFacts::detect(IPHONE, &none);
        assert!(iphone.ios);
        assert!(iphone.touch);
        assert!(iphone.supports_physical_volume_control);
    }

    #[test]
    fn test_overrides_win_over_detection() {
        let overrides = CapabilityOverrides {
            app_mode: Some(AppMode::Android),
            remote_control: Some(false),
            native_shell: Some(true),
            touch: Some(true),
            ..Default::default()
        };
        let facts = CapabilityFacts::detect(DESKTOP_CHROME, &overrides);
        assert_eq!(facts.app_mode, AppMode::Android);
        assert!(!facts.supports_remote_control);
        assert!(facts.native_shell);
        assert!(facts.touch);
    }

    #[test]
    fn test_app_mode_parse() {
        assert_eq!("Android".parse::<AppMode>().unwrap(), AppMode::Android);
        assert_eq!("".parse::<AppMode>().unwrap(), AppMode::Browser);
        assert!("webos".parse::<AppMode>().is_err());
    }
}
