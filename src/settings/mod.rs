//! Settings consumed during startup.
//!
//! - `web`: the deployment's config.json (servers, plugin list)
//! - `user`: the current user's display settings (custom CSS, language)

mod user;
mod web;

pub use user::{CurrentSettings, UserSettings, PROP_CUSTOM_CSS, PROP_DISABLE_CUSTOM_CSS};
pub use web::{WebConfigFile, WebSettings};
