//! Console commands read from stdin while the client runs.
//!
//! Each line is one command. They drive the same collaborators the page
//! would: signing in and out goes through [`ServerConnections`], display
//! settings through [`CurrentSettings`], and app resume and page views are
//! raised on the event bus.

mod status;

pub use status::StatusView;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use crate::connection::ServerConnections;
use crate::events::{Event, EventBus, EventSource};
use crate::settings::CurrentSettings;

#[derive(Parser, Debug)]
#[command(name = "mediaboot", no_binary_name = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Sign in to the current server
    Login { user_id: String, access_token: String },
    /// Sign out of the current server
    Logout,
    /// Replace the custom CSS (no arguments clears it)
    Css {
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        css: Vec<String>,
    },
    /// Turn server branding CSS on or off
    Branding { state: Toggle },
    /// Set the preferred culture (no argument resets it)
    Language { culture: Option<String> },
    /// Raise an app resume
    Resume,
    /// Show a page with the given classes
    Show {
        #[arg(required = true)]
        classes: Vec<String>,
    },
    /// Hide a page with the given classes
    Hide {
        #[arg(required = true)]
        classes: Vec<String>,
    },
    /// Print the client status
    Status,
    /// Exit the client
    #[command(alias = "exit")]
    Quit,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

/// What the caller should do after a line ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFlow {
    Continue,
    Status,
    Quit,
}

/// Parse one console line. Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ConsoleLine::try_parse_from(words).map(|line| Some(line.command))
}

pub struct Console {
    events: EventBus,
    connections: Arc<ServerConnections>,
    settings: Arc<CurrentSettings>,
}

impl Console {
    pub fn new(
        events: EventBus,
        connections: Arc<ServerConnections>,
        settings: Arc<CurrentSettings>,
    ) -> Self {
        Self {
            events,
            connections,
            settings,
        }
    }

    /// Parse and run one line. Usage errors are printed, not returned.
    pub async fn run_line(&self, line: &str) -> Result<ConsoleFlow> {
        match parse_line(line) {
            Ok(Some(command)) => self.execute(command).await,
            Ok(None) => Ok(ConsoleFlow::Continue),
            Err(e) => {
                println!("{}", e);
                Ok(ConsoleFlow::Continue)
            }
        }
    }

    pub async fn execute(&self, command: ConsoleCommand) -> Result<ConsoleFlow> {
        debug!("Console command: {:?}", command);

        match command {
            ConsoleCommand::Login {
                user_id,
                access_token,
            } => {
                self.connections.sign_in(&user_id, &access_token).await?;
                println!("✅ Signed in as {}", user_id);
            }
            ConsoleCommand::Logout => {
                self.connections.sign_out().await?;
                println!("✅ Signed out");
            }
            ConsoleCommand::Css { css } => {
                self.settings.set_custom_css(css.join(" ")).await?;
            }
            ConsoleCommand::Branding { state } => {
                self.settings
                    .set_disable_custom_css(state == Toggle::Off)
                    .await?;
            }
            ConsoleCommand::Language { culture } => {
                self.settings.set_language(culture).await?;
            }
            ConsoleCommand::Resume => {
                self.events.trigger(EventSource::AppHost, Event::Resume).await;
            }
            ConsoleCommand::Show { classes } => {
                self.events
                    .trigger(EventSource::Pages, Event::ViewShow { classes })
                    .await;
            }
            ConsoleCommand::Hide { classes } => {
                self.events
                    .trigger(EventSource::Pages, Event::ViewHide { classes })
                    .await;
            }
            ConsoleCommand::Status => return Ok(ConsoleFlow::Status),
            ConsoleCommand::Quit => return Ok(ConsoleFlow::Quit),
        }

        Ok(ConsoleFlow::Continue)
    }
}
