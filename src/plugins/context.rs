//! What a plugin gets handed when it loads.
//!
//! Plugins subscribe to client events through the shared [`EventBus`] and
//! attach scheduled-task controls through a [`TaskButton`]. Both arrive as
//! arguments; nothing is published globally.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::events::EventBus;

/// Binds a control to a server scheduled task.
pub trait TaskButton: Send + Sync {
    /// Start tracking `task_key`. Binding the same key twice is a no-op.
    fn bind(&self, task_key: &str);
}

/// Task buttons for the scheduled tasks plugins asked for.
#[derive(Debug, Default)]
pub struct ScheduledTaskButtons {
    bound: Mutex<BTreeSet<String>>,
}

impl ScheduledTaskButtons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound task keys, sorted.
    pub fn bound(&self) -> Vec<String> {
        self.bound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl TaskButton for ScheduledTaskButtons {
    fn bind(&self, task_key: &str) {
        let inserted = self
            .bound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(task_key.to_string());
        if inserted {
            debug!("Task button bound to {}", task_key);
        }
    }
}

/// Collaborators passed to every plugin load.
#[derive(Clone)]
pub struct PluginContext {
    pub events: EventBus,
    pub task_button: Arc<dyn TaskButton>,
}

impl PluginContext {
    pub fn new(events: EventBus, task_button: Arc<dyn TaskButton>) -> Self {
        Self {
            events,
            task_button,
        }
    }
}
