//! Client bootstrap.
//!
//! [`Bootstrap`] sequences connection setup, localization, plugin loading,
//! the UI mount and the optional feature bundles. Collaborators come in
//! through [`BootstrapDeps`]; the orchestrator keeps no global state. Plugins
//! get the event bus and task-button helper as load arguments.

mod orchestrator;
mod tasks;


pub use orchestrator::{BootOptions, Bootstrap, BootstrapDeps};
