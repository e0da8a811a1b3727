//! Command-line arguments and filesystem locations.

mod args;
mod paths;

pub use args::Cli;
pub use paths::{asset_path, resolve_data_dir};
