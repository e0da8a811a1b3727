use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolve the data directory, creating it if needed.
///
/// Defaults to ~/.mediaboot.
pub fn resolve_data_dir(data_dir: Option<&str>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(dir) => PathBuf::from(dir),
        None => dirs::home_dir()
            .context("Could not determine home directory")?
            .join(".mediaboot"),
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {:?}", dir))?;

    Ok(dir)
}

/// Use `explicit` when given, otherwise `<assets_dir>/<default_name>`.
pub fn asset_path(assets_dir: &Path, explicit: Option<&str>, default_name: &str) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .unwrap_or_else(|| assets_dir.join(default_name))
}
