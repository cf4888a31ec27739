//! Shared utility functions for keyhold crates

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Get the user's home directory
///
/// Prefers the HOME environment variable over `dirs::home_dir()` so that
/// containers overriding HOME behave the same as shell scripts.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir()
        .ok_or_else(|| Error::invalid_config("Could not determine home directory"))
}

/// Expand a leading `~` and environment variables in a path
pub fn expand_path(path: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(path).map_err(|e| Error::path_expansion(path, e.to_string()))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Normalize an object store endpoint into a URL
///
/// Bare host names get an `https://` scheme. Endpoints that already carry
/// `http://` or `https://` are kept as-is, minus any trailing slash.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
