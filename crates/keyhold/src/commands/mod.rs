//! CLI command implementations

pub mod check;
pub mod keygen;
pub mod lock;
pub mod object;

use anyhow::{Context, Result};
use keyhold_core::{ConfigOverrides, KeyholdConfig};
use keyhold_storage::Storage;
use std::path::PathBuf;

/// Config file location plus overrides, resolved lazily per command
#[derive(Debug, Default)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

impl Settings {
    /// Load and validate the effective configuration
    pub fn load(&self) -> Result<KeyholdConfig> {
        KeyholdConfig::load_with_overrides(self.config.as_deref(), &self.overrides)
            .context("Failed to load keyhold configuration")
    }

    /// Connect to the configured bucket
    pub async fn connect(&self) -> Result<Storage> {
        let config = self.load()?;
        Storage::connect(config.storage())
            .await
            .context("Failed to connect to object storage")
    }
}
