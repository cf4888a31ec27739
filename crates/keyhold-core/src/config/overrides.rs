//! Command line and environment overrides for file configuration

use crate::config::types::StorageConfig;
use std::path::PathBuf;

/// Values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub key_file: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Whether no override is set
    pub fn is_empty(&self) -> bool {
        self.bucket.is_none()
            && self.region.is_none()
            && self.endpoint.is_none()
            && self.access_key_id.is_none()
            && self.access_key_secret.is_none()
            && self.key_file.is_none()
    }

    /// Overwrite the fields of `config` that have an override
    pub fn apply(&self, config: &mut StorageConfig) {
        if let Some(bucket) = &self.bucket {
            config.bucket = bucket.clone();
        }
        if let Some(region) = &self.region {
            config.region = region.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(id) = &self.access_key_id {
            config.access_key_id = Some(id.clone());
        }
        if let Some(secret) = &self.access_key_secret {
            config.access_key_secret = Some(secret.clone());
        }
        if let Some(key_file) = &self.key_file {
            config.encryption.key_file = Some(key_file.clone());
        }
    }

    /// A configuration built from overrides alone, if they name a bucket and region
    pub(crate) fn standalone(&self) -> Option<StorageConfig> {
        match (&self.bucket, &self.region) {
            (Some(bucket), Some(region)) => Some(StorageConfig::new(bucket, region)),
            _ => None,
        }
    }
}
