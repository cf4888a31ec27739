//! Configuration types
//!
//! The on-disk layout of `keyhold.yaml` maps one-to-one onto
//! [`StorageConfig`].

use crate::error::{Error, Result};
use crate::utils::normalize_endpoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Object store connection, encryption and lock settings
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket holding both data objects and lock markers
    pub bucket: String,
    /// Region of the bucket
    pub region: String,
    /// Custom S3-compatible endpoint (OSS, MinIO, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Static access key ID; the SDK default chain is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    /// Static access key secret, paired with `access_key_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_secret: Option<String>,
    /// Whether the store honours `If-None-Match: *` on put
    #[serde(default = "default_conditional_writes")]
    pub conditional_writes: bool,
    /// Use path-style addressing with a custom endpoint (MinIO); turn off
    /// for services that require virtual-hosted buckets (OSS)
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    /// Client-side encryption
    #[serde(default)]
    pub encryption: EncryptionConfig,
    /// Distributed lock timing
    #[serde(default)]
    pub lock: LockConfig,
}

fn default_conditional_writes() -> bool {
    true
}

fn default_force_path_style() -> bool {
    true
}

impl StorageConfig {
    /// Create a configuration for a bucket with every optional field at its default
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            access_key_id: None,
            access_key_secret: None,
            conditional_writes: default_conditional_writes(),
            force_path_style: default_force_path_style(),
            encryption: EncryptionConfig::default(),
            lock: LockConfig::default(),
        }
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::invalid_config("bucket must be defined"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::invalid_config("region must be defined"));
        }
        if let Some(endpoint) = &self.endpoint {
            if endpoint.trim().is_empty() {
                return Err(Error::invalid_config("endpoint must not be empty when set"));
            }
        }
        match (&self.access_key_id, &self.access_key_secret) {
            (Some(_), None) => {
                return Err(Error::invalid_config(
                    "access_key_secret must be defined when access_key_id is set",
                ))
            }
            (None, Some(_)) => {
                return Err(Error::invalid_config(
                    "access_key_id must be defined when access_key_secret is set",
                ))
            }
            _ => {}
        }
        self.lock.validate()
    }

    /// Endpoint URL with a scheme, if a custom endpoint is configured
    pub fn endpoint_url(&self) -> Option<String> {
        self.endpoint.as_deref().map(normalize_endpoint)
    }

    /// Static credentials as an (id, secret) pair, if both are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.access_key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "access_key_secret",
                &self.access_key_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("conditional_writes", &self.conditional_writes)
            .field("force_path_style", &self.force_path_style)
            .field("encryption", &self.encryption)
            .field("lock", &self.lock)
            .finish()
    }
}

/// Client-side encryption configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Path to a base64 encoded 256-bit key; values are stored in cleartext when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
}

impl EncryptionConfig {
    /// Whether a key file is configured
    pub fn is_enabled(&self) -> bool {
        self.key_file.is_some()
    }
}

/// Lease and polling settings for the distributed lock
///
/// Fixed at construction time of the lock; nothing mutates it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Age after which a lock marker is considered stale
    #[serde(default = "default_lease_expiration_ms")]
    pub lease_expiration_ms: u64,
    /// Delay between acquisition attempts while the lock is held elsewhere
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_lease_expiration_ms() -> u64 {
    60_000 // 1 minute
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_expiration_ms: default_lease_expiration_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl LockConfig {
    /// Build from durations
    pub fn new(lease_expiration: Duration, poll_interval: Duration) -> Self {
        Self {
            lease_expiration_ms: lease_expiration.as_millis() as u64,
            poll_interval_ms: poll_interval.as_millis() as u64,
        }
    }

    pub fn lease_expiration(&self) -> Duration {
        Duration::from_millis(self.lease_expiration_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check that both durations are positive and polling is faster than expiry
    pub fn validate(&self) -> Result<()> {
        if self.lease_expiration_ms == 0 {
            return Err(Error::invalid_config(
                "lock.lease_expiration_ms must be greater than zero",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::invalid_config(
                "lock.poll_interval_ms must be greater than zero",
            ));
        }
        if self.poll_interval_ms >= self.lease_expiration_ms {
            return Err(Error::invalid_config(format!(
                "lock.poll_interval_ms ({}) must be shorter than lock.lease_expiration_ms ({})",
                self.poll_interval_ms, self.lease_expiration_ms
            )));
        }
        Ok(())
    }
}
