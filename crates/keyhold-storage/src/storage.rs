//! Storage facade
//!
//! Bundles the key/value store and the distributed lock over one object
//! store, the shape certificate managers expect from a storage backend.

use crate::codec::{codec_from_config, EncryptionCodec};
use crate::error::Result;
use crate::kv::{KeyInfo, KeyValueStore};
use crate::lock::{DistributedLock, LockGuard};
use crate::object::ObjectStore;
use crate::s3::S3ObjectStore;
use keyhold_core::{LockConfig, StorageConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Encrypted key/value storage with locking
#[derive(Debug, Clone)]
pub struct Storage {
    kv: KeyValueStore,
    lock: DistributedLock,
}

impl Storage {
    /// Connect to the bucket described by `config`
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let codec = codec_from_config(&config.encryption)?;
        let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(config).await?);

        info!(
            "Using bucket {} in {} (encryption: {})",
            config.bucket,
            config.region,
            codec.name()
        );
        Self::from_parts(store, codec, config.lock)
    }

    /// Wire an arbitrary object store and codec together
    pub fn from_parts(
        store: Arc<dyn ObjectStore>,
        codec: Arc<dyn EncryptionCodec>,
        lock_config: LockConfig,
    ) -> Result<Self> {
        let lock = DistributedLock::new(Arc::clone(&store), lock_config)?;
        Ok(Self {
            kv: KeyValueStore::new(store, codec),
            lock,
        })
    }

    pub async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        self.kv.store(key, value).await
    }

    pub async fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.kv.load(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.kv.delete(key).await
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.kv.exists(key).await
    }

    pub async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        self.kv.list(prefix, recursive).await
    }

    pub async fn stat(&self, key: &str) -> Result<KeyInfo> {
        self.kv.stat(key).await
    }

    pub async fn lock(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.lock.lock(key, cancel).await
    }

    pub async fn try_lock(&self, key: &str) -> Result<bool> {
        self.lock.try_lock(key).await
    }

    pub async fn lock_guard(&self, key: &str, cancel: &CancellationToken) -> Result<LockGuard> {
        self.lock.lock_guard(key, cancel).await
    }

    pub async fn unlock(&self, key: &str) -> Result<()> {
        self.lock.unlock(key).await
    }

    /// The key/value half
    pub fn kv(&self) -> &KeyValueStore {
        &self.kv
    }

    /// The lock half
    pub fn locker(&self) -> &DistributedLock {
        &self.lock
    }
}
