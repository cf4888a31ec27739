//! Encrypted key/value store
//!
//! Composes an [`EncryptionCodec`] with an [`ObjectStore`]. Holds no locking
//! semantics of its own: callers wrap multi-step sequences in a
//! [`DistributedLock`](crate::DistributedLock).

use crate::codec::EncryptionCodec;
use crate::error::{Error, Result};
use crate::object::{ListRequest, ObjectStore, PutMode};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Metadata projection of a stored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: String,
    pub modified: DateTime<Utc>,
    /// Stored (ciphertext) size in bytes
    pub size: u64,
    /// Always true: the store has no pseudo-directories
    pub is_terminal: bool,
}

/// Key/value operations over an object store with client-side encryption
#[derive(Clone)]
pub struct KeyValueStore {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn EncryptionCodec>,
}

impl KeyValueStore {
    pub fn new(store: Arc<dyn ObjectStore>, codec: Arc<dyn EncryptionCodec>) -> Self {
        Self { store, codec }
    }

    /// Encrypt `value` bound to `key` and write it, replacing any previous value
    pub async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        let sealed = self.codec.encrypt(value, key)?;
        debug!(
            "Storing {} ({} bytes, codec {})",
            key,
            sealed.len(),
            self.codec.name()
        );
        self.store.put(key, sealed, PutMode::Overwrite).await
    }

    /// Read and decrypt the value at `key`
    pub async fn load(&self, key: &str) -> Result<Vec<u8>> {
        let sealed = self.store.get(key).await?;
        debug!("Loaded {} ({} bytes)", key, sealed.len());
        self.codec.decrypt(&sealed, key)
    }

    /// Delete `key`; deleting a missing key succeeds
    pub async fn delete(&self, key: &str) -> Result<()> {
        match self.store.delete(key).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(Error::NotFound { .. }) => {
                debug!("Delete of {} skipped, already absent", key);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `key` exists
    ///
    /// Any error, including transport failures, reads as absent. Use
    /// [`stat`](Self::stat) when the difference matters.
    pub async fn exists(&self, key: &str) -> bool {
        match self.store.head(key).await {
            Ok(_) => true,
            Err(e) => {
                if !e.is_not_found() {
                    debug!("Treating {} as absent after head failed: {}", key, e);
                }
                false
            }
        }
    }

    /// Metadata for `key`
    pub async fn stat(&self, key: &str) -> Result<KeyInfo> {
        let meta = self.store.head(key).await?;
        Ok(KeyInfo {
            key: key.to_string(),
            modified: meta.last_modified,
            size: meta.size,
            is_terminal: true,
        })
    }

    /// List keys under `prefix`
    ///
    /// A non-empty prefix is treated as a directory (a trailing `/` is
    /// added). Without `recursive` only direct children are returned. Pages
    /// are followed until the store reports no continuation.
    pub async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>> {
        let prefix = directory_prefix(prefix);
        let request = if recursive {
            ListRequest::recursive(prefix)
        } else {
            ListRequest::shallow(prefix)
        };

        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self.store.list_page(&request, continuation).await?;
            pages += 1;
            keys.extend(page.keys);

            match page.next_token {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        debug!(
            "Listed {} keys under '{}' in {} page(s)",
            keys.len(),
            request.prefix,
            pages
        );
        Ok(keys)
    }

    /// The underlying object store
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("store", &self.store.name())
            .field("codec", &self.codec.name())
            .finish()
    }
}

fn directory_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}
