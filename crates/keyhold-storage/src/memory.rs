//! In-process object store
//!
//! Keeps objects in an ordered map behind an async lock. Listing follows S3
//! semantics (lexicographic order, delimiter grouping, continuation tokens)
//! so the key/value store and the lock behave exactly as they do against a
//! real bucket. Used by the test suites and for local dry runs.

use crate::error::{Error, Result};
use crate::object::{ListPage, ListRequest, ObjectMeta, ObjectStore, PutMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Bound;
use tokio::sync::RwLock;
use tracing::debug;

/// Default number of keys per listing page (matches S3's `max-keys`)
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// Object store held entirely in memory
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store that returns at most `page_size` keys per listing page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Insert an object with an explicit modification time
    ///
    /// Lets callers plant objects that look older than they are, e.g. an
    /// abandoned lock marker.
    pub async fn insert_with_modified(
        &self,
        key: &str,
        body: Vec<u8>,
        last_modified: DateTime<Utc>,
    ) {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified,
            },
        );
    }

    /// All keys currently stored, in order
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Check presence without going through `head`
    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>, mode: PutMode) -> Result<()> {
        let mut objects = self.objects.write().await;

        if mode == PutMode::CreateNew && objects.contains_key(key) {
            return Err(Error::already_exists(key));
        }

        debug!("memory put {} ({} bytes, {:?})", key, body.len(), mode);
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| Error::not_found(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.objects.write().await.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(key)),
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| ObjectMeta {
                last_modified: object.last_modified,
                size: object.body.len() as u64,
            })
            .ok_or_else(|| Error::not_found(key))
    }

    async fn list_page(
        &self,
        request: &ListRequest,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let objects = self.objects.read().await;

        let lower = match &continuation {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Included(request.prefix.clone()),
        };

        let mut matching = objects
            .range((lower, Bound::Unbounded))
            .map(|(key, _)| key)
            .skip_while(|key| !key.starts_with(&request.prefix))
            .take_while(|key| key.starts_with(&request.prefix))
            .filter(|key| match &request.delimiter {
                Some(delimiter) => !key[request.prefix.len()..].contains(delimiter.as_str()),
                None => true,
            });

        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next_token = if matching.next().is_some() {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
