//! Object store capability consumed by the key/value store and the lock
//!
//! Implementations must report a missing object as [`Error::NotFound`] from
//! `get`, `head` and `delete`, and a lost create race as
//! [`Error::AlreadyExists`] from `put` with [`PutMode::CreateNew`].
//!
//! [`Error::NotFound`]: crate::Error::NotFound
//! [`Error::AlreadyExists`]: crate::Error::AlreadyExists

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Write semantics for [`ObjectStore::put`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Replace whatever is stored at the key
    Overwrite,
    /// Create only if the key is absent, atomically with respect to every
    /// other `CreateNew` on the same key
    CreateNew,
}

/// Metadata returned by [`ObjectStore::head`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Last write time as recorded by the store
    pub last_modified: DateTime<Utc>,
    /// Stored size in bytes
    pub size: u64,
}

/// Parameters of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix are returned
    pub prefix: String,
    /// When set, keys containing the delimiter after the prefix are grouped
    /// away and only direct children are returned
    pub delimiter: Option<String>,
}

impl ListRequest {
    /// List everything under `prefix`
    pub fn recursive(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
        }
    }

    /// List direct children of `prefix`, grouping on `/`
    pub fn shallow(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some("/".to_string()),
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Object keys in store order
    pub keys: Vec<String>,
    /// Continuation token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Flat object store primitives
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` at `key`
    async fn put(&self, key: &str, body: Vec<u8>, mode: PutMode) -> Result<()>;

    /// Read the full object at `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the object at `key`
    async fn delete(&self, key: &str) -> Result<()>;

    /// Fetch metadata for `key` without its body
    async fn head(&self, key: &str) -> Result<ObjectMeta>;

    /// Fetch one page of keys, continuing from `continuation` if given
    async fn list_page(
        &self,
        request: &ListRequest,
        continuation: Option<String>,
    ) -> Result<ListPage>;

    /// Whether `PutMode::CreateNew` is honoured atomically
    ///
    /// The distributed lock cannot guarantee exclusivity without it.
    fn supports_conditional_put(&self) -> bool {
        true
    }

    /// Short adapter name for log lines
    fn name(&self) -> &'static str;
}
