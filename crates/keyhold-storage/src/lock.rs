//! Distributed lock on top of an object store
//!
//! A lock on `key` is an empty marker object at `key.lock`. Creating the
//! marker with a conditional put is the only step that grants ownership;
//! every other check (head, staleness, cleanup) merely decides whether to try
//! again. Markers older than the lease are stale and may be removed by any
//! caller, after which all contenders race on the conditional put again.
//! A missing marker is the only store error tolerated along the way; any
//! other failure aborts the acquisition.
//!
//! There is no fairness between waiters. After a holder crashes, the lock
//! becomes available within `lease_expiration + poll_interval`.

use crate::error::{Error, Result};
use crate::object::{ObjectMeta, ObjectStore, PutMode};
use chrono::Utc;
use keyhold_core::LockConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Suffix appended to a key to form its lock marker
pub const LOCK_SUFFIX: &str = ".lock";

/// Marker key for `key`
pub fn lock_key(key: &str) -> String {
    format!("{}{}", key, LOCK_SUFFIX)
}

/// Outcome of one acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Our conditional put created the marker
    Acquired,
    /// Marker vanished or was reclaimed; try again without waiting
    Retry,
    /// Marker is held by someone else; wait one poll interval
    Wait,
}

/// Lease-based mutual exclusion across processes
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn ObjectStore>,
    config: LockConfig,
}

impl DistributedLock {
    /// Create a lock over `store`
    ///
    /// Fails when the store cannot create objects atomically-if-absent, since
    /// exclusivity cannot be guaranteed without it.
    pub fn new(store: Arc<dyn ObjectStore>, config: LockConfig) -> Result<Self> {
        if !store.supports_conditional_put() {
            return Err(Error::unsupported(format!(
                "object store '{}' does not support conditional put; locking requires create-if-absent",
                store.name()
            )));
        }
        config.validate()?;

        Ok(Self { store, config })
    }

    /// Lease and polling settings
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Acquire the lock for `key`, waiting while another caller holds it
    ///
    /// Cancellation is observed before every attempt and while waiting. A
    /// conditional put already in flight is allowed to finish, so a cancelled
    /// call never leaves behind a marker it did not report as acquired.
    ///
    /// Even after acquiring, an idempotent operation may already have been
    /// performed by a previous holder; check before repeating it.
    pub async fn lock(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        let marker = lock_key(key);
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("Lock {} cancelled after {} attempts", marker, attempts);
                return Err(Error::cancelled(key));
            }

            attempts += 1;
            match self.attempt(&marker).await? {
                Attempt::Acquired => {
                    info!("Acquired lock {} after {} attempt(s)", marker, attempts);
                    return Ok(());
                }
                Attempt::Retry => continue,
                Attempt::Wait => self.wait(key, cancel).await?,
            }
        }
    }

    /// Try to acquire the lock for `key` without waiting
    ///
    /// Returns `false` when another caller holds a live lease.
    pub async fn try_lock(&self, key: &str) -> Result<bool> {
        let marker = lock_key(key);

        loop {
            match self.attempt(&marker).await? {
                Attempt::Acquired => {
                    info!("Acquired lock {}", marker);
                    return Ok(true);
                }
                Attempt::Retry => continue,
                Attempt::Wait => {
                    debug!("Lock {} is held elsewhere", marker);
                    return Ok(false);
                }
            }
        }
    }

    /// Acquire the lock and return a guard that releases it
    pub async fn lock_guard(&self, key: &str, cancel: &CancellationToken) -> Result<LockGuard> {
        self.lock(key, cancel).await?;
        Ok(LockGuard {
            lock: self.clone(),
            key: key.to_string(),
            released: false,
        })
    }

    /// Release the lock for `key`
    ///
    /// The delete runs on its own task, so it completes even if the caller's
    /// future is dropped or the caller's token has fired. A missing marker is
    /// not an error.
    pub async fn unlock(&self, key: &str) -> Result<()> {
        let marker = lock_key(key);
        let store = Arc::clone(&self.store);
        let task_marker = marker.clone();

        let handle = tokio::spawn(async move { store.delete(&task_marker).await });

        match handle.await {
            Ok(Ok(())) => {
                info!("Released lock {}", marker);
                Ok(())
            }
            Ok(Err(Error::NotFound { .. })) => {
                debug!("Lock {} was already released", marker);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(join_error) => Err(Error::transient("unlock", marker, join_error)),
        }
    }

    async fn attempt(&self, marker: &str) -> Result<Attempt> {
        match self.store.put(marker, Vec::new(), PutMode::CreateNew).await {
            Ok(()) => return Ok(Attempt::Acquired),
            Err(Error::AlreadyExists { .. }) => {}
            Err(e) => return Err(e),
        }

        let meta = match self.store.head(marker).await {
            Ok(meta) => meta,
            Err(Error::NotFound { .. }) => {
                debug!("Lock {} disappeared before inspection, retrying", marker);
                return Ok(Attempt::Retry);
            }
            Err(e) => return Err(e),
        };

        if !self.is_stale(&meta) {
            return Ok(Attempt::Wait);
        }

        info!(
            "Reclaiming stale lock {} (last modified {})",
            marker, meta.last_modified
        );
        match self.store.delete(marker).await {
            Ok(()) | Err(Error::NotFound { .. }) => Ok(Attempt::Retry),
            Err(e) => Err(e),
        }
    }

    fn is_stale(&self, meta: &ObjectMeta) -> bool {
        match Utc::now()
            .signed_duration_since(meta.last_modified)
            .to_std()
        {
            Ok(age) => age > self.config.lease_expiration(),
            // Marker timestamp is ahead of our clock
            Err(_) => false,
        }
    }

    async fn wait(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Lock {} cancelled while waiting", lock_key(key));
                Err(Error::cancelled(key))
            }
            _ = tokio::time::sleep(self.config.poll_interval()) => Ok(()),
        }
    }
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

/// A held lock
///
/// Call [`release`](LockGuard::release) when the critical section ends.
/// Dropping an unreleased guard leaves the marker in place until its lease
/// expires.
#[derive(Debug)]
pub struct LockGuard {
    lock: DistributedLock,
    key: String,
    released: bool,
}

impl LockGuard {
    /// Key this guard holds
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        self.lock.unlock(&self.key).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Lock guard for {} dropped without release; lock held until lease expires",
                self.key
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryObjectStore;
    use std::time::Duration;

    fn quick_config() -> LockConfig {
        LockConfig::new(Duration::from_secs(5), Duration::from_millis(10))
    }

    fn new_lock() -> (Arc<MemoryObjectStore>, DistributedLock) {
        let store = Arc::new(MemoryObjectStore::new());
        let lock = DistributedLock::new(store.clone(), quick_config()).unwrap();
        (store, lock)
    }

    #[test]
    fn test_lock_key() {
        assert_eq!(lock_key("certs/example.com"), "certs/example.com.lock");
    }

    #[tokio::test]
    async fn test_lock_creates_and_unlock_removes_marker() {
        let (store, lock) = new_lock();
        let token = CancellationToken::new();

        lock.lock("issue/example.com", &token).await.unwrap();
        assert!(store.contains("issue/example.com.lock").await);

        lock.unlock("issue/example.com").await.unwrap();
        assert!(!store.contains("issue/example.com.lock").await);
    }

    #[tokio::test]
    async fn test_unlock_without_lock_is_ok() {
        let (_, lock) = new_lock();
        assert!(lock.unlock("never-locked").await.is_ok());
    }

    #[tokio::test]
    async fn test_try_lock_contention() {
        let (_, lock) = new_lock();

        assert!(lock.try_lock("r").await.unwrap());
        assert!(!lock.try_lock("r").await.unwrap());

        lock.unlock("r").await.unwrap();
        assert!(lock.try_lock("r").await.unwrap());
    }

    #[tokio::test]
    async fn test_different_keys_are_independent() {
        let (_, lock) = new_lock();
        let token = CancellationToken::new();

        lock.lock("a", &token).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), lock.lock("b", &token))
            .await
            .expect("lock on an unrelated key must not wait")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_marker_is_reclaimed() {
        let (store, lock) = new_lock();
        let abandoned = Utc::now() - chrono::Duration::seconds(30);
        store
            .insert_with_modified("r.lock", Vec::new(), abandoned)
            .await;

        assert!(lock.try_lock("r").await.unwrap());
        let meta = store.head("r.lock").await.unwrap();
        assert!(meta.last_modified > abandoned);
    }

    #[tokio::test]
    async fn test_future_dated_marker_is_not_stale() {
        let (store, lock) = new_lock();
        store
            .insert_with_modified("r.lock", Vec::new(), Utc::now() + chrono::Duration::hours(1))
            .await;

        assert!(!lock.try_lock("r").await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (store, lock) = new_lock();
        let token = CancellationToken::new();
        token.cancel();

        let err = lock.lock("r", &token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_guard_release() {
        let (store, lock) = new_lock();
        let token = CancellationToken::new();

        let guard = lock.lock_guard("r", &token).await.unwrap();
        assert_eq!(guard.key(), "r");
        assert!(store.contains("r.lock").await);

        guard.release().await.unwrap();
        assert!(!store.contains("r.lock").await);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let store = Arc::new(MemoryObjectStore::new());
        let config = LockConfig::new(Duration::from_millis(10), Duration::from_millis(50));
        assert!(DistributedLock::new(store, config).is_err());
    }
}
