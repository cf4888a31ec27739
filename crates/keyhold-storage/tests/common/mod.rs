//! Common test helpers for keyhold-storage integration tests
//!
//! Provides a recording, fault-injecting `ObjectStore` wrapped around the
//! in-memory store, plus fixture builders for `Storage`.

#![allow(dead_code)]

use async_trait::async_trait;
use keyhold_storage::{
    ChaChaCodec, Cleartext, EncryptionCodec, Error, ListPage, ListRequest, LockConfig,
    MemoryObjectStore, ObjectMeta, ObjectStore, PutMode, Result, Storage,
};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Lock timing used across tests: long lease, fast polling
pub fn quick_lock_config() -> LockConfig {
    LockConfig::new(Duration::from_secs(30), Duration::from_millis(20))
}

/// Storage over a fresh in-memory store
pub fn memory_storage(encrypted: bool) -> (Arc<MemoryObjectStore>, Storage) {
    let store = Arc::new(MemoryObjectStore::new());
    let codec: Arc<dyn EncryptionCodec> = if encrypted {
        Arc::new(ChaChaCodec::generate())
    } else {
        Arc::new(Cleartext)
    };
    let storage = Storage::from_parts(store.clone(), codec, quick_lock_config()).unwrap();
    (store, storage)
}

/// Storage over a scripted store
pub fn scripted_storage(config: LockConfig) -> (Arc<ScriptedStore>, Storage) {
    let store = Arc::new(ScriptedStore::new());
    let storage = Storage::from_parts(store.clone(), Arc::new(Cleartext), config).unwrap();
    (store, storage)
}

/// One recorded object store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Put(String, PutMode),
    Get(String),
    Delete(String),
    Head(String),
    List(String),
}

/// In-memory store that records calls and injects failures on request
pub struct ScriptedStore {
    inner: MemoryObjectStore,
    calls: Arc<Mutex<Vec<Call>>>,
    put_failure: Mutex<Option<String>>,
    head_failure: Mutex<Option<String>>,
    vanishing_heads: AtomicU32,
    delete_failures: AtomicU32,
    delete_delay: Mutex<Option<Duration>>,
    conditional_put: bool,
}

impl Default for ScriptedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            put_failure: Mutex::new(None),
            head_failure: Mutex::new(None),
            vanishing_heads: AtomicU32::new(0),
            delete_failures: AtomicU32::new(0),
            delete_delay: Mutex::new(None),
            conditional_put: true,
        }
    }

    /// A store that cannot create-if-absent
    pub fn without_conditional_put() -> Self {
        Self {
            conditional_put: false,
            ..Self::new()
        }
    }

    /// Underlying memory store (bypasses recording and faults)
    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    /// Every put fails with a transport error
    pub fn fail_puts(&self, message: &str) {
        *self.put_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Every head fails with a transport error
    pub fn fail_heads(&self, message: &str) {
        *self.head_failure.lock().unwrap() = Some(message.to_string());
    }

    /// The next `count` heads report NotFound regardless of contents
    pub fn vanish_heads(&self, count: u32) {
        self.vanishing_heads.store(count, Ordering::SeqCst);
    }

    /// The next `count` deletes fail with a transport error
    pub fn fail_deletes(&self, count: u32) {
        self.delete_failures.store(count, Ordering::SeqCst);
    }

    /// Every delete sleeps for `delay` before acting
    pub fn delay_deletes(&self, delay: Duration) {
        *self.delete_delay.lock().unwrap() = Some(delay);
    }

    /// Recorded calls in order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn put_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Put(..)))
    }

    pub fn head_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Head(_)))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete(_)))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_one(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn transport_error(operation: &'static str, key: &str, message: &str) -> Error {
    Error::transient(
        operation,
        key,
        io::Error::new(io::ErrorKind::Other, message.to_string()),
    )
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn put(&self, key: &str, body: Vec<u8>, mode: PutMode) -> Result<()> {
        self.record(Call::Put(key.to_string(), mode));
        if let Some(message) = self.put_failure.lock().unwrap().clone() {
            return Err(transport_error("put", key, &message));
        }
        self.inner.put(key, body, mode).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.record(Call::Get(key.to_string()));
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.record(Call::Delete(key.to_string()));
        let delay = *self.delete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if Self::take_one(&self.delete_failures) {
            return Err(transport_error("delete", key, "service unavailable"));
        }
        self.inner.delete(key).await
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta> {
        self.record(Call::Head(key.to_string()));
        if let Some(message) = self.head_failure.lock().unwrap().clone() {
            return Err(transport_error("head", key, &message));
        }
        if Self::take_one(&self.vanishing_heads) {
            return Err(Error::not_found(key));
        }
        self.inner.head(key).await
    }

    async fn list_page(
        &self,
        request: &ListRequest,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        self.record(Call::List(request.prefix.clone()));
        self.inner.list_page(request, continuation).await
    }

    fn supports_conditional_put(&self) -> bool {
        self.conditional_put
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
