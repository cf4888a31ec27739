//! Encrypted key/value storage with distributed locking
//!
//! This crate layers two things on top of a flat object store
//! (put/get/delete/head/list plus create-if-absent):
//! - **Confidentiality**: every value is sealed with ChaCha20-Poly1305 using
//!   the object key as associated data, so ciphertext cannot be replayed
//!   under another key
//! - **Mutual exclusion**: a lease-based lock whose only synchronization
//!   primitive is the store's conditional put
//!
//! ## Usage
//!
//! ```ignore
//! use keyhold_storage::Storage;
//! use tokio_util::sync::CancellationToken;
//!
//! let storage = Storage::connect(&config).await?;
//! let token = CancellationToken::new();
//!
//! storage.lock("certs/example.com", &token).await?;
//! if !storage.exists("certs/example.com/cert.pem").await {
//!     storage.store("certs/example.com/cert.pem", b"PEM-DATA").await?;
//! }
//! storage.unlock("certs/example.com").await?;
//! ```

pub mod codec;
pub mod error;
pub mod kv;
pub mod lock;
pub mod memory;
pub mod object;
pub mod s3;
pub mod storage;

pub use codec::{
    codec_from_config, generate_key_file, ChaChaCodec, Cleartext, EncryptionCodec, KEY_SIZE,
};
pub use error::{Error, Result};
pub use kv::{KeyInfo, KeyValueStore};
pub use lock::{lock_key, DistributedLock, LockGuard, LOCK_SUFFIX};
pub use memory::MemoryObjectStore;
pub use object::{ListPage, ListRequest, ObjectMeta, ObjectStore, PutMode};
pub use s3::S3ObjectStore;
pub use storage::Storage;

pub use keyhold_core::LockConfig;
pub use tokio_util::sync::CancellationToken;
