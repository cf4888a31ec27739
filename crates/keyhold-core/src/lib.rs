//! # keyhold-core
//!
//! Core library for keyhold providing:
//! - Configuration file parsing (keyhold.yaml)
//! - Configuration validation and endpoint normalization
//! - Shared error type for configuration problems

pub mod config;
pub mod error;
pub mod utils;

pub use config::{ConfigOverrides, EncryptionConfig, KeyholdConfig, LockConfig, StorageConfig};
pub use error::{Error, Result};
pub use utils::{expand_path, get_home_dir, normalize_endpoint};
