//! Configuration types and file loading

mod loader;
mod overrides;
mod types;

pub use loader::{KeyholdConfig, CONFIG_FILE_NAMES};
pub use overrides::ConfigOverrides;
pub use types::{EncryptionConfig, LockConfig, StorageConfig};
