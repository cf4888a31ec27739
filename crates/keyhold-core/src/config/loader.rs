//! Configuration file loading and parsing

use crate::config::overrides::ConfigOverrides;
use crate::config::types::StorageConfig;
use crate::error::{Error, Result};
use crate::utils::get_home_dir;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &["keyhold.yaml", "keyhold.yml"];

/// Loaded and validated keyhold configuration
#[derive(Debug, Clone)]
pub struct KeyholdConfig {
    /// The parsed configuration
    pub storage: StorageConfig,

    /// Path the configuration was read from, if any
    pub config_path: Option<PathBuf>,
}

impl KeyholdConfig {
    /// Load configuration from the specified path or search for it
    ///
    /// The result is validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_overrides(path, &ConfigOverrides::default())
    }

    /// Load configuration and apply command line / environment overrides
    ///
    /// When no file is given and none is found, the overrides alone are used
    /// as long as they name a bucket and a region.
    pub fn load_with_overrides(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let located = match path {
            Some(p) => read_config(p).map(|content| (p.to_path_buf(), content)),
            None => Self::find_config(),
        };

        let (mut storage, config_path) = match located {
            Ok((config_path, content)) => {
                debug!("Loaded configuration from {}", config_path.display());
                (serde_yaml_ng::from_str(&content)?, Some(config_path))
            }
            Err(Error::ConfigNotFound { path: searched }) if path.is_none() => {
                match overrides.standalone() {
                    Some(storage) => {
                        debug!("No configuration file found, using overrides only");
                        (storage, None)
                    }
                    None => return Err(Error::ConfigNotFound { path: searched }),
                }
            }
            Err(e) => return Err(e),
        };

        overrides.apply(&mut storage);
        storage.validate()?;
        Ok(Self {
            storage,
            config_path,
        })
    }

    /// Parse and validate configuration content
    pub fn from_yaml(content: &str, config_path: PathBuf) -> Result<Self> {
        let storage: StorageConfig = serde_yaml_ng::from_str(content)?;
        storage.validate()?;
        Ok(Self {
            storage,
            config_path: Some(config_path),
        })
    }

    /// Search the current directory, then `~/.config/keyhold/`
    fn find_config() -> Result<(PathBuf, String)> {
        let mut dirs = vec![std::env::current_dir()?];
        if let Ok(home) = get_home_dir() {
            dirs.push(home.join(".config").join("keyhold"));
        }

        for dir in &dirs {
            for name in CONFIG_FILE_NAMES {
                let path = dir.join(name);
                if path.exists() {
                    let content = read_config(&path)?;
                    return Ok((path, content));
                }
            }
        }

        Err(Error::config_not_found(
            "keyhold.yaml (searched current directory and ~/.config/keyhold)",
        ))
    }

    /// Get the storage configuration
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Consume and return the storage configuration
    pub fn into_storage(self) -> StorageConfig {
        self.storage
    }
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::config_not_found(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::TempDir;

    const FULL_CONFIG: &str = r#"
bucket: certificates
region: oss-cn-hangzhou
endpoint: oss-cn-hangzhou.aliyuncs.com
access_key_id: test-access-key-id
access_key_secret: test-access-key-secret
conditional_writes: true
encryption:
  key_file: /etc/keyhold/master.key
lock:
  lease_expiration_ms: 30000
  poll_interval_ms: 250
"#;

    #[test]
    fn test_load_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keyhold.yaml");
        fs::write(&path, FULL_CONFIG).unwrap();

        let config = KeyholdConfig::load(Some(&path)).unwrap();
        let storage = config.storage();
        assert_eq!(storage.bucket, "certificates");
        assert_eq!(
            storage.endpoint_url().as_deref(),
            Some("https://oss-cn-hangzhou.aliyuncs.com")
        );
        assert_eq!(
            storage.encryption.key_file.as_deref(),
            Some(Path::new("/etc/keyhold/master.key"))
        );
        assert_eq!(storage.lock.lease_expiration(), Duration::from_secs(30));
        assert_eq!(storage.lock.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");

        let err = KeyholdConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let err = KeyholdConfig::from_yaml("bucket: certs\nregion: \"\"\n", PathBuf::from("x"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_load_rejects_malformed_yaml() {
        let err = KeyholdConfig::from_yaml("bucket: [unterminated", PathBuf::from("x"))
            .unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("keyhold.yml"),
            "bucket: found\nregion: us-east-1\n",
        )
        .unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let result = KeyholdConfig::load(None);
        std::env::set_current_dir(previous).unwrap();

        assert_eq!(result.unwrap().storage.bucket, "found");
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keyhold.yaml");
        fs::write(&path, FULL_CONFIG).unwrap();

        let overrides = ConfigOverrides {
            bucket: Some("staging-certificates".to_string()),
            key_file: Some(PathBuf::from("/tmp/other.key")),
            ..Default::default()
        };
        let config = KeyholdConfig::load_with_overrides(Some(&path), &overrides).unwrap();

        assert_eq!(config.storage.bucket, "staging-certificates");
        assert_eq!(config.storage.region, "oss-cn-hangzhou");
        assert_eq!(
            config.storage.encryption.key_file.as_deref(),
            Some(Path::new("/tmp/other.key"))
        );
    }

    #[test]
    fn test_overrides_are_validated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keyhold.yaml");
        fs::write(&path, "bucket: certs\nregion: us-east-1\n").unwrap();

        let overrides = ConfigOverrides {
            access_key_id: Some("only-the-id".to_string()),
            ..Default::default()
        };
        let err = KeyholdConfig::load_with_overrides(Some(&path), &overrides).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_explicit_missing_file_ignores_overrides() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            bucket: Some("certs".to_string()),
            region: Some("us-east-1".to_string()),
            ..Default::default()
        };

        let err = KeyholdConfig::load_with_overrides(Some(&dir.path().join("nope.yaml")), &overrides)
            .unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }

    #[test]
    #[serial]
    fn test_overrides_without_any_file() {
        let dir = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            bucket: Some("certs".to_string()),
            region: Some("us-east-1".to_string()),
            ..Default::default()
        };

        let previous_dir = std::env::current_dir().unwrap();
        let previous_home = std::env::var_os("HOME");
        std::env::set_current_dir(dir.path()).unwrap();
        std::env::set_var("HOME", home.path());

        let found = KeyholdConfig::load_with_overrides(None, &overrides);
        let missing = KeyholdConfig::load(None);

        std::env::set_current_dir(previous_dir).unwrap();
        match previous_home {
            Some(h) => std::env::set_var("HOME", h),
            None => std::env::remove_var("HOME"),
        }

        let config = found.unwrap();
        assert_eq!(config.storage.bucket, "certs");
        assert!(config.config_path.is_none());
        assert!(matches!(missing.unwrap_err(), Error::ConfigNotFound { .. }));
    }
}
