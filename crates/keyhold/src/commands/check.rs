//! Configuration and connectivity check

use anyhow::{anyhow, Context, Result};
use keyhold_storage::{codec_from_config, S3ObjectStore};

use super::Settings;
use crate::output;

pub async fn run(settings: &Settings) -> Result<()> {
    let config = settings.load()?;
    let storage = config.storage();

    output::header("Configuration");
    match &config.config_path {
        Some(path) => output::kv("File", &path.display().to_string()),
        None => output::kv("File", "(none, using overrides)"),
    }
    output::kv("Bucket", &storage.bucket);
    output::kv("Region", &storage.region);
    if let Some(endpoint) = storage.endpoint_url() {
        output::kv("Endpoint", &endpoint);
        output::kv("Path-style", &storage.force_path_style.to_string());
    }
    output::kv(
        "Credentials",
        if storage.static_credentials().is_some() {
            "static"
        } else {
            "default provider chain"
        },
    );
    output::kv(
        "Conditional writes",
        if storage.conditional_writes {
            "enabled"
        } else {
            "disabled (locking unavailable)"
        },
    );
    output::kv(
        "Lock lease",
        &format!(
            "{}ms (poll every {}ms)",
            storage.lock.lease_expiration_ms, storage.lock.poll_interval_ms
        ),
    );

    let codec = codec_from_config(&storage.encryption).context("Failed to load encryption key")?;
    output::kv("Encryption", codec.name());
    if !storage.encryption.is_enabled() {
        output::warning("No key_file configured; values are stored in cleartext");
    }

    output::header("Connectivity");
    let store = S3ObjectStore::new(storage)
        .await
        .context("Failed to create object store client")?;

    if !store
        .check_bucket()
        .await
        .context("Failed to reach object storage")?
    {
        return Err(anyhow!("Bucket '{}' does not exist", storage.bucket));
    }

    output::success(&format!("Bucket {} is accessible", storage.bucket));
    Ok(())
}
