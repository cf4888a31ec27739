//! Value encryption bound to the object key
//!
//! Values are sealed with ChaCha20-Poly1305. The object key is passed as
//! associated data and is never part of the payload, so ciphertext copied to
//! another key fails to open.
//!
//! Layout of a sealed value: `version (1) || nonce (12) || ciphertext + tag (16)`.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use keyhold_core::{expand_path, EncryptionConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroizing;

/// Size of the symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits for ChaCha20-Poly1305)
const NONCE_SIZE: usize = 12;

/// Size of the Poly1305 tag in bytes
const TAG_SIZE: usize = 16;

/// Format version prefixed to every sealed value
const FORMAT_V1: u8 = 0x01;

/// Authenticated encryption with the object key as associated data
pub trait EncryptionCodec: Send + Sync {
    /// Seal `plaintext` for storage at `key`
    fn encrypt(&self, plaintext: &[u8], key: &str) -> Result<Vec<u8>>;

    /// Open a value read from `key`
    ///
    /// Fails with [`Error::Authentication`] when the ciphertext was altered or
    /// was sealed for a different key.
    fn decrypt(&self, ciphertext: &[u8], key: &str) -> Result<Vec<u8>>;

    /// Codec name for log lines
    fn name(&self) -> &'static str;
}

/// Identity codec used when no encryption key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct Cleartext;

impl EncryptionCodec for Cleartext {
    fn encrypt(&self, plaintext: &[u8], _key: &str) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8], _key: &str) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }

    fn name(&self) -> &'static str {
        "cleartext"
    }
}

/// ChaCha20-Poly1305 codec with a random nonce per value
pub struct ChaChaCodec {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl ChaChaCodec {
    /// Create from raw key bytes (must be exactly 32 bytes)
    pub fn from_bytes(key_bytes: &[u8]) -> Result<Self> {
        if key_bytes.len() != KEY_SIZE {
            return Err(Error::key_material(
                "<memory>",
                format!("key must be {} bytes, got {} bytes", KEY_SIZE, key_bytes.len()),
            ));
        }

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(key_bytes);
        Ok(Self { key })
    }

    /// Create a codec with a freshly generated key
    pub fn generate() -> Self {
        let generated = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(generated.as_slice());
        Self { key }
    }

    /// Load from a key file holding the base64 encoded key
    ///
    /// Leading `~` and environment variables in the path are expanded.
    pub fn from_key_file(path: &Path) -> Result<Self> {
        let expanded = expand_path(&path.to_string_lossy())?;
        let display = expanded.display().to_string();

        let content = Zeroizing::new(std::fs::read_to_string(&expanded).map_err(|e| {
            Error::key_material(&display, format!("failed to read key file: {}", e))
        })?);

        let decoded = Zeroizing::new(
            BASE64
                .decode(content.trim())
                .map_err(|e| Error::key_material(&display, format!("invalid base64: {}", e)))?,
        );

        Self::from_bytes(&decoded).map_err(|e| match e {
            Error::KeyMaterial { message, .. } => Error::key_material(&display, message),
            other => other,
        })
    }

    /// Export the key as base64 (for writing key files)
    pub fn export_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(BASE64.encode(self.key.as_ref()))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.key.as_ref()))
    }
}

impl std::fmt::Debug for ChaChaCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaCodec").finish_non_exhaustive()
    }
}

impl EncryptionCodec for ChaChaCodec {
    fn encrypt(&self, plaintext: &[u8], key: &str) -> Result<Vec<u8>> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

        let sealed = self
            .cipher()
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|e| Error::encryption(key, e.to_string()))?;

        let mut out = Vec::with_capacity(1 + NONCE_SIZE + sealed.len());
        out.push(FORMAT_V1);
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &str) -> Result<Vec<u8>> {
        if ciphertext.len() < 1 + NONCE_SIZE + TAG_SIZE || ciphertext[0] != FORMAT_V1 {
            return Err(Error::authentication(key));
        }

        let (nonce_bytes, sealed) = ciphertext[1..].split_at(NONCE_SIZE);
        self.cipher()
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: sealed,
                    aad: key.as_bytes(),
                },
            )
            .map_err(|_| Error::authentication(key))
    }

    fn name(&self) -> &'static str {
        "chacha20poly1305"
    }
}

/// Pick the codec for a configuration: ChaCha20-Poly1305 when a key file is
/// configured, cleartext otherwise
pub fn codec_from_config(config: &EncryptionConfig) -> Result<Arc<dyn EncryptionCodec>> {
    match &config.key_file {
        Some(path) => {
            debug!("Loading encryption key from {}", path.display());
            Ok(Arc::new(ChaChaCodec::from_key_file(path)?))
        }
        None => {
            debug!("No encryption key configured, storing values in cleartext");
            Ok(Arc::new(Cleartext))
        }
    }
}

/// Generate a new key file
///
/// Refuses to replace an existing file unless `overwrite` is set. Returns the
/// expanded path that was written.
pub fn generate_key_file(path: &Path, overwrite: bool) -> Result<PathBuf> {
    let path = expand_path(&path.to_string_lossy())?;

    if path.exists() && !overwrite {
        return Err(Error::key_material(
            path.display().to_string(),
            "key file already exists. Use --force to overwrite",
        ));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let codec = ChaChaCodec::generate();
    std::fs::write(&path, codec.export_base64().as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(path)
}
