//! Error types for keyhold-storage

use thiserror::Error;

/// Result type alias using keyhold-storage's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error from an object store SDK
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Storage, encryption and locking errors
#[derive(Error, Debug)]
pub enum Error {
    /// Object is absent
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Conditional create hit an existing object
    #[error("Object already exists: {key}")]
    AlreadyExists { key: String },

    /// Ciphertext failed authentication (tampered, or stored under another key)
    #[error("Failed to authenticate object {key}: ciphertext was tampered with or belongs to another key")]
    Authentication { key: String },

    /// Encryption could not be performed
    #[error("Failed to encrypt object {key}: {message}")]
    Encryption { key: String, message: String },

    /// Network or service failure reported by the object store
    #[error("Failed {operation} for {key}: {source}")]
    Transient {
        operation: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },

    /// Caller cancelled a lock acquisition while it was waiting
    #[error("Lock acquisition cancelled: {key}")]
    Cancelled { key: String },

    /// The object store lacks a capability that an operation requires
    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    /// Encryption key file could not be read, parsed or written
    #[error("Invalid key material at {path}: {message}")]
    KeyMaterial { path: String, message: String },

    /// Configuration error
    #[error(transparent)]
    Config(#[from] keyhold_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an already exists error
    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create an authentication error
    pub fn authentication(key: impl Into<String>) -> Self {
        Self::Authentication { key: key.into() }
    }

    /// Create an encryption error
    pub fn encryption(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encryption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a transient error from any SDK error
    pub fn transient(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Transient {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }

    /// Create a cancelled error
    pub fn cancelled(key: impl Into<String>) -> Self {
        Self::Cancelled { key: key.into() }
    }

    /// Create an unsupported capability error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Create a key material error
    pub fn key_material(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::KeyMaterial {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error indicates a missing object
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this error indicates conditional create contention
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    /// Check if this error indicates a decryption/integrity failure
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Check if this error indicates cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Check if this error came from the object store transport
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_predicates() {
        assert!(Error::not_found("a").is_not_found());
        assert!(Error::already_exists("a.lock").is_already_exists());
        assert!(Error::authentication("a").is_authentication());
        assert!(Error::cancelled("a").is_cancelled());
        assert!(!Error::cancelled("a").is_not_found());
    }

    #[test]
    fn test_transient_keeps_source() {
        let err = Error::transient(
            "put",
            "certs/a.pem",
            io::Error::new(io::ErrorKind::TimedOut, "connection timeout"),
        );

        assert!(err.is_transient());
        let display = err.to_string();
        assert!(display.contains("put"));
        assert!(display.contains("certs/a.pem"));
        assert!(display.contains("connection timeout"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
