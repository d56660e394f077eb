//! Storage error types.

/// Errors that can occur while reading or writing policy documents.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Nothing exists at the locator.
    #[error("Policy document not found: {locator}")]
    NotFound {
        /// The locator that was read.
        locator: String,
    },

    /// The backend failed to read or write.
    #[error("I/O error on {locator}: {source}")]
    Io {
        /// The locator being accessed.
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// No backend is registered for the locator's scheme.
    #[error("No storage backend registered for scheme `{scheme}`")]
    UnsupportedScheme {
        /// The scheme without `://`.
        scheme: String,
    },

    /// The locator string cannot be used.
    #[error("Invalid locator `{locator}`: {reason}")]
    InvalidLocator {
        /// The raw locator.
        locator: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl StorageError {
    #[must_use]
    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::NotFound {
            locator: locator.into(),
        }
    }

    #[must_use]
    pub fn io(locator: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            locator: locator.into(),
            source,
        }
    }

    #[must_use]
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
        }
    }

    #[must_use]
    pub fn invalid_locator(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the document does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
