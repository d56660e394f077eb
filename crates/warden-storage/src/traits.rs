use async_trait::async_trait;

use crate::error::StorageResult;
use crate::locator::Locator;

/// A backend that stores policy documents as text.
///
/// Implementations must be thread-safe (`Send + Sync`); the distributor
/// reads many documents concurrently through one shared backend.
#[async_trait]
pub trait PolicyStorage: Send + Sync {
    /// Reads the whole document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if nothing exists at the locator.
    async fn read(&self, locator: &Locator) -> StorageResult<String>;

    /// Replaces the document, creating it if needed.
    ///
    /// Readers never observe a partially written document.
    async fn write(&self, locator: &Locator, contents: &str) -> StorageResult<()>;

    /// Returns `true` if a document exists at the locator.
    async fn exists(&self, locator: &Locator) -> StorageResult<bool>;

    /// Short name of the backend, for logging.
    fn backend_name(&self) -> &'static str;
}
