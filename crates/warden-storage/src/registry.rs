//! Scheme-keyed backend registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::local::LocalFileStorage;
use crate::locator::{LOCAL_SCHEME, Locator};
use crate::traits::PolicyStorage;

/// Type alias for a shareable backend.
pub type DynPolicyStorage = Arc<dyn PolicyStorage>;

/// Routes each locator to the backend registered for its scheme.
#[derive(Clone, Default)]
pub struct StorageRegistry {
    backends: HashMap<String, DynPolicyStorage>,
}

impl StorageRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry serving the `file` scheme from the local filesystem.
    #[must_use]
    pub fn with_local() -> Self {
        Self::new().with_backend(LOCAL_SCHEME, Arc::new(LocalFileStorage::new()))
    }

    #[must_use]
    pub fn with_backend(mut self, scheme: &str, backend: DynPolicyStorage) -> Self {
        self.register(scheme, backend);
        self
    }

    /// Registers (or replaces) the backend for a scheme.
    pub fn register(&mut self, scheme: &str, backend: DynPolicyStorage) {
        tracing::debug!(scheme, backend = backend.backend_name(), "Registered storage backend");
        self.backends.insert(scheme.to_ascii_lowercase(), backend);
    }

    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    pub fn backend_for(&self, locator: &Locator) -> StorageResult<&DynPolicyStorage> {
        self.backends
            .get(locator.scheme())
            .ok_or_else(|| StorageError::unsupported_scheme(locator.scheme()))
    }

    pub async fn read(&self, locator: &Locator) -> StorageResult<String> {
        self.backend_for(locator)?.read(locator).await
    }

    pub async fn write(&self, locator: &Locator, contents: &str) -> StorageResult<()> {
        self.backend_for(locator)?.write(locator, contents).await
    }

    pub async fn exists(&self, locator: &Locator) -> StorageResult<bool> {
        self.backend_for(locator)?.exists(locator).await
    }
}

impl std::fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStorage;

    #[tokio::test]
    async fn test_routes_by_scheme() {
        let hdfs = InMemoryStorage::new();
        hdfs.insert("hdfs://nn/db1.ini", "[roles]\n");
        let registry = StorageRegistry::with_local().with_backend("HDFS", Arc::new(hdfs));

        let locator = Locator::parse("hdfs://nn/db1.ini").unwrap();
        assert_eq!(registry.read(&locator).await.unwrap(), "[roles]\n");
        assert_eq!(registry.schemes(), vec!["file", "hdfs"]);
    }

    #[tokio::test]
    async fn test_unknown_scheme() {
        let registry = StorageRegistry::with_local();
        let locator = Locator::parse("s3a://bucket/p.ini").unwrap();
        let err = registry.read(&locator).await.unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedScheme { scheme } if scheme == "s3a"));
    }
}
