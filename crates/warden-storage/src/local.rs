//! Local filesystem backend.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::locator::Locator;
use crate::traits::PolicyStorage;

/// Serves `file://` locators and bare paths.
#[derive(Debug, Clone, Default)]
pub struct LocalFileStorage;

impl LocalFileStorage {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn path_for(locator: &Locator) -> StorageResult<PathBuf> {
        locator.local_path().ok_or_else(|| {
            StorageError::invalid_locator(locator.as_str(), "not a local file locator")
        })
    }
}

#[async_trait]
impl PolicyStorage for LocalFileStorage {
    async fn read(&self, locator: &Locator) -> StorageResult<String> {
        let path = Self::path_for(locator)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                tracing::debug!(locator = %locator, bytes = contents.len(), "Read policy document");
                Ok(contents)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::not_found(locator.as_str())),
            Err(e) => Err(StorageError::io(locator.as_str(), e)),
        }
    }

    async fn write(&self, locator: &Locator, contents: &str) -> StorageResult<()> {
        let path = Self::path_for(locator)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(locator.as_str(), e))?;
        }

        // Write a sibling file and rename it over the target.
        let mut staging = path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| StorageError::io(locator.as_str(), e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| StorageError::io(locator.as_str(), e))?;

        tracing::debug!(locator = %locator, bytes = contents.len(), "Wrote policy document");
        Ok(())
    }

    async fn exists(&self, locator: &Locator) -> StorageResult<bool> {
        let path = Self::path_for(locator)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(locator.as_str(), e))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
