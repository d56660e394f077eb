//! In-memory backend.
//!
//! Stands in for remote stores (HDFS, S3, ...) in tests and embedded setups.
//! Register it under whatever scheme the locators use.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{StorageError, StorageResult};
use crate::locator::Locator;
use crate::traits::PolicyStorage;

/// Documents keyed by their full locator string.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    documents: Arc<DashMap<String, String>>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document directly, bypassing the async API.
    pub fn insert(&self, locator: impl Into<String>, contents: impl Into<String>) {
        self.documents.insert(locator.into(), contents.into());
    }

    /// Removes a document. Returns `true` if it existed.
    pub fn remove(&self, locator: &str) -> bool {
        self.documents.remove(locator).is_some()
    }

    #[must_use]
    pub fn get(&self, locator: &str) -> Option<String> {
        self.documents.get(locator).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl PolicyStorage for InMemoryStorage {
    async fn read(&self, locator: &Locator) -> StorageResult<String> {
        self.get(locator.as_str())
            .ok_or_else(|| StorageError::not_found(locator.as_str()))
    }

    async fn write(&self, locator: &Locator, contents: &str) -> StorageResult<()> {
        self.insert(locator.as_str(), contents);
        Ok(())
    }

    async fn exists(&self, locator: &Locator) -> StorageResult<bool> {
        Ok(self.documents.contains_key(locator.as_str()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
