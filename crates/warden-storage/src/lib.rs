//! # warden-storage
//!
//! Storage collaborator for Warden policy documents.
//!
//! The main trait is [`PolicyStorage`]: whole-document `read`, `write` and
//! `exists` over a [`Locator`]. Two backends ship with the crate:
//!
//! - [`LocalFileStorage`] for `file://` locators and bare paths
//! - [`InMemoryStorage`] for any scheme it is registered under
//!
//! [`StorageRegistry`] routes a locator to its backend by scheme.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_storage::{InMemoryStorage, Locator, StorageRegistry};
//!
//! let registry = StorageRegistry::with_local()
//!     .with_backend("hdfs", Arc::new(InMemoryStorage::new()));
//! let text = registry.read(&Locator::parse("/etc/warden/policy.ini")?).await?;
//! ```

mod error;
mod local;
mod locator;
mod memory;
mod registry;
mod traits;

pub use error::{StorageError, StorageResult};
pub use local::LocalFileStorage;
pub use locator::{LOCAL_SCHEME, Locator};
pub use memory::InMemoryStorage;
pub use registry::{DynPolicyStorage, StorageRegistry};
pub use traits::PolicyStorage;
