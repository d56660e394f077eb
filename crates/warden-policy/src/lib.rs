//! Policy layer of the Warden authorization engine.
//!
//! # Architecture
//!
//! - [`PolicyDocument`] / [`PolicyBuilder`] - parse, edit and write grant files
//! - [`resolver`] - expand permissions into `(path, action)` pairs
//! - [`AuthorizationEngine`] - ALLOW/DENY decisions over a merged view
//! - [`PolicyDistributor`] - load the root and per-database documents
//! - [`PolicyService`] - publish immutable snapshots, serialize writers
//! - [`PolicyWatcher`] - poll for changes and reload
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_policy::{EngineConfig, PolicyDistributor, PolicyService, PolicyWatcher, ReloadConfig};
//! use warden_storage::{Locator, StorageRegistry};
//!
//! let distributor = PolicyDistributor::new(StorageRegistry::with_local());
//! let root = Locator::parse("/etc/warden/policy.ini")?;
//! let service = Arc::new(PolicyService::open(distributor, root, EngineConfig::default()).await?);
//!
//! let watcher = PolicyWatcher::new(service.clone(), ReloadConfig::default()).spawn();
//! let decision = service.authorize(&subject, &request);
//! ```

pub mod builder;
pub mod distributor;
pub mod document;
pub mod engine;
pub mod error;
pub mod groups;
pub mod operation;
pub mod reload;
pub mod resolver;
pub mod service;

pub use builder::PolicyBuilder;
pub use distributor::{
    DatabasePolicy, DocumentScope, MergedPolicyView, PolicyDistributor, fingerprint,
    scope_to_database,
};
pub use document::PolicyDocument;
pub use engine::{
    AuthorizationEngine, Decision, DenyCode, DenyReason, EffectiveGrant, EngineConfig,
};
pub use error::{NameKind, PolicyError, PolicyResult, UnknownRoleReference};
pub use groups::{GroupMapping, LocalGroupMapping};
pub use operation::{OperationError, OperationKind, OperationRequest, PrivilegeSpec, Requirements};
pub use reload::{
    MIN_POLL_INTERVAL, PolicyChange, PolicyChangeNotifier, PolicyWatcher, ReloadConfig,
    ReloadStats, ReloadStatsSnapshot, WatchHandle,
};
pub use resolver::{CanonicalPath, ResolvedGrant};
pub use service::{PolicyService, PolicySnapshot};
