//! Core model for the Warden authorization engine.
//!
//! This crate holds the vocabulary shared by every other Warden crate:
//!
//! - [`Action`] - privileges (`SELECT`, `INSERT`, `ALL`)
//! - [`ObjectPath`] and [`UriPath`] - the two resource namespaces
//! - [`Permission`] - a parsed grant string
//! - [`ResourceRequest`] and [`Subject`] - the inputs of a decision

pub mod action;
pub mod error;
pub mod path;
pub mod permission;
pub mod request;

pub use action::Action;
pub use error::{PermissionParseError, Result};
pub use path::{Component, ObjectPath, UriPath};
pub use permission::Permission;
pub use request::{Resource, ResourceRequest, Subject};
