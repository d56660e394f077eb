//! Policy error types.

use std::fmt;

use warden_core::PermissionParseError;
use warden_storage::StorageError;

/// A group maps to a role that no document section defines.
///
/// Not fatal: the reference simply yields no permissions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, thiserror::Error)]
#[error("Group `{group}` references undefined role `{role}`")]
pub struct UnknownRoleReference {
    pub group: String,
    pub role: String,
}

/// Errors raised while loading, parsing or editing policy documents.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The document text is malformed.
    #[error("Malformed policy {source_name} at line {line}: {message}")]
    Malformed {
        /// Locator or label of the document.
        source_name: String,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// The document could not be read.
    #[error("Failed to load policy {locator}: {source}")]
    Load {
        locator: String,
        #[source]
        source: StorageError,
    },

    /// Reported by strict validation only.
    #[error(transparent)]
    UnknownRoleReference(#[from] UnknownRoleReference),

    /// A per-database document declared its own `[databases]` section.
    #[error("Policy for database `{database}` must not declare a [databases] section")]
    NestedDatabases { database: String },

    /// A permission handed to the builder does not parse.
    #[error("Invalid permission `{permission}`: {source}")]
    InvalidPermission {
        permission: String,
        #[source]
        source: PermissionParseError,
    },

    /// A name or locator handed to the builder is empty.
    #[error("Empty {kind}")]
    EmptyName { kind: NameKind },

    /// A name handed to the builder cannot be written into a document.
    #[error("Invalid {kind} `{name}`: {reason}")]
    InvalidName {
        kind: NameKind,
        name: String,
        reason: &'static str,
    },

    /// An edited document does not read back from its own canonical text.
    #[error("Policy {source_name} cannot be written: {message}")]
    Unwritable { source_name: String, message: String },
}

/// Which kind of name a builder error is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Role,
    Group,
    User,
    Database,
    Locator,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Role => "role name",
            Self::Group => "group name",
            Self::User => "user name",
            Self::Database => "database name",
            Self::Locator => "locator",
        })
    }
}

impl PolicyError {
    #[must_use]
    pub fn malformed(source_name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn load(locator: impl Into<String>, source: StorageError) -> Self {
        Self::Load {
            locator: locator.into(),
            source,
        }
    }

    /// Returns `true` for document content errors.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::NestedDatabases { .. })
    }

    /// Returns `true` if the document could not be read at all.
    #[must_use]
    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load { .. })
    }

    /// Short label used as a structured logging field.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Malformed { .. } | Self::NestedDatabases { .. } => "malformed",
            Self::Load { .. } => "load",
            Self::UnknownRoleReference(_) => "reference",
            Self::InvalidPermission { .. }
            | Self::EmptyName { .. }
            | Self::InvalidName { .. }
            | Self::Unwritable { .. } => "invalid",
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
