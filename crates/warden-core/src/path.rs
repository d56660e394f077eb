//! Resource paths.
//!
//! Two independent namespaces exist: the object hierarchy
//! (`server -> database -> table -> column`) and filesystem URIs. Object
//! names are case-insensitive and stored lower-cased; URIs keep their case.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{PermissionParseError, Result};
use crate::request::Resource;

// =============================================================================
// Component
// =============================================================================

/// One component of an object path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// `*`, matches any name at this level.
    Any,
    /// A concrete, lower-cased name.
    Name(String),
}

impl Component {
    /// Parse a raw component value. `*` becomes [`Component::Any`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == "*" {
            Self::Any
        } else {
            Self::Name(value.to_ascii_lowercase())
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Name(name) => Some(name),
        }
    }

    /// Returns `true` if a grant component `self` covers the requested one.
    ///
    /// A concrete grant never covers a wildcard request.
    #[must_use]
    pub fn covers(&self, requested: &Component) -> bool {
        match (self, requested) {
            (Self::Any, _) => true,
            (Self::Name(granted), Self::Name(requested)) => granted == requested,
            (Self::Name(_), Self::Any) => false,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "*",
            Self::Name(name) => name,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Component {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

// =============================================================================
// Object Path
// =============================================================================

/// A path in the object hierarchy. An omitted suffix means "this level".
///
/// Paths never have gaps: a table implies a database, a column a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath {
    server: Component,
    database: Option<Component>,
    table: Option<Component>,
    column: Option<Component>,
}

impl ObjectPath {
    #[must_use]
    pub fn for_server(server: impl Into<Component>) -> Self {
        Self {
            server: server.into(),
            database: None,
            table: None,
            column: None,
        }
    }

    #[must_use]
    pub fn for_database(server: impl Into<Component>, database: impl Into<Component>) -> Self {
        Self {
            database: Some(database.into()),
            ..Self::for_server(server)
        }
    }

    #[must_use]
    pub fn for_table(
        server: impl Into<Component>,
        database: impl Into<Component>,
        table: impl Into<Component>,
    ) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::for_database(server, database)
        }
    }

    #[must_use]
    pub fn for_column(
        server: impl Into<Component>,
        database: impl Into<Component>,
        table: impl Into<Component>,
        column: impl Into<Component>,
    ) -> Self {
        Self {
            column: Some(column.into()),
            ..Self::for_table(server, database, table)
        }
    }

    /// Build a path from optional components, rejecting gaps.
    pub fn from_components(
        server: Component,
        database: Option<Component>,
        table: Option<Component>,
        column: Option<Component>,
    ) -> Result<Self> {
        let path = Self {
            server,
            database,
            table,
            column,
        };
        if (path.table.is_some() && path.database.is_none())
            || (path.column.is_some() && path.table.is_none())
        {
            return Err(PermissionParseError::OutOfOrder {
                key: if path.database.is_none() { "table" } else { "column" }.to_string(),
                input: path.to_string(),
            });
        }
        Ok(path)
    }

    #[must_use]
    pub fn server(&self) -> &Component {
        &self.server
    }

    #[must_use]
    pub fn database(&self) -> Option<&Component> {
        self.database.as_ref()
    }

    #[must_use]
    pub fn table(&self) -> Option<&Component> {
        self.table.as_ref()
    }

    #[must_use]
    pub fn column(&self) -> Option<&Component> {
        self.column.as_ref()
    }

    /// The concrete database name, if the path addresses one.
    #[must_use]
    pub fn database_name(&self) -> Option<&str> {
        self.database.as_ref().and_then(Component::name)
    }

    /// Components from the server down, without gaps.
    #[must_use]
    pub fn components(&self) -> Vec<&Component> {
        std::iter::once(&self.server)
            .chain(self.database.as_ref())
            .chain(self.table.as_ref())
            .chain(self.column.as_ref())
            .collect()
    }

    /// Returns `true` if this (granted) path is a component-wise
    /// prefix-or-equal of `requested`.
    #[must_use]
    pub fn covers(&self, requested: &ObjectPath) -> bool {
        let granted = self.components();
        let requested = requested.components();
        granted.len() <= requested.len()
            && granted
                .iter()
                .zip(requested.iter())
                .all(|(g, r)| g.covers(r))
    }

    /// Returns `true` if one path lies on, above or below the other.
    #[must_use]
    pub fn is_related(&self, other: &ObjectPath) -> bool {
        self.components()
            .iter()
            .zip(other.components().iter())
            .all(|(a, b)| a.covers(b) || b.covers(a))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server={}", self.server)?;
        if let Some(db) = &self.database {
            write!(f, "->db={db}")?;
        }
        if let Some(table) = &self.table {
            write!(f, "->table={table}")?;
        }
        if let Some(column) = &self.column {
            write!(f, "->column={column}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectPath {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<Resource>()? {
            Resource::Object(path) => Ok(path),
            Resource::Uri { .. } => Err(PermissionParseError::UnknownKey("uri".to_string())),
        }
    }
}

impl Serialize for ObjectPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// URI Path
// =============================================================================

/// A normalized filesystem URI: scheme, authority and dot-free path segments.
///
/// Commas in segments are kept percent-encoded (`%2C`) so a URI never splits
/// a comma-separated list it is written into.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UriPath {
    scheme: String,
    authority: String,
    segments: Vec<String>,
}

impl UriPath {
    /// Parse a URI that carries a scheme, as written in a grant.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let url = url::Url::parse(raw)
            .map_err(|e| PermissionParseError::invalid_uri(raw, e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(PermissionParseError::invalid_uri(
                raw,
                "expected a hierarchical URI (scheme://authority/path)",
            ));
        }

        let mut authority = url.host_str().unwrap_or_default().to_string();
        if authority.contains(',') {
            return Err(PermissionParseError::invalid_uri(raw, "comma in authority"));
        }
        if let Some(port) = url.port() {
            authority.push(':');
            authority.push_str(&port.to_string());
        }

        let mut segments: Vec<String> = Vec::new();
        for segment in url.path().split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other.replace(',', "%2C")),
            }
        }

        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
            segments,
        })
    }

    /// Parse a URI from a request. A bare absolute path is a local file.
    pub fn parse_request(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.starts_with('/') {
            Self::parse(&format!("file://{raw}"))
        } else {
            Self::parse(raw)
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segment-wise prefix test on the same scheme and authority.
    ///
    /// `/a/b` is a prefix of `/a/b/c` but not of `/a/bc`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &UriPath) -> bool {
        self.scheme == other.scheme
            && self.authority == other.authority
            && self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }
}

impl fmt::Display for UriPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            self.scheme,
            self.authority,
            self.segments.join("/")
        )
    }
}

impl FromStr for UriPath {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_request(s)
    }
}
