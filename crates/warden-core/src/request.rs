//! Resources, requests and subjects.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::action::Action;
use crate::error::{PermissionParseError, Result};
use crate::path::{Component, ObjectPath, UriPath};
use crate::permission::parse_chain;

/// Something a grant can address or a request can target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    /// A node in the object hierarchy.
    Object(ObjectPath),
    /// A filesystem location, scoped to a server.
    Uri { server: Component, uri: UriPath },
}

impl Resource {
    #[must_use]
    pub fn server(&self) -> &Component {
        match self {
            Self::Object(path) => path.server(),
            Self::Uri { server, .. } => server,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectPath> {
        match self {
            Self::Object(path) => Some(path),
            Self::Uri { .. } => None,
        }
    }

    #[must_use]
    pub fn is_uri(&self) -> bool {
        matches!(self, Self::Uri { .. })
    }
}

impl From<ObjectPath> for Resource {
    fn from(path: ObjectPath) -> Self {
        Self::Object(path)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(path) => path.fmt(f),
            Self::Uri { server, uri } => write!(f, "server={server}->uri={uri}"),
        }
    }
}

impl FromStr for Resource {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self> {
        parse_chain(s, false).map(|(resource, _)| resource)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single `{action, resource}` query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub action: Action,
    pub resource: Resource,
}

impl ResourceRequest {
    #[must_use]
    pub fn object(path: ObjectPath, action: Action) -> Self {
        Self {
            action,
            resource: Resource::Object(path),
        }
    }

    /// URI access always demands the URI-class privilege, `ALL`.
    #[must_use]
    pub fn uri(server: impl Into<Component>, uri: UriPath) -> Self {
        Self {
            action: Action::All,
            resource: Resource::Uri {
                server: server.into(),
                uri,
            },
        }
    }
}

impl fmt::Display for ResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action, self.resource)
    }
}

/// The caller, reduced to its resolved group set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    groups: BTreeSet<String>,
}

impl Subject {
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    #[must_use]
    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_request_demands_all() {
        let request =
            ResourceRequest::uri("server1", UriPath::parse_request("/tmp/export").unwrap());
        assert_eq!(request.action, Action::All);
        assert_eq!(
            request.resource.to_string(),
            "server=server1->uri=file:///tmp/export"
        );
    }

    #[test]
    fn test_resource_parse_rejects_action() {
        assert!(matches!(
            "server=s->db=d->action=select".parse::<Resource>(),
            Err(PermissionParseError::UnexpectedAction(_))
        ));
    }

    #[test]
    fn test_resource_serializes_as_string() {
        let resource = Resource::Object(ObjectPath::for_database("s", "d"));
        let json = serde_json::to_string(&resource).unwrap();
        assert_eq!(json, "\"server=s->db=d\"");
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resource);
    }

    #[test]
    fn test_subject_membership() {
        let subject = Subject::new(["analysts", "etl"]);
        assert!(subject.is_member_of("etl"));
        assert!(!subject.is_member_of("admin"));
        assert_eq!(subject.groups().len(), 2);
    }
}
