//! Permission strings.
//!
//! Grammar (keys and actions are case-insensitive):
//!
//! ```text
//! server=<s>[->db=<d>[->table=<t>[->column=<c>]]][->action=<a>]
//! server=<s>->uri=<uri>[->action=all]
//! ```
//!
//! `database=` is accepted for `db=`, `view=` for `table=`. A missing action
//! means `ALL`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::action::Action;
use crate::error::{PermissionParseError, Result};
use crate::path::{Component, ObjectPath, UriPath};
use crate::request::Resource;

/// An immutable grant of one action on one resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Permission {
    resource: Resource,
    action: Action,
}

impl Permission {
    /// Build a permission. URI permissions are forced to `ALL`.
    #[must_use]
    pub fn new(resource: Resource, action: Action) -> Self {
        let action = if resource.is_uri() { Action::All } else { action };
        Self { resource, action }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let (resource, action) = parse_chain(input, true)?;
        Ok(Self::new(resource, action.unwrap_or(Action::All)))
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// The object path, when this is not a URI permission.
    #[must_use]
    pub fn object(&self) -> Option<&ObjectPath> {
        self.resource.as_object()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.resource.fmt(f)?;
        if self.action != Action::All {
            write!(f, "->action={}", self.action)?;
        }
        Ok(())
    }
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Chain parser
// =============================================================================

fn split_part(part: &str) -> Result<(String, &str)> {
    let (key, value) = part
        .split_once('=')
        .ok_or_else(|| PermissionParseError::MalformedPart(part.trim().to_string()))?;
    let key = key.trim().to_ascii_lowercase();
    let value = value.trim();
    if key.is_empty() {
        return Err(PermissionParseError::MalformedPart(part.trim().to_string()));
    }
    if value.is_empty() {
        return Err(PermissionParseError::EmptyValue(key));
    }
    Ok((key, value))
}

/// Object names may not contain commas (documents list permissions with
/// them) or control characters.
fn component(key: &str, value: &str) -> Result<Component> {
    if value.chars().any(|c| c == ',' || c.is_control()) {
        return Err(PermissionParseError::ReservedCharacter {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(Component::parse(value))
}

/// Parse a `key=value->key=value` chain into a resource and optional action.
pub(crate) fn parse_chain(input: &str, allow_action: bool) -> Result<(Resource, Option<Action>)> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PermissionParseError::Empty);
    }

    let out_of_order = |key: &str| PermissionParseError::OutOfOrder {
        key: key.to_string(),
        input: input.to_string(),
    };

    let mut server: Option<Component> = None;
    let mut database: Option<Component> = None;
    let mut table: Option<Component> = None;
    let mut column: Option<Component> = None;
    let mut uri: Option<UriPath> = None;
    let mut action: Option<(Action, String)> = None;

    for (idx, part) in input.split("->").enumerate() {
        let (key, value) = split_part(part)?;

        if action.is_some() {
            return Err(out_of_order(&key));
        }

        match key.as_str() {
            "server" | "db" | "database" | "table" | "view" | "column" | "uri" | "action" => {}
            _ => return Err(PermissionParseError::UnknownKey(key)),
        }

        if idx == 0 && key != "server" {
            return Err(PermissionParseError::MissingServer(input.to_string()));
        }

        match key.as_str() {
            "server" => {
                if idx != 0 {
                    return Err(out_of_order(&key));
                }
                server = Some(component(&key, value)?);
            }
            "db" | "database" => {
                if idx != 1 {
                    return Err(out_of_order(&key));
                }
                database = Some(component(&key, value)?);
            }
            "table" | "view" => {
                if idx != 2 || database.is_none() {
                    return Err(out_of_order(&key));
                }
                table = Some(component(&key, value)?);
            }
            "column" => {
                if idx != 3 || table.is_none() {
                    return Err(out_of_order(&key));
                }
                column = Some(component(&key, value)?);
            }
            "uri" => {
                if idx != 1 {
                    return Err(out_of_order(&key));
                }
                uri = Some(UriPath::parse(value)?);
            }
            _ => {
                if !allow_action {
                    return Err(PermissionParseError::UnexpectedAction(input.to_string()));
                }
                action = Some((value.parse()?, value.to_string()));
            }
        }
    }

    let server = server.ok_or_else(|| PermissionParseError::MissingServer(input.to_string()))?;

    let resource = match uri {
        Some(uri) => {
            if let Some((parsed, raw)) = &action
                && *parsed != Action::All
            {
                return Err(PermissionParseError::UriAction(raw.clone()));
            }
            Resource::Uri { server, uri }
        }
        None => Resource::Object(ObjectPath::from_components(
            server, database, table, column,
        )?),
    };

    Ok((resource, action.map(|(parsed, _)| parsed)))
}
