//! Policy documents.
//!
//! A document is an ini-like text file:
//!
//! ```text
//! [groups]
//! analysts = analyst_role, reader_role
//!
//! [roles]
//! analyst_role = server=server1->db=sales->table=*->action=select
//! loader_role = server=server1->uri=hdfs://nn:8020/landing
//!
//! [databases]
//! sales = hdfs://nn:8020/policies/sales.ini
//!
//! [users]
//! alice = analysts
//! ```
//!
//! Lines starting with `#` or `;` are comments. Values are comma-separated.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use warden_core::Permission;

use crate::error::{NameKind, PolicyError, PolicyResult, UnknownRoleReference};

/// Label used for documents parsed without a locator.
pub const INLINE_SOURCE: &str = "<inline>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Groups,
    Roles,
    Databases,
    Users,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "groups" => Some(Self::Groups),
            "roles" => Some(Self::Roles),
            "databases" => Some(Self::Databases),
            "users" => Some(Self::Users),
            _ => None,
        }
    }

    fn key_kind(self) -> NameKind {
        match self {
            Self::Groups => NameKind::Group,
            Self::Roles => NameKind::Role,
            Self::Databases => NameKind::Database,
            Self::Users => NameKind::User,
        }
    }
}

/// Parsed contents of one policy document.
///
/// Documents are values: they are replaced wholesale on every load and
/// edited through [`crate::PolicyBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    pub(crate) groups: BTreeMap<String, BTreeSet<String>>,
    pub(crate) roles: BTreeMap<String, BTreeSet<Permission>>,
    pub(crate) databases: BTreeMap<String, String>,
    pub(crate) users: BTreeMap<String, BTreeSet<String>>,
}

impl PolicyDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse document text that has no locator.
    pub fn parse(text: &str) -> PolicyResult<Self> {
        Self::parse_named(INLINE_SOURCE, text)
    }

    /// Parse document text, labelling errors with `source_name`.
    pub fn parse_named(source_name: &str, text: &str) -> PolicyResult<Self> {
        let mut document = Self::default();
        let mut section: Option<Section> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let malformed = |message: String| PolicyError::malformed(source_name, line_no, message);

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .ok_or_else(|| malformed(format!("unterminated section header `{line}`")))?
                    .trim()
                    .to_ascii_lowercase();
                section = Some(
                    Section::from_name(&name)
                        .ok_or_else(|| malformed(format!("unknown section [{name}]")))?,
                );
                continue;
            }

            let current = section.ok_or_else(|| malformed("line outside any section".to_string()))?;

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed(format!("expected `key = value`, found `{line}`")))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(malformed(format!("empty {}", current.key_kind())));
            }
            let items = || value.split(',').map(str::trim).filter(|item| !item.is_empty());

            match current {
                Section::Groups => {
                    let roles: BTreeSet<String> = items().map(str::to_string).collect();
                    if !insert_unique(&mut document.groups, key.to_string(), roles) {
                        return Err(malformed(format!("group `{key}` is defined twice")));
                    }
                }
                Section::Roles => {
                    let mut permissions = BTreeSet::new();
                    for item in items() {
                        let permission = Permission::parse(item).map_err(|e| {
                            malformed(format!("invalid permission `{item}` in role `{key}`: {e}"))
                        })?;
                        permissions.insert(permission);
                    }
                    if !insert_unique(&mut document.roles, key.to_string(), permissions) {
                        return Err(malformed(format!("role `{key}` is defined twice")));
                    }
                }
                Section::Databases => {
                    let locator = value.trim();
                    if locator.is_empty() {
                        return Err(malformed(format!("database `{key}` has no locator")));
                    }
                    let name = key.to_ascii_lowercase();
                    if !insert_unique(&mut document.databases, name, locator.to_string()) {
                        return Err(malformed(format!("database `{key}` is defined twice")));
                    }
                }
                Section::Users => {
                    let groups: BTreeSet<String> = items().map(str::to_string).collect();
                    if !insert_unique(&mut document.users, key.to_string(), groups) {
                        return Err(malformed(format!("user `{key}` is defined twice")));
                    }
                }
            }
        }

        Ok(document)
    }

    /// Canonical text: sections, keys and values sorted.
    #[must_use]
    pub fn write(&self) -> String {
        let mut out = String::new();

        fn section<V>(
            out: &mut String,
            name: &str,
            entries: &BTreeMap<String, V>,
            render: impl Fn(&V) -> String,
        ) {
            if entries.is_empty() {
                return;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            let _ = writeln!(out, "[{name}]");
            for (key, value) in entries {
                let rendered = render(value);
                if rendered.is_empty() {
                    let _ = writeln!(out, "{key} =");
                } else {
                    let _ = writeln!(out, "{key} = {rendered}");
                }
            }
        }

        let join = |values: &BTreeSet<String>| values.iter().cloned().collect::<Vec<_>>().join(", ");

        section(&mut out, "databases", &self.databases, |locator: &String| locator.clone());
        section(&mut out, "groups", &self.groups, join);
        section(&mut out, "roles", &self.roles, |permissions| {
            permissions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        });
        section(&mut out, "users", &self.users, join);
        out
    }

    /// Canonical text, verified to parse back into this same document.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Unwritable`] if the text would be malformed or
    /// would read back differently.
    pub fn write_checked(&self, source_name: &str) -> PolicyResult<String> {
        let text = self.write();
        let unwritable = |message: String| PolicyError::Unwritable {
            source_name: source_name.to_string(),
            message,
        };
        match Self::parse_named(source_name, &text) {
            Ok(reparsed) if reparsed == *self => Ok(text),
            Ok(_) => Err(unwritable("text reads back as a different policy".into())),
            Err(e) => Err(unwritable(e.to_string())),
        }
    }

    #[must_use]
    pub fn groups(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.groups
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeMap<String, BTreeSet<Permission>> {
        &self.roles
    }

    #[must_use]
    pub fn databases(&self) -> &BTreeMap<String, String> {
        &self.databases
    }

    #[must_use]
    pub fn users(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.users
    }

    /// Roles mapped to a group. Unknown groups have none.
    pub fn roles_for_group(&self, group: &str) -> impl Iterator<Item = &str> {
        self.groups
            .get(group)
            .into_iter()
            .flat_map(|roles| roles.iter().map(String::as_str))
    }

    /// Permissions bundled in a role. Undefined roles yield nothing.
    pub fn permissions_for_role(&self, role: &str) -> impl Iterator<Item = &Permission> {
        self.roles.get(role).into_iter().flatten()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
            && self.roles.is_empty()
            && self.databases.is_empty()
            && self.users.is_empty()
    }

    /// Group-to-role mappings whose role is not defined in `[roles]`.
    #[must_use]
    pub fn unknown_role_references(&self) -> Vec<UnknownRoleReference> {
        self.groups
            .iter()
            .flat_map(|(group, roles)| {
                roles
                    .iter()
                    .filter(|role| !self.roles.contains_key(*role))
                    .map(move |role| UnknownRoleReference {
                        group: group.clone(),
                        role: role.clone(),
                    })
            })
            .collect()
    }

    /// Total number of permission entries across all roles.
    #[must_use]
    pub fn permission_count(&self) -> usize {
        self.roles.values().map(BTreeSet::len).sum()
    }
}

/// Returns `false` if the key already holds a different value.
fn insert_unique<V: PartialEq>(map: &mut BTreeMap<String, V>, key: String, value: V) -> bool {
    match map.get(&key) {
        Some(existing) => *existing == value,
        None => {
            map.insert(key, value);
            true
        }
    }
}
