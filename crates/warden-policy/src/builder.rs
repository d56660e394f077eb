//! Copy-on-write editing of policy documents.

use std::collections::BTreeSet;

use warden_core::Permission;

use crate::document::PolicyDocument;
use crate::error::{NameKind, PolicyError, PolicyResult};

/// Edits a private copy of a [`PolicyDocument`].
///
/// The source document is never touched; [`PolicyBuilder::build`] hands back
/// the edited copy. Removing something that is not held is a no-op.
///
/// ```ignore
/// let mut builder = PolicyBuilder::new();
/// builder
///     .add_roles_to_group("analysts", ["analyst_role"])?
///     .add_permissions_to_role("analyst_role", ["server=server1->db=sales->action=select"])?;
/// let document = builder.build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    document: PolicyDocument,
}

fn non_empty(kind: NameKind, name: &str) -> PolicyResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PolicyError::EmptyName { kind });
    }
    if name.contains(['\n', '\r']) {
        return Err(invalid_name(kind, name, "contains a line break"));
    }
    Ok(name.to_string())
}

fn invalid_name(kind: NameKind, name: &str, reason: &'static str) -> PolicyError {
    PolicyError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    }
}

/// A section key or list item: must read back as the same single name.
fn valid_name(kind: NameKind, name: &str) -> PolicyResult<String> {
    let name = non_empty(kind, name)?;
    if name.contains([',', '=']) {
        return Err(invalid_name(kind, &name, "contains `,` or `=`"));
    }
    if name.starts_with(['[', '#', ';']) {
        return Err(invalid_name(kind, &name, "starts with `[`, `#` or `;`"));
    }
    Ok(name)
}

fn parse_permissions<I, S>(permissions: I) -> PolicyResult<Vec<Permission>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    permissions
        .into_iter()
        .map(|raw| {
            let raw = raw.as_ref();
            Permission::parse(raw).map_err(|source| PolicyError::InvalidPermission {
                permission: raw.to_string(),
                source,
            })
        })
        .collect()
}

fn names<I, S>(kind: NameKind, values: I) -> PolicyResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|value| valid_name(kind, value.as_ref()))
        .collect()
}

impl PolicyBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a copy of an existing document.
    #[must_use]
    pub fn from_document(document: &PolicyDocument) -> Self {
        Self {
            document: document.clone(),
        }
    }

    /// Current state of the copy.
    #[must_use]
    pub fn document(&self) -> &PolicyDocument {
        &self.document
    }

    #[must_use]
    pub fn build(self) -> PolicyDocument {
        self.document
    }

    /// Adds permissions to a role, creating the role if needed.
    ///
    /// Nothing is added unless every permission parses.
    pub fn add_permissions_to_role<I, S>(&mut self, role: &str, permissions: I) -> PolicyResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let role = valid_name(NameKind::Role, role)?;
        let parsed = parse_permissions(permissions)?;
        self.document.roles.entry(role).or_default().extend(parsed);
        Ok(self)
    }

    /// Removes permissions from a role. The role stays, possibly empty.
    pub fn remove_permissions_from_role<I, S>(
        &mut self,
        role: &str,
        permissions: I,
    ) -> PolicyResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = parse_permissions(permissions)?;
        if let Some(held) = self.document.roles.get_mut(role.trim()) {
            for permission in &parsed {
                held.remove(permission);
            }
        }
        Ok(self)
    }

    /// Maps roles to a group, creating the group if needed.
    pub fn add_roles_to_group<I, S>(&mut self, group: &str, roles: I) -> PolicyResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let group = valid_name(NameKind::Group, group)?;
        let roles = names(NameKind::Role, roles)?;
        self.document.groups.entry(group).or_default().extend(roles);
        Ok(self)
    }

    pub fn remove_roles_from_group<I, S>(&mut self, group: &str, roles: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(held) = self.document.groups.get_mut(group.trim()) {
            for role in roles {
                held.remove(role.as_ref().trim());
            }
        }
        self
    }

    /// Adds groups to a user's entry in `[users]`.
    pub fn add_groups_to_user<I, S>(&mut self, user: &str, groups: I) -> PolicyResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let user = valid_name(NameKind::User, user)?;
        let groups = names(NameKind::Group, groups)?;
        self.document
            .users
            .entry(user)
            .or_insert_with(BTreeSet::new)
            .extend(groups);
        Ok(self)
    }

    /// Points a database at its per-database document, replacing any previous locator.
    pub fn add_database(&mut self, database: &str, locator: &str) -> PolicyResult<&mut Self> {
        let database = valid_name(NameKind::Database, database)?.to_ascii_lowercase();
        let locator = non_empty(NameKind::Locator, locator)?;
        self.document.databases.insert(database, locator);
        Ok(self)
    }

    pub fn remove_database(&mut self, database: &str) -> &mut Self {
        self.document
            .databases
            .remove(&database.trim().to_ascii_lowercase());
        self
    }
}

impl From<PolicyDocument> for PolicyBuilder {
    fn from(document: PolicyDocument) -> Self {
        Self { document }
    }
}
