use anyhow::{Context as _, Result};
use warden_policy::{PolicyBuilder, PolicyResult};

use super::Context;
use crate::output::print_success;

/// One change to the root document.
pub enum Edit<'a> {
    Grant { role: &'a str, permissions: &'a [String] },
    Revoke { role: &'a str, permissions: &'a [String] },
    Assign { group: &'a str, roles: &'a [String] },
    Unassign { group: &'a str, roles: &'a [String] },
    AddDatabase { database: &'a str, locator: &'a str },
    RemoveDatabase { database: &'a str },
}

impl Edit<'_> {
    fn apply(&self, builder: &mut PolicyBuilder) -> PolicyResult<()> {
        match self {
            Self::Grant { role, permissions } => {
                builder.add_permissions_to_role(role, permissions.iter())?;
            }
            Self::Revoke { role, permissions } => {
                builder.remove_permissions_from_role(role, permissions.iter())?;
            }
            Self::Assign { group, roles } => {
                builder.add_roles_to_group(group, roles.iter())?;
            }
            Self::Unassign { group, roles } => {
                builder.remove_roles_from_group(group, roles.iter());
            }
            Self::AddDatabase { database, locator } => {
                builder.add_database(database, locator)?;
            }
            Self::RemoveDatabase { database } => {
                builder.remove_database(database);
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match self {
            Self::Grant { role, permissions } => {
                format!("Granted {} permission(s) to role {role}", permissions.len())
            }
            Self::Revoke { role, permissions } => {
                format!("Revoked {} permission(s) from role {role}", permissions.len())
            }
            Self::Assign { group, roles } => format!("Assigned {} to group {group}", roles.join(", ")),
            Self::Unassign { group, roles } => {
                format!("Removed {} from group {group}", roles.join(", "))
            }
            Self::AddDatabase { database, locator } => {
                format!("Database {database} now uses {locator}")
            }
            Self::RemoveDatabase { database } => format!("Database {database} removed"),
        }
    }
}

pub async fn run(ctx: &Context, edit: Edit<'_>) -> Result<()> {
    let service = ctx.open_service().await?;
    let snapshot = service
        .edit_root(|builder| edit.apply(builder))
        .await
        .with_context(|| format!("Failed to edit {}", ctx.root))?;
    print_success(&format!(
        "{} (generation {})",
        edit.describe(),
        snapshot.generation
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_edits() {
        let permissions = vec!["server=server1->db=sales->action=select".to_string()];
        let roles = vec!["reader".to_string()];
        let mut builder = PolicyBuilder::new();

        Edit::Grant { role: "reader", permissions: &permissions }
            .apply(&mut builder)
            .unwrap();
        Edit::Assign { group: "analysts", roles: &roles }
            .apply(&mut builder)
            .unwrap();
        Edit::AddDatabase { database: "Sales", locator: "sales.ini" }
            .apply(&mut builder)
            .unwrap();

        let document = builder.document();
        assert_eq!(document.roles()["reader"].len(), 1);
        assert!(document.groups()["analysts"].contains("reader"));
        assert_eq!(document.databases()["sales"], "sales.ini");

        Edit::Revoke { role: "reader", permissions: &permissions }
            .apply(&mut builder)
            .unwrap();
        Edit::RemoveDatabase { database: "sales" }
            .apply(&mut builder)
            .unwrap();
        assert!(builder.document().roles()["reader"].is_empty());
        assert!(builder.document().databases().is_empty());
    }

    #[test]
    fn test_invalid_grant_is_rejected() {
        let permissions = vec!["db=sales".to_string()];
        let mut builder = PolicyBuilder::new();
        let edit = Edit::Grant { role: "reader", permissions: &permissions };
        assert!(edit.apply(&mut builder).is_err());
        assert!(builder.document().is_empty());
    }
}
