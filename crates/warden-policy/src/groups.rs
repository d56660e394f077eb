//! User-to-group resolution.
//!
//! Decisions only ever see a [`Subject`]'s groups. Where those groups come
//! from is up to the caller; [`LocalGroupMapping`] reads them from the root
//! document's `[users]` section.

use std::collections::{BTreeMap, BTreeSet};

use warden_core::Subject;

use crate::document::PolicyDocument;

/// Resolves a user name to the groups it belongs to.
pub trait GroupMapping: Send + Sync {
    /// Groups for `user`. Unknown users have none.
    fn groups_for(&self, user: &str) -> BTreeSet<String>;

    fn subject_for(&self, user: &str) -> Subject {
        Subject::new(self.groups_for(user))
    }
}

/// Groups taken from a policy document's `[users]` section.
#[derive(Debug, Clone, Default)]
pub struct LocalGroupMapping {
    users: BTreeMap<String, BTreeSet<String>>,
}

impl LocalGroupMapping {
    #[must_use]
    pub fn from_document(document: &PolicyDocument) -> Self {
        Self {
            users: document.users().clone(),
        }
    }
}

impl GroupMapping for LocalGroupMapping {
    fn groups_for(&self, user: &str) -> BTreeSet<String> {
        self.users.get(user).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_mapping_reads_users_section() {
        let document = PolicyDocument::parse("[users]\nalice = analysts, loaders\n").unwrap();
        let mapping = LocalGroupMapping::from_document(&document);
        let subject = mapping.subject_for("alice");
        assert!(subject.is_member_of("analysts"));
        assert!(subject.is_member_of("loaders"));
        assert!(mapping.groups_for("bob").is_empty());
    }
}
