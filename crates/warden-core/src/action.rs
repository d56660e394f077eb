//! Privileges that grants carry and requests demand.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PermissionParseError;

/// A privilege on a scope.
///
/// `All` at a scope implies every other action at that scope and at every
/// descendant scope. URI grants always carry `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read rows.
    Select,
    /// Write rows.
    Insert,
    /// Every privilege, including DDL and URI access.
    All,
}

impl Action {
    /// Returns `true` if a grant of `self` satisfies a request for `requested`.
    #[must_use]
    pub fn implies(self, requested: Action) -> bool {
        self == Action::All || self == requested
    }

    /// The concrete actions a grant of `self` expands to.
    #[must_use]
    pub fn expand(self) -> &'static [Action] {
        match self {
            Action::All => &[Action::All, Action::Select, Action::Insert],
            Action::Select => &[Action::Select],
            Action::Insert => &[Action::Insert],
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Select => "select",
            Action::Insert => "insert",
            Action::All => "all",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(Action::Select),
            "insert" => Ok(Action::Insert),
            "all" | "*" => Ok(Action::All),
            _ => Err(PermissionParseError::UnknownAction(s.trim().to_string())),
        }
    }
}
