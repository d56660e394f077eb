//! Statement-level privilege model.
//!
//! The executor extracts the tables and locations a statement touches and
//! hands them over as an [`OperationRequest`]. [`OperationRequest::expand`]
//! turns that into the `(action, resource)` requirements the subject must
//! satisfy.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_core::{Action, Component, ObjectPath, ResourceRequest, UriPath};

/// Kind of statement being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateDatabase,
    DropDatabase,
    CreateFunction,
    AddJar,
    AlterDatabase,
    CreateTable,
    DropTable,
    DropView,
    CreateTableAsSelect,
    CreateView,
    CreateExternalTable,
    AlterTable,
    AlterView,
    CreateIndex,
    AlterTableSetLocation,
    AddPartitionWithLocation,
    Query,
    Describe,
    ShowIndexes,
    Explain,
    Insert,
    InsertOverwriteDirectory,
    LoadData,
    AnalyzeTable,
    Export,
    Import,
    Use,
    ShowDatabases,
    ShowTables,
}

impl OperationKind {
    pub const ALL: [OperationKind; 29] = [
        Self::CreateDatabase,
        Self::DropDatabase,
        Self::CreateFunction,
        Self::AddJar,
        Self::AlterDatabase,
        Self::CreateTable,
        Self::DropTable,
        Self::DropView,
        Self::CreateTableAsSelect,
        Self::CreateView,
        Self::CreateExternalTable,
        Self::AlterTable,
        Self::AlterView,
        Self::CreateIndex,
        Self::AlterTableSetLocation,
        Self::AddPartitionWithLocation,
        Self::Query,
        Self::Describe,
        Self::ShowIndexes,
        Self::Explain,
        Self::Insert,
        Self::InsertOverwriteDirectory,
        Self::LoadData,
        Self::AnalyzeTable,
        Self::Export,
        Self::Import,
        Self::Use,
        Self::ShowDatabases,
        Self::ShowTables,
    ];

    /// The requirement row for this kind.
    #[must_use]
    pub fn privileges(self) -> PrivilegeSpec {
        use OperationKind::*;

        let none = PrivilegeSpec::default();
        match self {
            CreateDatabase | DropDatabase | CreateFunction | AddJar => PrivilegeSpec {
                server: Some(Action::All),
                ..none
            },
            AlterDatabase | CreateTable | DropTable | DropView => PrivilegeSpec {
                database: Some(Action::All),
                ..none
            },
            CreateTableAsSelect | CreateView => PrivilegeSpec {
                database: Some(Action::All),
                inputs: &[Action::Select],
                ..none
            },
            CreateExternalTable => PrivilegeSpec {
                database: Some(Action::All),
                input_uris: true,
                ..none
            },
            AlterTable | AlterView | CreateIndex => PrivilegeSpec {
                outputs: &[Action::All],
                ..none
            },
            AlterTableSetLocation | AddPartitionWithLocation => PrivilegeSpec {
                outputs: &[Action::All],
                input_uris: true,
                ..none
            },
            Query | Describe | ShowIndexes | Explain => PrivilegeSpec {
                inputs: &[Action::Select],
                ..none
            },
            Insert => PrivilegeSpec {
                inputs: &[Action::Select],
                outputs: &[Action::Insert],
                ..none
            },
            InsertOverwriteDirectory => PrivilegeSpec {
                inputs: &[Action::Select],
                output_uris: true,
                ..none
            },
            LoadData => PrivilegeSpec {
                outputs: &[Action::Insert],
                input_uris: true,
                ..none
            },
            AnalyzeTable => PrivilegeSpec {
                inputs: &[Action::Select, Action::Insert],
                ..none
            },
            Export => PrivilegeSpec {
                inputs: &[Action::Select],
                output_uris: true,
                ..none
            },
            Import => PrivilegeSpec {
                database: Some(Action::All),
                input_uris: true,
                ..none
            },
            Use => PrivilegeSpec {
                any_on_database: true,
                ..none
            },
            ShowDatabases | ShowTables => none,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        use OperationKind::*;
        match self {
            CreateDatabase => "create_database",
            DropDatabase => "drop_database",
            CreateFunction => "create_function",
            AddJar => "add_jar",
            AlterDatabase => "alter_database",
            CreateTable => "create_table",
            DropTable => "drop_table",
            DropView => "drop_view",
            CreateTableAsSelect => "create_table_as_select",
            CreateView => "create_view",
            CreateExternalTable => "create_external_table",
            AlterTable => "alter_table",
            AlterView => "alter_view",
            CreateIndex => "create_index",
            AlterTableSetLocation => "alter_table_set_location",
            AddPartitionWithLocation => "add_partition_with_location",
            Query => "query",
            Describe => "describe",
            ShowIndexes => "show_indexes",
            Explain => "explain",
            Insert => "insert",
            InsertOverwriteDirectory => "insert_overwrite_directory",
            LoadData => "load_data",
            AnalyzeTable => "analyze_table",
            Export => "export",
            Import => "import",
            Use => "use",
            ShowDatabases => "show_databases",
            ShowTables => "show_tables",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown operation kind `{s}`"))
    }
}

/// Privileges one [`OperationKind`] demands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivilegeSpec {
    /// Action required on the server itself.
    pub server: Option<Action>,
    /// Action required on the target database.
    pub database: Option<Action>,
    /// Actions required on every input table.
    pub inputs: &'static [Action],
    /// Actions required on every output table.
    pub outputs: &'static [Action],
    /// `ALL` on every input URI.
    pub input_uris: bool,
    /// `ALL` on every output URI.
    pub output_uris: bool,
    /// Any privilege on or below the target database.
    pub any_on_database: bool,
}

impl PrivilegeSpec {
    fn needs_database(&self) -> bool {
        self.database.is_some() || self.any_on_database
    }
}

/// A statement as extracted by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub kind: OperationKind,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub inputs: Vec<ObjectPath>,
    #[serde(default)]
    pub outputs: Vec<ObjectPath>,
    #[serde(default)]
    pub input_uris: Vec<String>,
    #[serde(default)]
    pub output_uris: Vec<String>,
}

/// Why an operation request could not be expanded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    #[error("Operation {0} needs a target database")]
    MissingDatabase(OperationKind),

    #[error("Operation {kind} has an invalid location `{uri}`: {reason}")]
    InvalidUri {
        kind: OperationKind,
        uri: String,
        reason: String,
    },
}

/// The expansion of an [`OperationRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    /// Every request must be allowed.
    pub requests: Vec<ResourceRequest>,
    /// Some grant must lie on, above or below this path.
    pub any_privilege_on: Option<ObjectPath>,
}

impl OperationRequest {
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            database: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_uris: Vec::new(),
            output_uris: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn with_input(mut self, table: ObjectPath) -> Self {
        self.inputs.push(table);
        self
    }

    #[must_use]
    pub fn with_output(mut self, table: ObjectPath) -> Self {
        self.outputs.push(table);
        self
    }

    #[must_use]
    pub fn with_input_uri(mut self, uri: impl Into<String>) -> Self {
        self.input_uris.push(uri.into());
        self
    }

    #[must_use]
    pub fn with_output_uri(mut self, uri: impl Into<String>) -> Self {
        self.output_uris.push(uri.into());
        self
    }

    /// The database for database-scoped requirements: the explicit one,
    /// else the database of the first output.
    #[must_use]
    pub fn target_database(&self) -> Option<String> {
        self.database
            .as_deref()
            .map(str::trim)
            .filter(|db| !db.is_empty())
            .map(str::to_ascii_lowercase)
            .or_else(|| {
                self.outputs
                    .first()
                    .and_then(|output| output.database_name().map(str::to_string))
            })
    }

    /// Expand into resource requests against `server`.
    pub fn expand(&self, server: &Component) -> Result<Requirements, OperationError> {
        let spec = self.kind.privileges();
        let mut requirements = Requirements::default();

        if let Some(action) = spec.server {
            requirements
                .requests
                .push(ResourceRequest::object(ObjectPath::for_server(server.clone()), action));
        }

        if spec.needs_database() {
            let database = self
                .target_database()
                .ok_or(OperationError::MissingDatabase(self.kind))?;
            let path = ObjectPath::for_database(server.clone(), Component::parse(&database));
            if let Some(action) = spec.database {
                requirements
                    .requests
                    .push(ResourceRequest::object(path.clone(), action));
            }
            if spec.any_on_database {
                requirements.any_privilege_on = Some(path);
            }
        }

        for table in &self.inputs {
            for &action in spec.inputs {
                requirements
                    .requests
                    .push(ResourceRequest::object(table.clone(), action));
            }
        }
        for table in &self.outputs {
            for &action in spec.outputs {
                requirements
                    .requests
                    .push(ResourceRequest::object(table.clone(), action));
            }
        }

        let uris = spec
            .input_uris
            .then_some(&self.input_uris)
            .into_iter()
            .chain(spec.output_uris.then_some(&self.output_uris))
            .flatten();
        for raw in uris {
            let uri = UriPath::parse_request(raw).map_err(|e| OperationError::InvalidUri {
                kind: self.kind,
                uri: raw.clone(),
                reason: e.to_string(),
            })?;
            requirements
                .requests
                .push(ResourceRequest::uri(server.clone(), uri));
        }

        Ok(requirements)
    }
}
