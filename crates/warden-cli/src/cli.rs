use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Warden CLI - validate, query and edit role-based access policies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to warden.toml (defaults to ./warden.toml when present)
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    pub config: Option<String>,

    /// Root policy locator (overrides policy.root)
    #[arg(short, long, global = true, env = "WARDEN_POLICY_ROOT")]
    pub root: Option<String>,

    /// Server name requests are evaluated against (overrides policy.server)
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load every policy document and report problems
    Validate(ValidateArgs),
    /// Decide a single request or a whole statement
    Check(CheckArgs),
    /// List the effective privileges of a set of groups
    Explain(ExplainArgs),
    /// Add permissions to a role
    Grant(RolePermissionsArgs),
    /// Remove permissions from a role
    Revoke(RolePermissionsArgs),
    /// Map roles to a group
    Assign(GroupRolesArgs),
    /// Remove roles from a group
    Unassign(GroupRolesArgs),
    /// Point a database at its own policy document
    AddDatabase(AddDatabaseArgs),
    /// Stop using a per-database policy document
    RemoveDatabase(RemoveDatabaseArgs),
    /// Reload the policy whenever it changes
    Watch(WatchArgs),
    /// Show the effective configuration
    Config,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Treat undefined role references and unavailable databases as errors
    #[arg(long)]
    pub strict: bool,
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Groups of the requesting subject (repeatable)
    #[arg(short, long = "group", required_unless_present = "user")]
    pub groups: Vec<String>,

    /// User whose groups come from the root policy's [users] section
    #[arg(short, long)]
    pub user: Option<String>,

    /// Resource to check (e.g. server=server1->db=sales->table=orders)
    #[arg(conflicts_with = "operation")]
    pub resource: Option<String>,

    /// Action for a resource check (select, insert, all)
    #[arg(short, long, default_value = "select")]
    pub action: String,

    /// Statement kind to check instead of a single resource (e.g. create_table)
    #[arg(short, long)]
    pub operation: Option<String>,

    /// Target database of the statement
    #[arg(long)]
    pub database: Option<String>,

    /// Tables read by the statement, as db.table (repeatable)
    #[arg(long = "input")]
    pub inputs: Vec<String>,

    /// Tables written by the statement, as db.table (repeatable)
    #[arg(long = "output")]
    pub outputs: Vec<String>,

    /// Locations read by the statement (repeatable)
    #[arg(long = "input-uri")]
    pub input_uris: Vec<String>,

    /// Locations written by the statement (repeatable)
    #[arg(long = "output-uri")]
    pub output_uris: Vec<String>,
}

#[derive(clap::Args)]
pub struct ExplainArgs {
    /// Groups to explain (repeatable)
    #[arg(short, long = "group", required_unless_present = "user")]
    pub groups: Vec<String>,

    /// User whose groups come from the root policy's [users] section
    #[arg(short, long)]
    pub user: Option<String>,

    /// Also list which of these databases the groups can see
    #[arg(long = "database")]
    pub databases: Vec<String>,
}

#[derive(clap::Args)]
pub struct RolePermissionsArgs {
    /// Role name
    pub role: String,
    /// Permission strings
    #[arg(required = true)]
    pub permissions: Vec<String>,
}

#[derive(clap::Args)]
pub struct GroupRolesArgs {
    /// Group name
    pub group: String,
    /// Role names
    #[arg(required = true)]
    pub roles: Vec<String>,
}

#[derive(clap::Args)]
pub struct AddDatabaseArgs {
    /// Database name
    pub database: String,
    /// Locator of the database's policy document, relative to the root or absolute
    pub locator: String,
}

#[derive(clap::Args)]
pub struct RemoveDatabaseArgs {
    /// Database name
    pub database: String,
}

#[derive(clap::Args)]
pub struct WatchArgs {
    /// Seconds between change checks (overrides reload.interval_secs)
    #[arg(short, long)]
    pub interval: Option<u64>,
}
