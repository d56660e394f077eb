pub mod check;
pub mod edit;
pub mod explain;
pub mod validate;
pub mod watch;

use anyhow::{Context as _, Result, bail};
use warden_core::Subject;
use warden_policy::{
    EngineConfig, GroupMapping, LocalGroupMapping, PolicyDistributor, PolicyService,
    PolicySnapshot,
};
use warden_storage::{Locator, StorageRegistry};

use crate::cli::OutputFormat;
use crate::config::WardenConfig;

/// Settings shared by every command after flags and config are merged.
pub struct Context {
    pub config: WardenConfig,
    pub root: Locator,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(config: WardenConfig, format: OutputFormat) -> Result<Self> {
        let raw = config.policy.root.as_deref().context(
            "No root policy configured. Use --root, set WARDEN_POLICY_ROOT, or set policy.root in warden.toml",
        )?;
        let root = Locator::parse(raw).with_context(|| format!("Invalid root locator `{raw}`"))?;
        Ok(Self {
            config,
            root,
            format,
        })
    }

    pub fn distributor(&self) -> PolicyDistributor {
        PolicyDistributor::new(StorageRegistry::with_local())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            server: self.config.policy.server.clone(),
        }
    }

    pub async fn open_service(&self) -> Result<PolicyService> {
        PolicyService::open(self.distributor(), self.root.clone(), self.engine_config())
            .await
            .with_context(|| format!("Failed to load policy from {}", self.root))
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

/// The explicit `--group`s plus the `[users]` groups of `--user`.
pub fn subject_for(
    snapshot: &PolicySnapshot,
    groups: &[String],
    user: Option<&str>,
) -> Result<Subject> {
    let mut all: Vec<String> = groups.to_vec();
    if let Some(user) = user {
        let mapped = LocalGroupMapping::from_document(snapshot.view.root()).groups_for(user);
        if mapped.is_empty() && groups.is_empty() {
            bail!("User {user} has no groups in the root policy's [users] section");
        }
        all.extend(mapped);
    }
    Ok(Subject::new(all))
}
