use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "warden.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WardenConfig {
    #[serde(default)]
    pub policy: PolicySettings,
    #[serde(default)]
    pub reload: ReloadSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Locator of the root policy document
    #[serde(default)]
    pub root: Option<String>,
    /// Server name requests are evaluated against
    #[serde(default = "default_server")]
    pub server: String,
}

fn default_server() -> String {
    "server1".into()
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            root: None,
            server: default_server(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl WardenConfig {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(root) = &self.policy.root
            && root.trim().is_empty()
        {
            return Err("policy.root must not be empty".into());
        }
        if self.policy.server.trim().is_empty() {
            return Err("policy.server must not be empty".into());
        }
        if self.reload.interval_secs == 0 {
            return Err("reload.interval_secs must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.reload.interval_secs)
    }
}

/// Build the configuration from an optional file plus `WARDEN__*` overrides.
///
/// An explicit `path` must exist; the default `warden.toml` is optional.
pub fn load_config(path: Option<&str>) -> Result<WardenConfig, String> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            let pathbuf = PathBuf::from(p);
            if !pathbuf.exists() {
                return Err(format!("config file {p} does not exist"));
            }
            builder = builder.add_source(File::from(pathbuf));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    // e.g. WARDEN__POLICY__ROOT=/etc/warden/policy.ini
    builder = builder.add_source(
        Environment::with_prefix("WARDEN")
            .prefix_separator("__")
            .try_parsing(true)
            .separator("__"),
    );
    let cfg = builder
        .build()
        .map_err(|e| format!("config build error: {e}"))?;
    let merged: WardenConfig = cfg
        .try_deserialize()
        .map_err(|e| format!("config deserialize error: {e}"))?;
    merged.validate()?;
    Ok(merged)
}
