use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

const APP_NAME: &str = "cost-tracker";
const CONFIG_NAME: &str = "config";

/// Top-level configuration, stored as TOML via confy
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub pricing: PricingConfig,
    pub transcripts: TranscriptConfig,
    pub sweep: SweepConfig,
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for session logs, archives and history
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from(".cost-tracker"));
        Self { path }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PricingConfig {
    /// Rate-card JSON file. Defaults to `<storage>/pricing.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Directory holding one subdirectory per project, each with `<session>.jsonl` transcripts
    pub projects_dir: PathBuf,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        let projects_dir = dirs::home_dir()
            .map(|h| h.join(".claude").join("projects"))
            .unwrap_or_else(|| PathBuf::from(".claude/projects"));
        Self { projects_dir }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Chance per `pre` event of sweeping stale active logs
    pub probability: f64,
    /// Age after which an active log counts as orphaned
    pub retention_hours: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            probability: 0.01,
            retention_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HooksConfig {
    /// Store the stop summary for the next prompt instead of blocking on stop
    pub defer_summary: bool,
}

impl Config {
    /// Data root with `~` expanded
    pub fn data_dir(&self) -> PathBuf {
        expand(&self.storage.path)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir().join("sessions")
    }

    pub fn pricing_path(&self) -> PathBuf {
        match &self.pricing.path {
            Some(p) => expand(p),
            None => self.data_dir().join("pricing.json"),
        }
    }

    pub fn projects_dir(&self) -> PathBuf {
        expand(&self.transcripts.projects_dir)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Load configuration from the platform config directory, or from `path` when given
pub fn load_config_from(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) => confy::load_path(p)?,
        None => confy::load(APP_NAME, CONFIG_NAME)?,
    };
    Ok(config)
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
