/*
[INPUT]:  YAML configuration file + DBTASK__* environment overrides
[OUTPUT]: Parsed engine configuration
[POS]:    Configuration layer - wizard, poller, storage and project setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use dbtask_model::{BoundObject, CatalogDefinition, DataSourceDescriptor};
use serde::{Deserialize, Serialize};

use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::storage::default_data_dir;
use crate::wizard::DEFAULT_MAX_EXECUTION_TIME;

const DEFAULT_CATALOG: &str = include_str!("default_catalog.yaml");
const ENV_PREFIX: &str = "DBTASK";

/// Top-level configuration of the task engine
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Catalog definition file; the built-in catalog is used when absent
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub project: ProjectConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WizardConfig {
    /// Hide task types no connected data source can use
    #[serde(default = "default_true")]
    pub filter_task_types: bool,
    #[serde(default = "default_max_execution_time_secs")]
    pub default_max_execution_time_secs: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            filter_task_types: true,
            default_max_execution_time_secs: default_max_execution_time_secs(),
        }
    }
}

impl WizardConfig {
    pub fn default_max_execution_time(&self) -> Duration {
        Duration::from_secs(self.default_max_execution_time_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollerConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// No deadline means poll until cancelled
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            deadline_ms: None,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(default_data_dir)
    }
}

/// Project the CLI works against
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    #[serde(default = "default_project_name")]
    pub name: String,
    #[serde(default)]
    pub data_sources: Vec<DataSourceDescriptor>,
    /// Top-level navigator objects in enumeration order
    #[serde(default)]
    pub objects: Vec<BoundObject>,
    /// Delay before the data source registry reports loaded
    #[serde(default)]
    pub connect_delay_ms: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            data_sources: Vec::new(),
            objects: Vec::new(),
            connect_delay_ms: 0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from an optional YAML file, then apply
    /// `DBTASK__*` overrides. Without a file the overrides apply to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::build(path, env_overrides())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()))
    }

    fn build(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let source = path.map_or_else(|| "environment".to_string(), |p| p.display().to_string());
        builder
            .add_source(env)
            .build()
            .with_context(|| format!("read config {source}"))?
            .try_deserialize()
            .context("parse engine config")
    }

    /// Configured catalog definition, or the built-in one
    pub fn catalog_definition(&self) -> Result<CatalogDefinition> {
        match &self.catalog_path {
            Some(path) => CatalogDefinition::from_file(path)
                .with_context(|| format!("load catalog {}", path.display())),
            None => CatalogDefinition::from_yaml(DEFAULT_CATALOG).context("parse built-in catalog"),
        }
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn default_true() -> bool {
    true
}

fn default_max_execution_time_secs() -> u64 {
    DEFAULT_MAX_EXECUTION_TIME.as_secs()
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_project_name() -> String {
    "General".to_string()
}
