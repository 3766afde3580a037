use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::buffer::OverflowPolicy;
use crate::export::{RetryConfig, SinkConfig};
use crate::record::Resource;

pub const CONFIG_FILENAME: &str = "telepipe.toml";

/// Pipeline settings. Every field has a default, so an empty file (or no
/// file at all) yields a working local configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-signal buffer capacity, in records
    pub buffer_capacity: usize,
    /// Largest batch handed to the exporter in one drain
    pub max_batch_size: usize,
    /// Time-based flush trigger, in milliseconds
    pub flush_interval_ms: u64,
    pub overflow_policy: OverflowPolicy,
    pub retry: RetryConfig,
    pub sink: SinkConfig,
    pub resource: ResourceConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 2_048,
            max_batch_size: 512,
            flush_interval_ms: 5_000,
            overflow_policy: OverflowPolicy::default(),
            retry: RetryConfig::default(),
            sink: SinkConfig::default(),
            resource: ResourceConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn load() -> Result<Self> {
        load_config_from_path(CONFIG_FILENAME)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Identity attributes stamped on every batch this process exports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub service_name: String,
    pub service_version: Option<String>,
    pub environment: Option<String>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: None,
            environment: None,
        }
    }
}

impl ResourceConfig {
    pub fn build(&self) -> Resource {
        let mut resource = Resource::new(self.service_name.clone());
        if let Some(version) = &self.service_version {
            resource = resource.with("service.version", version.clone());
        }
        if let Some(environment) = &self.environment {
            resource = resource.with("deployment.environment", environment.clone());
        }
        resource
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    let config: PipelineConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.as_ref().display()))?;
    Ok(config)
}

/// Load the config file if present, falling back to defaults
pub fn try_load_config() -> PipelineConfig {
    PipelineConfig::load().unwrap_or_default()
}
