//! Runtime configuration: resource limits, scan budget, descriptor locations
//! and additional checks. Everything here is an input owned by the caller;
//! the defaults are only a starting point.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checks::Check;
use crate::platform::Platform;

pub const CONFIG_ENV: &str = "PLUGIN_INTAKE_CONFIG";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub limits: Limits,
    pub scan: ScanConfig,
    pub metadata: MetadataConfig,
    pub platforms: BTreeMap<Platform, PlatformOverride>,
    /// Start from the built-in check set before appending `checks`.
    pub builtin_checks: bool,
    pub checks: Vec<Check>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            scan: ScanConfig::default(),
            metadata: MetadataConfig::default(),
            platforms: BTreeMap::new(),
            builtin_checks: true,
            checks: Vec::new(),
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    pub max_archive_bytes: u64,
    pub max_entries: usize,
    pub max_total_uncompressed_bytes: u64,
    pub max_entry_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_archive_bytes: 100 * MIB,
            max_entries: 65_536,
            max_total_uncompressed_bytes: 512 * MIB,
            max_entry_bytes: 64 * MIB,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub max_instructions: u64,
    pub max_duration_ms: u64,
    /// Dedicated worker count; `None` shares the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_instructions: 50_000_000,
            max_duration_ms: 30_000,
            threads: None,
        }
    }
}

impl ScanConfig {
    pub fn budget(&self) -> ScanBudget {
        ScanBudget {
            max_instructions: self.max_instructions,
            max_duration: Duration::from_millis(self.max_duration_ms),
        }
    }
}

/// Limits applied to a single scan pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScanBudget {
    pub max_instructions: u64,
    pub max_duration: Duration,
}

impl Default for ScanBudget {
    fn default() -> Self {
        ScanConfig::default().budget()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub version_pattern: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            version_pattern: r"^[a-zA-Z0-9\-_.+]+$".to_string(),
        }
    }
}

/// Per-platform overrides. Unset fields keep the platform's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformOverride {
    pub enabled: Option<bool>,
    pub descriptors: Option<Vec<String>>,
    pub annotation: Option<String>,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Resolve and load the effective configuration.
    ///
    /// Lookup order: explicit path, `PLUGIN_INTAKE_CONFIG`, then the user
    /// config directory. Falls back to defaults when nothing is found.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match resolve_config_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    if let Ok(p) = env::var(CONFIG_ENV)
        && !p.trim().is_empty()
    {
        return Some(PathBuf::from(p));
    }

    let default_path = dirs::config_dir()?
        .join("plugin-intake")
        .join("config.toml");
    default_path.exists().then_some(default_path)
}
