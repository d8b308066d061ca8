//! Plugin metadata model and the assembler that merges per-platform results.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::MetaError;
use crate::platform::Platform;

/// A dependency on another plugin. Equality and ordering use the name only,
/// so a set holds at most one entry per name.
#[derive(Debug, Clone, Serialize)]
pub struct PluginDependency {
    pub name: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

impl PluginDependency {
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            required,
            external_url: None,
        }
    }
}

impl PartialEq for PluginDependency {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for PluginDependency {}

impl PartialOrd for PluginDependency {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PluginDependency {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl std::hash::Hash for PluginDependency {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Metadata declared for a single platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformMetadata {
    pub platform: Platform,
    /// Descriptor entry or annotated class the values came from.
    pub source: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub dependencies: BTreeSet<PluginDependency>,
    pub platform_versions: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

impl PlatformMetadata {
    pub fn required_dependencies(&self) -> impl Iterator<Item = &PluginDependency> {
        self.dependencies.iter().filter(|d| d.required)
    }
}

/// Validated metadata for the whole plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub platforms: BTreeMap<Platform, PlatformMetadata>,
}

impl PluginMetadata {
    pub fn platform(&self, platform: Platform) -> Option<&PlatformMetadata> {
        self.platforms.get(&platform)
    }

    pub fn dependencies(&self, platform: Platform) -> Option<&BTreeSet<PluginDependency>> {
        self.platforms.get(&platform).map(|m| &m.dependencies)
    }
}

fn agreed(
    field: &'static str,
    values: impl Iterator<Item = String>,
) -> Result<String, MetaError> {
    let mut distinct: Vec<String> = Vec::new();
    for value in values {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }
    match distinct.len() {
        1 => Ok(distinct.remove(0)),
        _ => Err(MetaError::Inconsistent {
            field,
            values: distinct,
        }),
    }
}

/// Merge per-platform results into one [`PluginMetadata`].
///
/// Every platform that produced metadata must agree on name and version.
/// Authors and dependencies stay per platform, untouched.
pub fn assemble(results: Vec<PlatformMetadata>) -> Result<PluginMetadata, MetaError> {
    let mut platforms = BTreeMap::new();
    for result in results {
        platforms.entry(result.platform).or_insert(result);
    }
    if platforms.is_empty() {
        return Err(MetaError::NotFound);
    }

    let name = agreed("name", platforms.values().map(|m| m.name.trim().to_string()))?;
    let version = agreed(
        "version",
        platforms.values().map(|m| m.version.trim().to_string()),
    )?;
    if name.is_empty() {
        return Err(MetaError::Incomplete {
            platform: None,
            field: "name",
        });
    }
    if version.is_empty() {
        return Err(MetaError::Incomplete {
            platform: None,
            field: "version",
        });
    }

    let description = platforms
        .values()
        .find_map(|m| m.description.clone().filter(|d| !d.trim().is_empty()));

    Ok(PluginMetadata {
        name,
        version,
        description,
        platforms,
    })
}
