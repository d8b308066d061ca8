//! Supported platforms and how each one declares its metadata.
//!
//! The table is fixed; configuration can only disable a platform or change
//! the entry names and annotation it looks for.

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::archive::Archive;
use crate::cancel::CancelToken;
use crate::classfile;
use crate::config::PlatformOverride;
use crate::descriptor;
use crate::error::MetaError;
use crate::metadata::PlatformMetadata;

pub const MANIFEST: &str = "META-INF/MANIFEST.MF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Paper,
    Waterfall,
    Velocity,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Paper, Platform::Waterfall, Platform::Velocity];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Paper => "paper",
            Platform::Waterfall => "waterfall",
            Platform::Velocity => "velocity",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform `{s}`"))
    }
}

type DescriptorParser = fn(&str, &[u8], &Regex) -> Result<Option<PlatformMetadata>, MetaError>;
type AnnotationParser =
    fn(&str, &classfile::Annotation, &Regex) -> Result<PlatformMetadata, MetaError>;

struct PlatformEntry {
    platform: Platform,
    descriptors: &'static [&'static str],
    parse: DescriptorParser,
    annotation: Option<(&'static str, AnnotationParser)>,
}

const TABLE: [PlatformEntry; 3] = [
    PlatformEntry {
        platform: Platform::Paper,
        descriptors: &["paper-plugin.yml", "plugin.yml"],
        parse: descriptor::paper_yaml,
        annotation: None,
    },
    PlatformEntry {
        platform: Platform::Waterfall,
        descriptors: &["bungee.yml", "waterfall.yml"],
        parse: descriptor::bungee_yaml,
        annotation: None,
    },
    PlatformEntry {
        platform: Platform::Velocity,
        descriptors: &["velocity-plugin.json"],
        parse: descriptor::velocity_json,
        annotation: Some((
            "com/velocitypowered/api/plugin/Plugin",
            descriptor::velocity_annotation as AnnotationParser,
        )),
    },
];

/// One platform's locating strategy, after configuration overrides.
#[derive(Clone)]
pub struct Locator {
    pub platform: Platform,
    pub descriptors: Vec<String>,
    pub annotation: Option<String>,
    parse: DescriptorParser,
    parse_annotation: Option<AnnotationParser>,
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("platform", &self.platform)
            .field("descriptors", &self.descriptors)
            .field("annotation", &self.annotation)
            .finish()
    }
}

/// Locators for every enabled platform, in table order.
pub fn locators(overrides: &BTreeMap<Platform, PlatformOverride>) -> Vec<Locator> {
    TABLE
        .iter()
        .filter_map(|entry| {
            let custom = overrides.get(&entry.platform);
            if custom.and_then(|c| c.enabled) == Some(false) {
                debug!(platform = %entry.platform, "platform disabled by configuration");
                return None;
            }

            let descriptors = custom
                .and_then(|c| c.descriptors.clone())
                .unwrap_or_else(|| entry.descriptors.iter().map(|d| d.to_string()).collect());

            let mut annotation = entry.annotation.map(|(name, _)| name.to_string());
            if let Some(name) = custom.and_then(|c| c.annotation.clone()) {
                if entry.annotation.is_some() {
                    annotation = Some(name);
                } else {
                    warn!(platform = %entry.platform, "platform has no annotation strategy, ignoring override");
                }
            }

            Some(Locator {
                platform: entry.platform,
                descriptors,
                annotation,
                parse: entry.parse,
                parse_annotation: entry.annotation.map(|(_, parse)| parse),
            })
        })
        .collect()
}

/// `Main-Class` of a jar manifest. Continuation lines start with one space.
pub fn manifest_main_class(manifest: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(manifest);
    let mut logical: Vec<String> = Vec::new();
    for line in text.lines() {
        match (line.strip_prefix(' '), logical.last_mut()) {
            (Some(rest), Some(previous)) => previous.push_str(rest),
            _ => logical.push(line.to_string()),
        }
    }
    logical.into_iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (key.trim().eq_ignore_ascii_case("Main-Class") && !value.is_empty())
            .then(|| value.to_string())
    })
}

impl Locator {
    /// Find and parse this platform's metadata. `Ok(None)` means the platform
    /// is not declared by the archive. `cancel` is checked before every entry
    /// read.
    pub fn locate(
        &self,
        archive: &Archive,
        version_rule: &Regex,
        cancel: &CancelToken,
    ) -> Result<Option<PlatformMetadata>, MetaError> {
        for name in &self.descriptors {
            if cancel.is_cancelled() {
                return Err(MetaError::Cancelled);
            }
            let Some(bytes) = archive.read_by_name(name)? else {
                continue;
            };
            debug!(platform = %self.platform, entry = %name, "descriptor found");
            if let Some(meta) = (self.parse)(name, &bytes, version_rule)? {
                return Ok(Some(meta));
            }
        }

        match (&self.annotation, self.parse_annotation) {
            (Some(annotation), Some(parse)) => {
                if cancel.is_cancelled() {
                    return Err(MetaError::Cancelled);
                }
                self.locate_annotation(archive, annotation, parse, version_rule)
            }
            _ => Ok(None),
        }
    }

    fn locate_annotation(
        &self,
        archive: &Archive,
        annotation: &str,
        parse: AnnotationParser,
        version_rule: &Regex,
    ) -> Result<Option<PlatformMetadata>, MetaError> {
        let Some(manifest) = archive.read_by_name(MANIFEST)? else {
            return Ok(None);
        };
        let Some(main_class) = manifest_main_class(&manifest) else {
            return Ok(None);
        };
        let internal = main_class.replace('.', "/");
        let Some(bytes) = archive.read_by_name(&format!("{internal}.class"))? else {
            debug!(platform = %self.platform, class = %main_class, "entry class missing");
            return Ok(None);
        };

        let class = match classfile::decode(&bytes) {
            Ok(class) => class,
            Err(e) => {
                debug!(platform = %self.platform, class = %main_class, error = %e, "entry class unreadable");
                return Ok(None);
            }
        };
        match class.annotation(annotation) {
            Some(found) => {
                debug!(platform = %self.platform, class = %class.name, "annotation found");
                parse(&class.name, found, version_rule).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Run every locator over `archive` in parallel.
///
/// Results come back in table order. When several locators fail, the error
/// of the first one in table order is returned. A fired `cancel` skips the
/// remaining locators and yields [`MetaError::Cancelled`].
pub fn locate_all(
    archive: &Archive,
    locators: &[Locator],
    version_rule: &Regex,
    cancel: &CancelToken,
) -> Result<Vec<PlatformMetadata>, MetaError> {
    let results: Vec<Result<Option<PlatformMetadata>, MetaError>> = locators
        .par_iter()
        .map(|locator| {
            if cancel.is_cancelled() {
                return Err(MetaError::Cancelled);
            }
            locator.locate(archive, version_rule, cancel)
        })
        .collect();

    if cancel.is_cancelled() {
        return Err(MetaError::Cancelled);
    }

    let mut found = Vec::new();
    for result in results {
        found.extend(result?);
    }
    Ok(found)
}
