//! Parsers for the per-platform descriptor schemas.
//!
//! Each parser turns one descriptor (a YAML or JSON entry, or the arguments of
//! a class annotation) into a validated [`PlatformMetadata`]. An empty
//! descriptor is reported as absent rather than malformed.

use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use std::collections::{BTreeMap, BTreeSet};

use crate::classfile::{Annotation, AnnotationValue};
use crate::error::MetaError;
use crate::metadata::{PlatformMetadata, PluginDependency};
use crate::platform::Platform;

/// A YAML scalar that may have been written as a string, number or boolean.
/// `number` holds the parsed value of a numeric scalar so its source text can
/// be recovered.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawScalar")]
struct Scalar {
    text: String,
    number: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl From<RawScalar> for Scalar {
    fn from(raw: RawScalar) -> Self {
        let (text, number) = match raw {
            RawScalar::Str(s) => (s, None),
            RawScalar::Int(v) => (v.to_string(), Some(v as f64)),
            RawScalar::UInt(v) => (v.to_string(), Some(v as f64)),
            RawScalar::Float(v) => (v.to_string(), Some(v)),
            RawScalar::Bool(v) => (v.to_string(), None),
        };
        Self { text, number }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

fn list(value: Option<OneOrMany<Scalar>>) -> Vec<String> {
    value
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.text)
        .collect()
}

/// `plugin.yml` and `paper-plugin.yml`.
#[derive(Debug, Deserialize)]
struct PaperDescriptor {
    name: Option<Scalar>,
    version: Option<Scalar>,
    main: Option<String>,
    description: Option<Scalar>,
    author: Option<Scalar>,
    authors: Option<OneOrMany<Scalar>>,
    depend: Option<OneOrMany<Scalar>>,
    softdepend: Option<OneOrMany<Scalar>>,
    #[serde(rename = "api-version")]
    api_version: Option<Scalar>,
    dependencies: Option<PaperDependencies>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaperDependencies {
    List(Vec<PaperListDependency>),
    Sections {
        #[serde(default)]
        server: BTreeMap<String, Option<PaperDependencyOptions>>,
    },
}

#[derive(Debug, Deserialize)]
struct PaperListDependency {
    name: Scalar,
    #[serde(default = "required_by_default")]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct PaperDependencyOptions {
    #[serde(default = "required_by_default")]
    required: bool,
}

impl Default for PaperDependencyOptions {
    fn default() -> Self {
        Self { required: true }
    }
}

fn required_by_default() -> bool {
    true
}

/// `bungee.yml` and `waterfall.yml`.
#[derive(Debug, Deserialize)]
struct BungeeDescriptor {
    name: Option<Scalar>,
    version: Option<Scalar>,
    main: Option<String>,
    description: Option<Scalar>,
    author: Option<Scalar>,
    depends: Option<OneOrMany<Scalar>>,
    #[serde(rename = "softDepends")]
    soft_depends: Option<OneOrMany<Scalar>>,
}

/// A JSON string, number or boolean. Numbers keep their source text, so
/// `1.10` is not re-rendered as `1.1`.
#[derive(Debug, Deserialize)]
#[serde(try_from = "Box<RawValue>")]
struct JsonScalar(String);

impl TryFrom<Box<RawValue>> for JsonScalar {
    type Error = String;

    fn try_from(raw: Box<RawValue>) -> Result<Self, Self::Error> {
        let text = raw.get().trim();
        match text.as_bytes().first() {
            Some(b'"') => serde_json::from_str(text).map(Self).map_err(|e| e.to_string()),
            Some(b'-' | b'0'..=b'9') => Ok(Self(text.to_string())),
            _ if text == "true" || text == "false" => Ok(Self(text.to_string())),
            _ => Err(format!("expected a string, number or boolean, found `{text}`")),
        }
    }
}

/// `velocity-plugin.json`.
#[derive(Debug, Deserialize)]
struct VelocityDescriptor {
    id: Option<JsonScalar>,
    name: Option<JsonScalar>,
    version: Option<JsonScalar>,
    description: Option<JsonScalar>,
    #[serde(default)]
    authors: Vec<JsonScalar>,
    #[serde(default)]
    dependencies: Vec<VelocityDependency>,
    main: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VelocityDependency {
    id: JsonScalar,
    #[serde(default)]
    optional: bool,
}

/// Common tail of every parser: trims, validates and freezes the fields.
struct Draft {
    platform: Platform,
    source: String,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    authors: Vec<String>,
    required: Vec<String>,
    optional: Vec<String>,
    platform_versions: Vec<String>,
    entry_point: Option<String>,
}

impl Draft {
    fn new(platform: Platform, source: &str) -> Self {
        Self {
            platform,
            source: source.to_string(),
            name: None,
            version: None,
            description: None,
            authors: Vec::new(),
            required: Vec::new(),
            optional: Vec::new(),
            platform_versions: Vec::new(),
            entry_point: None,
        }
    }

    fn finish(self, version_rule: &Regex) -> Result<PlatformMetadata, MetaError> {
        let non_blank = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let incomplete = |field| MetaError::Incomplete {
            platform: Some(self.platform),
            field,
        };

        let name = non_blank(self.name).ok_or_else(|| incomplete("name"))?;
        let version = non_blank(self.version).ok_or_else(|| incomplete("version"))?;
        if !version_rule.is_match(&version) {
            return Err(MetaError::InvalidVersion {
                platform: self.platform,
                version,
            });
        }

        // Required entries go in first so they win over a same-named soft one.
        let mut dependencies = BTreeSet::new();
        let required = self.required.into_iter().map(|n| (n, true));
        let optional = self.optional.into_iter().map(|n| (n, false));
        for (name, is_required) in required.chain(optional) {
            let name = name.trim();
            if !name.is_empty() {
                dependencies.insert(PluginDependency::new(name, is_required));
            }
        }

        let authors = self
            .authors
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        Ok(PlatformMetadata {
            platform: self.platform,
            source: self.source,
            name,
            version,
            description: non_blank(self.description),
            authors,
            dependencies,
            platform_versions: self
                .platform_versions
                .into_iter()
                .filter_map(|v| non_blank(Some(v)))
                .collect(),
            entry_point: non_blank(self.entry_point),
        })
    }
}

fn malformed(platform: Platform, entry: &str, reason: impl ToString) -> MetaError {
    MetaError::DescriptorMalformed {
        platform,
        entry: entry.to_string(),
        reason: reason.to_string(),
    }
}

/// Source text of a numeric YAML scalar, so `version: 1.10` stays `1.10`
/// instead of the float's shortest rendering.
///
/// Block (`key: 1.10`) and flow (`{key: 1.10}`) layouts are both searched,
/// column-0 keys first. A candidate is used only if it parses to the same
/// number serde_yaml read.
fn literal_text(source: &str, key: &str, scalar: Scalar) -> String {
    let Some(number) = scalar.number else {
        return scalar.text;
    };
    let pattern = format!(
        r#"(?m)(^|[ \t{{,])["']?{}["']?[ \t]*:[ \t]*([-+.0-9][0-9A-Za-z_.+-]*)[ \t]*(?:[,}}\]#]|\r?$)"#,
        regex::escape(key)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return scalar.text;
    };
    let mut candidates: Vec<(bool, &str)> = re
        .captures_iter(source)
        .filter_map(|c| Some((!c.get(1)?.as_str().is_empty(), c.get(2)?.as_str())))
        .collect();
    candidates.sort_by_key(|&(indented, _)| indented);
    candidates
        .into_iter()
        .map(|(_, candidate)| candidate)
        .find(|candidate| candidate.replace('_', "").parse::<f64>() == Ok(number))
        .map_or(scalar.text, str::to_string)
}

fn yaml_document<T: DeserializeOwned>(
    platform: Platform,
    entry: &str,
    source: &str,
) -> Result<Option<T>, MetaError> {
    let blank = source
        .lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with('#') || l == "---");
    if blank {
        return Ok(None);
    }
    let value: serde_yaml::Value =
        serde_yaml::from_str(source).map_err(|e| malformed(platform, entry, e))?;
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value)
            .map(Some)
            .map_err(|e| malformed(platform, entry, e)),
        _ => Err(malformed(platform, entry, "top level is not a mapping")),
    }
}

fn utf8<'a>(platform: Platform, entry: &str, bytes: &'a [u8]) -> Result<&'a str, MetaError> {
    let text = std::str::from_utf8(bytes).map_err(|e| malformed(platform, entry, e))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Parse `plugin.yml` / `paper-plugin.yml`.
pub fn paper_yaml(
    entry: &str,
    bytes: &[u8],
    version_rule: &Regex,
) -> Result<Option<PlatformMetadata>, MetaError> {
    let platform = Platform::Paper;
    let source = utf8(platform, entry, bytes)?;
    let Some(doc) = yaml_document::<PaperDescriptor>(platform, entry, source)? else {
        return Ok(None);
    };

    let text = |key: &str, scalar: Option<Scalar>| scalar.map(|s| literal_text(source, key, s));
    let mut draft = Draft::new(platform, entry);
    draft.name = text("name", doc.name);
    draft.version = text("version", doc.version);
    draft.description = text("description", doc.description);
    draft.entry_point = doc.main;
    draft.authors.extend(text("author", doc.author));
    draft.authors.extend(list(doc.authors));
    draft.required = list(doc.depend);
    draft.optional = list(doc.softdepend);
    draft
        .platform_versions
        .extend(text("api-version", doc.api_version));

    match doc.dependencies {
        Some(PaperDependencies::List(deps)) => {
            for dep in deps {
                let target = if dep.required {
                    &mut draft.required
                } else {
                    &mut draft.optional
                };
                target.push(dep.name.text);
            }
        }
        Some(PaperDependencies::Sections { server }) => {
            for (name, options) in server {
                if options.unwrap_or_default().required {
                    draft.required.push(name);
                } else {
                    draft.optional.push(name);
                }
            }
        }
        None => {}
    }

    draft.finish(version_rule).map(Some)
}

/// Parse `bungee.yml` / `waterfall.yml`.
pub fn bungee_yaml(
    entry: &str,
    bytes: &[u8],
    version_rule: &Regex,
) -> Result<Option<PlatformMetadata>, MetaError> {
    let platform = Platform::Waterfall;
    let source = utf8(platform, entry, bytes)?;
    let Some(doc) = yaml_document::<BungeeDescriptor>(platform, entry, source)? else {
        return Ok(None);
    };

    let text = |key: &str, scalar: Option<Scalar>| scalar.map(|s| literal_text(source, key, s));
    let mut draft = Draft::new(platform, entry);
    draft.name = text("name", doc.name);
    draft.version = text("version", doc.version);
    draft.description = text("description", doc.description);
    draft.entry_point = doc.main;
    draft.authors.extend(text("author", doc.author));
    draft.required = list(doc.depends);
    draft.optional = list(doc.soft_depends);

    draft.finish(version_rule).map(Some)
}

/// Parse `velocity-plugin.json`.
pub fn velocity_json(
    entry: &str,
    bytes: &[u8],
    version_rule: &Regex,
) -> Result<Option<PlatformMetadata>, MetaError> {
    let platform = Platform::Velocity;
    let source = utf8(platform, entry, bytes)?;
    if source.trim().is_empty() {
        return Ok(None);
    }
    let doc: VelocityDescriptor =
        serde_json::from_str(source).map_err(|e| malformed(platform, entry, e))?;

    let mut draft = Draft::new(platform, entry);
    let id = doc.id.map(|s| s.0);
    draft.name = doc.name.map(|s| s.0).filter(|n| !n.trim().is_empty()).or(id);
    draft.version = doc.version.map(|s| s.0);
    draft.description = doc.description.map(|s| s.0);
    draft.entry_point = doc.main;
    draft.authors = doc.authors.into_iter().map(|s| s.0).collect();
    for dep in doc.dependencies {
        let target = if dep.optional {
            &mut draft.optional
        } else {
            &mut draft.required
        };
        target.push(dep.id.0);
    }

    draft.finish(version_rule).map(Some)
}

fn annotation_str(annotation: &Annotation, element: &str) -> Option<String> {
    annotation
        .get(element)
        .and_then(AnnotationValue::as_str)
        .map(str::to_string)
}

/// Read the Velocity `@Plugin` annotation of the entry class.
pub fn velocity_annotation(
    class_name: &str,
    annotation: &Annotation,
    version_rule: &Regex,
) -> Result<PlatformMetadata, MetaError> {
    let mut draft = Draft::new(Platform::Velocity, class_name);
    let id = annotation_str(annotation, "id");
    draft.name = annotation_str(annotation, "name")
        .filter(|n| !n.trim().is_empty())
        .or(id);
    draft.version = annotation_str(annotation, "version");
    draft.description = annotation_str(annotation, "description");
    draft.entry_point = Some(class_name.replace('/', "."));

    if let Some(authors) = annotation.get("authors") {
        draft.authors = authors
            .as_slice()
            .iter()
            .filter_map(|a| a.as_str().map(str::to_string))
            .collect();
    }

    if let Some(deps) = annotation.get("dependencies") {
        for dep in deps.as_slice().iter().filter_map(AnnotationValue::as_annotation) {
            let Some(id) = annotation_str(dep, "id") else {
                continue;
            };
            let optional = dep
                .get("optional")
                .and_then(AnnotationValue::as_bool)
                .unwrap_or(false);
            if optional {
                draft.optional.push(id);
            } else {
                draft.required.push(id);
            }
        }
    }

    draft.finish(version_rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::Literal;
    use crate::config::MetadataConfig;

    fn rule() -> Regex {
        Regex::new(&MetadataConfig::default().version_pattern).unwrap()
    }

    const PAPER_YML: &str = r#"
name: Maintenance
version: 3.0.5
main: eu.kennytv.maintenance.spigot.MaintenanceSpigotBase
description: Enable maintenance mode with a custom maintenance motd and icon.
author: KennyTV
softdepend: [ProtocolLib, ServerListPlus, ProtocolSupport]
api-version: 1.13
"#;

    #[test]
    fn paper_round_trip() {
        let meta = paper_yaml("plugin.yml", PAPER_YML.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.platform, Platform::Paper);
        assert_eq!(meta.name, "Maintenance");
        assert_eq!(meta.version, "3.0.5");
        assert_eq!(
            meta.description.as_deref(),
            Some("Enable maintenance mode with a custom maintenance motd and icon.")
        );
        assert_eq!(meta.authors, vec!["KennyTV"]);
        assert_eq!(meta.dependencies.len(), 3);
        assert!(meta.dependencies.iter().all(|d| !d.required));
        assert_eq!(
            meta.platform_versions.iter().collect::<Vec<_>>(),
            vec!["1.13"]
        );
        assert_eq!(
            meta.entry_point.as_deref(),
            Some("eu.kennytv.maintenance.spigot.MaintenanceSpigotBase")
        );
    }

    #[test]
    fn numeric_scalars_keep_literal_text() {
        let yml = "name: Demo\nversion: 1.10 # trailing\napi-version: 1.20\n";
        let meta = paper_yaml("plugin.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.version, "1.10");
        assert!(meta.platform_versions.contains("1.20"));

        let yml = "name: Demo\nversion: 2\n";
        let meta = paper_yaml("plugin.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.version, "2");
    }

    #[test]
    fn every_numeric_field_keeps_its_source_text() {
        let yml = "name: 1.0\nversion: '2'\ndescription: 3.50\n";
        let meta = paper_yaml("plugin.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.name, "1.0");
        assert_eq!(meta.version, "2");
        assert_eq!(meta.description.as_deref(), Some("3.50"));

        let meta = bungee_yaml("bungee.yml", b"name: Demo\r\nversion: 4.10\r\n", &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.version, "4.10");
    }

    #[test]
    fn flow_mapping_numbers_keep_their_source_text() {
        let meta = paper_yaml("plugin.yml", b"{name: Demo, version: 1.10}", &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.name, "Demo");
        assert_eq!(meta.version, "1.10");

        let yml = "{\"name\": Demo,\n \"version\": 2.0, api-version: 1.20}\n";
        let meta = paper_yaml("plugin.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.version, "2.0");
        assert!(meta.platform_versions.contains("1.20"));
    }

    #[test]
    fn nested_keys_do_not_shadow_the_top_level_number() {
        let yml = "dependencies:\n  - name: 5.0\nname: 5.00\nversion: 1\n";
        let meta = paper_yaml("paper-plugin.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.name, "5.00");
        assert_eq!(meta.dependencies.iter().next().unwrap().name, "5");
    }

    #[test]
    fn velocity_json_numbers_keep_their_source_text() {
        let meta = velocity_json(
            "velocity-plugin.json",
            br#"{"id":"demo","version":1.10}"#,
            &rule(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(meta.version, "1.10");

        let json = br#"{"id": 7, "name": "", "version": 2, "authors": ["a", 3.0]}"#;
        let meta = velocity_json("velocity-plugin.json", json, &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.name, "7");
        assert_eq!(meta.version, "2");
        assert_eq!(meta.authors, vec!["a", "3.0"]);

        let err = velocity_json("velocity-plugin.json", br#"{"id":"d","version":[1]}"#, &rule())
            .unwrap_err();
        assert_eq!(err.code(), "meta.descriptor_malformed");
    }

    #[test]
    fn paper_plugin_dependency_layouts() {
        let sections = r#"
name: Demo
version: "1.0"
dependencies:
  server:
    Vault:
      load: BEFORE
      required: true
    LuckPerms:
      required: false
    PlaceholderAPI:
"#;
        let meta = paper_yaml("paper-plugin.yml", sections.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        let required: Vec<&str> = meta.required_dependencies().map(|d| d.name.as_str()).collect();
        assert_eq!(required, vec!["PlaceholderAPI", "Vault"]);
        assert_eq!(meta.dependencies.len(), 3);

        let listed = r#"
name: Demo
version: "1.0"
dependencies:
  - name: Vault
    required: true
  - name: LuckPerms
    required: false
"#;
        let meta = paper_yaml("paper-plugin.yml", listed.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.dependencies.len(), 2);
        assert_eq!(meta.required_dependencies().count(), 1);
    }

    #[test]
    fn three_dependencies_one_required() {
        let yml = "name: Demo\nversion: '1'\ndepend: [Core]\nsoftdepend: [A, B]\n";
        let meta = paper_yaml("plugin.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.dependencies.len(), 3);
        assert_eq!(meta.required_dependencies().count(), 1);
    }

    #[test]
    fn required_wins_over_same_named_soft_dependency() {
        let yml = "name: Demo\nversion: '1'\ndepend: [Core]\nsoftdepend: [Core]\n";
        let meta = paper_yaml("plugin.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.dependencies.len(), 1);
        assert!(meta.dependencies.iter().next().unwrap().required);
    }

    #[test]
    fn missing_version_is_incomplete() {
        let err = paper_yaml("plugin.yml", b"name: Demo\n", &rule()).unwrap_err();
        assert!(matches!(
            err,
            MetaError::Incomplete {
                platform: Some(Platform::Paper),
                field: "version"
            }
        ));
    }

    #[test]
    fn empty_descriptor_is_absent() {
        assert!(paper_yaml("plugin.yml", b"", &rule()).unwrap().is_none());
        assert!(paper_yaml("plugin.yml", b"# nothing\n", &rule()).unwrap().is_none());
        assert!(velocity_json("velocity-plugin.json", b"  ", &rule()).unwrap().is_none());
    }

    #[test]
    fn wrong_shapes_are_malformed() {
        let err = paper_yaml("plugin.yml", b"- just\n- a list\n", &rule()).unwrap_err();
        assert_eq!(err.code(), "meta.descriptor_malformed");

        let err = paper_yaml("plugin.yml", b"name: [1, 2]\nversion: 1\n", &rule()).unwrap_err();
        assert_eq!(err.code(), "meta.descriptor_malformed");

        let err = velocity_json("velocity-plugin.json", b"{\"id\": ", &rule()).unwrap_err();
        assert_eq!(err.code(), "meta.descriptor_malformed");
    }

    #[test]
    fn version_grammar_is_enforced() {
        let err = paper_yaml("plugin.yml", b"name: Demo\nversion: 1.0 beta\n", &rule()).unwrap_err();
        assert!(matches!(err, MetaError::InvalidVersion { .. }));
    }

    #[test]
    fn bungee_required_and_soft() {
        let yml = r#"
name: Maintenance
version: 3.0.5
main: eu.kennytv.maintenance.bungee.MaintenanceBungeePlugin
author: KennyTV
depends: [SomePlugin]
softDepends: [ServerListPlus]
"#;
        let meta = bungee_yaml("bungee.yml", yml.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.platform, Platform::Waterfall);
        assert_eq!(meta.authors, vec!["KennyTV"]);
        let deps: Vec<(&str, bool)> = meta
            .dependencies
            .iter()
            .map(|d| (d.name.as_str(), d.required))
            .collect();
        assert_eq!(deps, vec![("ServerListPlus", false), ("SomePlugin", true)]);
    }

    #[test]
    fn velocity_json_name_falls_back_to_id() {
        let json = r#"{
  "id": "maintenance",
  "version": "3.0.5",
  "authors": ["KennyTV"],
  "dependencies": [{"id": "serverlistplus", "optional": true}],
  "main": "eu.kennytv.maintenance.velocity.MaintenanceVelocityPlugin"
}"#;
        let meta = velocity_json("velocity-plugin.json", json.as_bytes(), &rule())
            .unwrap()
            .unwrap();
        assert_eq!(meta.name, "maintenance");
        let dep = meta.dependencies.iter().next().unwrap();
        assert_eq!(dep.name, "serverlistplus");
        assert!(!dep.required);
    }

    #[test]
    fn velocity_annotation_reads_arguments() {
        let annotation = Annotation {
            type_descriptor: "Lcom/velocitypowered/api/plugin/Plugin;".into(),
            visible: false,
            elements: vec![
                ("id".into(), AnnotationValue::Literal(Literal::String("maintenance".into()))),
                ("name".into(), AnnotationValue::Literal(Literal::String("Maintenance".into()))),
                ("version".into(), AnnotationValue::Literal(Literal::String("3.0.5".into()))),
                ("authors".into(), AnnotationValue::Literal(Literal::String("KennyTV".into()))),
                (
                    "dependencies".into(),
                    AnnotationValue::Array(vec![AnnotationValue::Annotation(Annotation {
                        type_descriptor: "Lcom/velocitypowered/api/plugin/Dependency;".into(),
                        visible: false,
                        elements: vec![
                            ("id".into(), AnnotationValue::Literal(Literal::String("serverlistplus".into()))),
                            ("optional".into(), AnnotationValue::Literal(Literal::Bool(true))),
                        ],
                    })]),
                ),
            ],
        };

        let meta = velocity_annotation("eu/kennytv/Main", &annotation, &rule()).unwrap();
        assert_eq!(meta.name, "Maintenance");
        assert_eq!(meta.authors, vec!["KennyTV"]);
        assert_eq!(meta.entry_point.as_deref(), Some("eu.kennytv.Main"));
        assert_eq!(meta.dependencies.len(), 1);
        assert_eq!(meta.source, "eu/kennytv/Main");
    }

    #[test]
    fn velocity_annotation_without_version_is_incomplete() {
        let annotation = Annotation {
            type_descriptor: "Lcom/velocitypowered/api/plugin/Plugin;".into(),
            visible: false,
            elements: vec![("id".into(), AnnotationValue::Literal(Literal::String("demo".into())))],
        };
        let err = velocity_annotation("a/B", &annotation, &rule()).unwrap_err();
        assert!(matches!(
            err,
            MetaError::Incomplete {
                platform: Some(Platform::Velocity),
                field: "version"
            }
        ));
    }
}
