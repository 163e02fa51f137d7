//! Documentation synthesis.
//!
//! Turns one file's entity tree, patterns and dependencies into markdown
//! [`Artifact`]s. Synthesis is a pure function of its input: identical input
//! yields byte-identical rendered artifacts, which lets the sync engine
//! compare content digests instead of rewriting blindly.
//!
//! # Artifact identifiers
//!
//! | Id                      | Produced for                                |
//! |-------------------------|---------------------------------------------|
//! | `{path}#file-level`     | every file                                  |
//! | `{path}#{Entity}`       | top-level classes/functions, per-entity mode|
//! | `{path}#dependencies`   | recognized dependency manifests             |
//! | `@tree#{document}`      | whole-tree runs: overview, architecture,    |
//! |                         | patterns, dependency summary                |
//!
//! Duplicate entity names in one file are suffixed `~2`, `~3` in source order.

mod links;
mod markdown;
mod tree;

pub use links::{PendingLink, ReferenceIndex};
pub use markdown::{DirectoryRole, FileMetrics};
pub use tree::{
    synthesize_tree, TreeFile, ARCHITECTURE_KEY, DEPENDENCY_SUMMARY_KEY, OVERVIEW_KEY, PATTERNS_KEY, TREE_SOURCE,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::analysis::{module_name, CodeEntity, EntityKind};
use crate::deps::ManifestAnalysis;
use crate::error::StoreError;
use crate::lang::Language;
use crate::patterns::Pattern;

/// Key of the artifact every file produces.
pub const FILE_LEVEL_KEY: &str = "file-level";
/// Key of the artifact listing a manifest's dependencies.
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// How many artifacts a source file produces. Declared once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// One artifact per file.
    #[default]
    PerFile,
    /// A file overview plus one artifact per top-level class or function.
    PerEntity,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::PerFile => write!(f, "per-file"),
            Granularity::PerEntity => write!(f, "per-entity"),
        }
    }
}

/// A generated documentation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// `{source}#{key}`, stable across runs for the same input.
    pub id: String,
    pub title: String,
    pub body: String,
    pub tags: BTreeSet<String>,
    /// Names this artifact links to, rendered as `[[name]]`.
    pub cross_references: BTreeSet<String>,
    /// Relative path of the source file.
    pub source: String,
}

/// Front matter written ahead of the body.
#[derive(Debug, Serialize, Deserialize)]
pub struct FrontMatter {
    pub id: String,
    pub title: String,
    pub source: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cross_references: Vec<String>,
}

impl Artifact {
    /// The part of the id after `#`.
    pub fn key(&self) -> &str {
        split_id(&self.id).map(|(_, key)| key).unwrap_or(&self.id)
    }

    /// YAML front matter followed by the markdown body.
    pub fn render(&self) -> Result<String, StoreError> {
        let front = FrontMatter {
            id: self.id.clone(),
            title: self.title.clone(),
            source: self.source.clone(),
            tags: self.tags.iter().cloned().collect(),
            cross_references: self.cross_references.iter().cloned().collect(),
        };
        let yaml = serde_yaml::to_string(&front)?;
        Ok(format!("---\n{}---\n\n{}", yaml, self.body))
    }

    /// SHA-256 of the rendered content, lowercase hex.
    pub fn digest(&self) -> Result<String, StoreError> {
        let rendered = self.render()?;
        Ok(hex::encode(Sha256::digest(rendered.as_bytes())))
    }
}

/// Split an artifact id into source path and key.
pub fn split_id(id: &str) -> Option<(&str, &str)> {
    let (source, key) = id.rsplit_once('#')?;
    (!source.is_empty() && !key.is_empty()).then_some((source, key))
}

pub fn artifact_id(source: &str, key: &str) -> String {
    format!("{}#{}", source, key)
}

/// Parse rendered artifact content back into front matter and body.
pub fn parse_rendered(content: &str) -> Option<(FrontMatter, &str)> {
    let rest = content.strip_prefix("---\n")?;
    let end = rest.find("\n---\n")?;
    let front: FrontMatter = serde_yaml::from_str(&rest[..end + 1]).ok()?;
    let body = rest[end + 5..].strip_prefix('\n').unwrap_or(&rest[end + 5..]);
    Some((front, body))
}

/// Everything known about one file after analysis.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub path: &'a str,
    pub language: Language,
    pub size: u64,
    pub text: &'a str,
    pub module: &'a CodeEntity,
    /// Single-file patterns.
    pub patterns: &'a [Pattern],
    pub manifest: Option<&'a ManifestAnalysis>,
    /// Why extraction was incomplete, if it was.
    pub degraded: Option<&'a str>,
}

impl SynthesisInput<'_> {
    /// Names defined by this file that other artifacts may link to: the
    /// module stem, top-level class and function names, and declared
    /// dependency names.
    pub fn provides(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .module
            .children
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::Class | EntityKind::Function))
            .map(|e| e.name.clone())
            .collect();
        if self.language.is_code() {
            names.insert(module_name(self.path));
        }
        if let Some(manifest) = self.manifest {
            names.extend(manifest.dependencies.iter().map(|d| d.name.clone()));
        }
        names
    }

    /// Names this file links to: imported module roots and leaves plus base
    /// classes, minus names the file defines itself.
    pub fn cross_references(&self) -> BTreeSet<String> {
        let defined = self.provides();
        let mut names = BTreeSet::new();
        for import in self.module.imports() {
            names.extend(import_names(&import.name));
        }
        for class in self.module.all_classes() {
            names.extend(class.bases.iter().map(|b| base_name(b).to_string()));
        }
        names.retain(|n| !n.is_empty() && !defined.contains(n));
        names
    }

    fn common_tags(&self) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        tags.insert(format!("source:{}", self.path));
        tags.insert(format!("language:{}", self.language));
        tags.insert(format!("role:{}", DirectoryRole::of(self.path)));
        if self.language.is_code() {
            tags.insert("code".to_string());
        }
        if self.degraded.is_some() {
            tags.insert("degraded".to_string());
        }
        tags
    }
}

/// Module root and leaf of an import path, skipping relative markers.
fn import_names(import: &str) -> Vec<String> {
    let segments: Vec<&str> = import
        .split(|c: char| matches!(c, '.' | '/' | ':' | '\\'))
        .filter(|s| !s.is_empty() && *s != "*")
        .collect();
    let relative = import.starts_with('.');
    let mut names = Vec::new();
    if let Some(leaf) = segments.last() {
        names.push(leaf.to_string());
    }
    if !relative && segments.len() > 1 {
        names.push(segments[0].to_string());
    }
    names
}

/// Bare class name from a base expression such as `abc.ABC` or `List[int]`.
fn base_name(base: &str) -> &str {
    let base = base.split(['[', '(', '<']).next().unwrap_or(base);
    base.rsplit(['.', ':']).next().unwrap_or(base).trim()
}

/// Produce the artifacts for one file.
pub fn synthesize(input: &SynthesisInput<'_>, granularity: Granularity) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    let tags = input.common_tags();

    if input.language == Language::Unknown && input.module.children.is_empty() {
        artifacts.push(Artifact {
            id: artifact_id(input.path, FILE_LEVEL_KEY),
            title: input.path.to_string(),
            body: markdown::presence_body(input),
            tags,
            cross_references: BTreeSet::new(),
            source: input.path.to_string(),
        });
        return with_manifest(input, artifacts);
    }

    let cross_references = input.cross_references();
    let entity_keys = match granularity {
        Granularity::PerFile => Vec::new(),
        Granularity::PerEntity => entity_keys(input.module),
    };

    artifacts.push(Artifact {
        id: artifact_id(input.path, FILE_LEVEL_KEY),
        title: input.path.to_string(),
        body: markdown::file_body(input, &cross_references, &entity_keys),
        tags: tags.clone(),
        cross_references: cross_references.clone(),
        source: input.path.to_string(),
    });

    for (key, entity) in &entity_keys {
        let refs: BTreeSet<String> = entity
            .bases
            .iter()
            .map(|b| base_name(b).to_string())
            .filter(|b| cross_references.contains(b))
            .collect();
        let mut entity_tags = tags.clone();
        entity_tags.insert(format!("entity:{}", entity.kind));
        artifacts.push(Artifact {
            id: artifact_id(input.path, key),
            title: format!("{} {} ({})", entity.kind, entity.name, input.path),
            body: markdown::entity_body(input, entity, &refs),
            tags: entity_tags,
            cross_references: refs,
            source: input.path.to_string(),
        });
    }

    with_manifest(input, artifacts)
}

fn with_manifest(input: &SynthesisInput<'_>, mut artifacts: Vec<Artifact>) -> Vec<Artifact> {
    if let Some(manifest) = input.manifest {
        let mut tags = BTreeSet::new();
        tags.insert("dependencies".to_string());
        tags.insert(format!("ecosystem:{}", manifest.ecosystem));
        tags.insert(format!("source:{}", input.path));
        artifacts.push(Artifact {
            id: artifact_id(input.path, DEPENDENCIES_KEY),
            title: format!("Dependencies: {}", input.path),
            body: markdown::dependencies_body(input.path, manifest),
            tags,
            cross_references: BTreeSet::new(),
            source: input.path.to_string(),
        });
    }
    artifacts
}

/// Keys for top-level classes and functions, deduplicated in source order.
fn entity_keys(module: &CodeEntity) -> Vec<(String, &CodeEntity)> {
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    module
        .children
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Class | EntityKind::Function))
        .map(|e| {
            let count = seen.entry(e.name.as_str()).or_insert(0);
            *count += 1;
            let key = if *count == 1 {
                e.name.clone()
            } else {
                format!("{}~{}", e.name, count)
            };
            (key, e)
        })
        .collect()
}
