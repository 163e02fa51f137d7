//! Dependency manifest analysis.
//!
//! Manifests are recognized by file name and parsed into a flat list of
//! [`Dependency`] values. Version constraints are kept exactly as declared;
//! nothing here resolves versions.
//!
//! # Architecture
//!
//! ```text
//! analyze_manifest(path, content)
//!     ├── npm        package.json, composer.json   (serde_json)
//!     ├── python     requirements*.txt, pyproject.toml, setup.cfg
//!     ├── cargo      Cargo.toml                    (toml)
//!     ├── golang     go.mod
//!     ├── ruby       Gemfile
//!     ├── maven      pom.xml
//!     └── recognized but unsupported: build.gradle, Pipfile, setup.py
//! ```
//!
//! A manifest that cannot be parsed yields no dependencies and an
//! `unsupported-manifest` diagnostic. It never fails the caller.

mod cargo;
mod golang;
mod maven;
mod npm;
mod python;
mod ruby;

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::diagnostics::{Diagnostic, DiagnosticKind};

/// Package ecosystem a manifest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Composer,
    PyPI,
    Crates,
    Go,
    RubyGems,
    Maven,
    Gradle,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Composer => "composer",
            Ecosystem::PyPI => "pypi",
            Ecosystem::Crates => "crates",
            Ecosystem::Go => "go",
            Ecosystem::RubyGems => "rubygems",
            Ecosystem::Maven => "maven",
            Ecosystem::Gradle => "gradle",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Version constraint as written in the manifest; `*` when absent.
    pub constraint: String,
    /// Path of the manifest that declared it.
    pub manifest: String,
    pub ecosystem: Ecosystem,
    /// Development-only (dev, test, build tooling) dependency.
    #[serde(default)]
    pub dev: bool,
}

/// Manifest formats recognized by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    PackageJson,
    ComposerJson,
    Requirements,
    Pyproject,
    SetupCfg,
    CargoToml,
    GoMod,
    Gemfile,
    PomXml,
    /// Known manifest name without a parser.
    Unsupported(Ecosystem),
}

impl ManifestFormat {
    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            ManifestFormat::PackageJson => Ecosystem::Npm,
            ManifestFormat::ComposerJson => Ecosystem::Composer,
            ManifestFormat::Requirements | ManifestFormat::Pyproject | ManifestFormat::SetupCfg => {
                Ecosystem::PyPI
            }
            ManifestFormat::CargoToml => Ecosystem::Crates,
            ManifestFormat::GoMod => Ecosystem::Go,
            ManifestFormat::Gemfile => Ecosystem::RubyGems,
            ManifestFormat::PomXml => Ecosystem::Maven,
            ManifestFormat::Unsupported(ecosystem) => *ecosystem,
        }
    }
}

static MANIFESTS: phf::Map<&'static str, ManifestFormat> = phf_map! {
    "package.json" => ManifestFormat::PackageJson,
    "composer.json" => ManifestFormat::ComposerJson,
    "pyproject.toml" => ManifestFormat::Pyproject,
    "setup.cfg" => ManifestFormat::SetupCfg,
    "Cargo.toml" => ManifestFormat::CargoToml,
    "go.mod" => ManifestFormat::GoMod,
    "Gemfile" => ManifestFormat::Gemfile,
    "pom.xml" => ManifestFormat::PomXml,
    "build.gradle" => ManifestFormat::Unsupported(Ecosystem::Gradle),
    "build.gradle.kts" => ManifestFormat::Unsupported(Ecosystem::Gradle),
    "Pipfile" => ManifestFormat::Unsupported(Ecosystem::PyPI),
    "setup.py" => ManifestFormat::Unsupported(Ecosystem::PyPI),
};

/// Recognize a manifest from its relative path.
pub fn manifest_format(path: &str) -> Option<ManifestFormat> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if let Some(format) = MANIFESTS.get(file_name) {
        return Some(*format);
    }
    if file_name.starts_with("requirements") && file_name.ends_with(".txt") {
        return Some(ManifestFormat::Requirements);
    }
    None
}

/// Errors from an individual manifest parser.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Malformed(String),
}

/// Dependencies found in one manifest, with a diagnostic when the manifest
/// could not be fully understood.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestAnalysis {
    pub ecosystem: Ecosystem,
    pub dependencies: Vec<Dependency>,
    pub diagnostic: Option<Diagnostic>,
}

/// Analyze `content` if `path` names a known manifest; `None` otherwise.
pub fn analyze_manifest(path: &str, content: &str) -> Option<ManifestAnalysis> {
    let format = manifest_format(path)?;
    let ecosystem = format.ecosystem();

    let parsed = match format {
        ManifestFormat::PackageJson => npm::parse_package_json(path, content),
        ManifestFormat::ComposerJson => npm::parse_composer_json(path, content),
        ManifestFormat::Requirements => Ok(python::parse_requirements(path, content)),
        ManifestFormat::Pyproject => python::parse_pyproject(path, content),
        ManifestFormat::SetupCfg => Ok(python::parse_setup_cfg(path, content)),
        ManifestFormat::CargoToml => cargo::parse_cargo_toml(path, content),
        ManifestFormat::GoMod => golang::parse_go_mod(path, content),
        ManifestFormat::Gemfile => Ok(ruby::parse_gemfile(path, content)),
        ManifestFormat::PomXml => Ok(maven::parse_pom(path, content)),
        ManifestFormat::Unsupported(_) => {
            return Some(ManifestAnalysis {
                ecosystem,
                dependencies: Vec::new(),
                diagnostic: Some(Diagnostic::new(
                    path,
                    DiagnosticKind::UnsupportedManifest,
                    format!("{} manifests are recognized but not parsed", ecosystem),
                )),
            });
        }
    };

    Some(match parsed {
        Ok(dependencies) => ManifestAnalysis {
            ecosystem,
            dependencies,
            diagnostic: None,
        },
        Err(e) => ManifestAnalysis {
            ecosystem,
            dependencies: Vec::new(),
            diagnostic: Some(Diagnostic::new(
                path,
                DiagnosticKind::UnsupportedManifest,
                format!("could not parse manifest: {}", e),
            )),
        },
    })
}

/// Common utility functions for manifest parsing.
pub(crate) mod utils {
    use super::{Dependency, Ecosystem};

    /// Constraint recorded when a manifest declares none.
    pub const ANY_VERSION: &str = "*";

    /// Extract package name from a requirement string.
    ///
    /// - `pyswitchbot==0.40.0` → `pyswitchbot`
    /// - `aiohttp>=3.0,<4` → `aiohttp`
    /// - `package[extra]>=1.0` → `package`
    pub fn extract_package_name(req: &str) -> &str {
        req.split(|c: char| {
            matches!(c, '=' | '>' | '<' | '~' | '!' | '[' | ';' | '@' | '(') || c.is_whitespace()
        })
        .next()
        .unwrap_or("")
        .trim()
    }

    /// Split a PEP 508 requirement into name and verbatim constraint.
    pub fn split_requirement(req: &str) -> Option<(String, String)> {
        let req = req.trim();
        let name = extract_package_name(req);
        if name.is_empty() {
            return None;
        }
        let mut rest = req[name.len()..].trim_start();
        if rest.starts_with('[') {
            rest = rest.find(']').map(|i| rest[i + 1..].trim_start()).unwrap_or("");
        }
        let constraint = if rest.is_empty() { ANY_VERSION } else { rest };
        Some((name.to_string(), constraint.to_string()))
    }

    pub fn dependency(
        name: impl Into<String>,
        constraint: impl Into<String>,
        manifest: &str,
        ecosystem: Ecosystem,
        dev: bool,
    ) -> Dependency {
        let constraint = constraint.into();
        Dependency {
            name: name.into(),
            constraint: if constraint.trim().is_empty() {
                ANY_VERSION.to_string()
            } else {
                constraint
            },
            manifest: manifest.to_string(),
            ecosystem,
            dev,
        }
    }

    /// Whether a dependency group name denotes development tooling.
    pub fn is_dev_group(name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        ["dev", "test", "lint", "doc", "typing", "check"]
            .iter()
            .any(|marker| name.contains(marker))
    }

}
