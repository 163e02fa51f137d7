//! Sync configuration.
//!
//! A `codescribe.yaml` at the scan root configures ignores, limits,
//! granularity and pattern thresholds. Every field has a default, so an
//! empty file (or no file) is a valid configuration.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::docs::Granularity;
use crate::patterns::PatternThresholds;

/// Config file names searched for in the scan root, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["codescribe.yaml", ".codescribe.yaml", "codescribe.yml"];

/// Directory under the scan root holding the default store and state.
pub const DATA_DIR: &str = ".codescribe";

/// Directory and file names never scanned unless `use_default_ignores` is off.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "node_modules",
    ".pytest_cache",
    ".mypy_cache",
    "dist",
    "build",
    ".next",
    ".cache",
    "target",
    DATA_DIR,
];

/// Largest file analyzed, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Configuration for one sync run. Passed explicitly to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Extra ignore globs, matched against `/`-separated relative paths.
    /// A bare name such as `fixtures` matches that name at any depth.
    pub ignore: Vec<String>,
    /// Apply [`DEFAULT_IGNORES`] in addition to `ignore`.
    pub use_default_ignores: bool,
    /// Files larger than this are skipped with an `oversized` diagnostic.
    pub max_file_size: u64,
    /// Extraction worker threads.
    pub concurrency: usize,
    pub granularity: Granularity,
    /// Re-extract unchanged files so cross-file patterns see the whole tree.
    pub full_analysis: bool,
    /// Write `@tree` overview, architecture, pattern and dependency
    /// documents on runs that analyze every file.
    pub tree_documents: bool,
    /// Artifact store directory, relative to the scan root.
    pub store: Option<PathBuf>,
    /// State file, relative to the scan root.
    pub state: Option<PathBuf>,
    pub patterns: PatternThresholds,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            use_default_ignores: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            concurrency: default_concurrency(),
            granularity: Granularity::default(),
            full_analysis: false,
            tree_documents: true,
            store: None,
            state: None,
            patterns: PatternThresholds::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl SyncConfig {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SyncConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Find a config file in `root`.
    pub fn discover(root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// Load the config discovered in `root`, or defaults when there is none.
    pub fn load_or_default(root: &Path) -> anyhow::Result<(Self, Option<PathBuf>)> {
        match Self::discover(root) {
            Some(path) => Ok((Self::parse_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// All ignore patterns in effect, defaults first.
    pub fn ignore_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = Vec::new();
        if self.use_default_ignores {
            patterns.extend(DEFAULT_IGNORES.iter().map(|s| s.to_string()));
        }
        patterns.extend(self.ignore.iter().cloned());
        patterns
    }

    /// Compile the ignore patterns. Bare names match at any depth.
    pub fn ignore_set(&self) -> Result<GlobSet, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in self.ignore_patterns() {
            builder.add(Glob::new(&expand_bare_name(&pattern))?);
        }
        builder.build()
    }

    pub fn store_dir(&self, root: &Path) -> PathBuf {
        root.join(self.store.clone().unwrap_or_else(|| Path::new(DATA_DIR).join("artifacts")))
    }

    pub fn state_file(&self, root: &Path) -> PathBuf {
        root.join(self.state.clone().unwrap_or_else(|| Path::new(DATA_DIR).join("state.json")))
    }
}

fn expand_bare_name(pattern: &str) -> String {
    let pattern = pattern.trim_end_matches('/');
    if pattern.contains('/') || pattern.contains("**") {
        pattern.to_string()
    } else {
        format!("**/{}", pattern)
    }
}

/// Validate a config for correctness.
pub fn validate(config: &SyncConfig) -> anyhow::Result<()> {
    if config.concurrency == 0 {
        anyhow::bail!("concurrency must be at least 1");
    }
    if config.max_file_size == 0 {
        anyhow::bail!("max_file_size must be greater than 0");
    }

    // Validate ignore glob patterns compile
    for pattern in &config.ignore {
        Glob::new(&expand_bare_name(pattern))
            .map_err(|e| anyhow::anyhow!("invalid ignore pattern {:?}: {}", pattern, e))?;
    }

    let t = &config.patterns;
    if t.max_module_entities == 0 || t.max_class_methods == 0 || t.max_function_lines == 0 {
        anyhow::bail!("pattern limits must be greater than 0");
    }

    Ok(())
}
