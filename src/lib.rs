//! Codescribe - codebase analysis and incremental documentation sync.
//!
//! Codescribe walks a source tree, extracts a structural model of every
//! file (classes, functions, imports, comment blocks), recognizes naming
//! conventions and design patterns, parses dependency manifests, and keeps
//! a store of markdown artifacts in step with the tree. Each run only
//! regenerates artifacts whose content actually changed.
//!
//! # Architecture
//!
//! - `lang`: language classification by extension and content
//! - `analysis`: entity extraction (tree-sitter for Python, heuristics for
//!   everything else)
//! - `patterns`: per-file and cross-file pattern recognition
//! - `deps`: manifest parsers for each package ecosystem
//! - `docs`: artifact synthesis, front matter and cross-reference links
//! - `sync`: fingerprinting, source trees, stores, state and the engine
//! - `config`: YAML configuration
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a Manifest Format
//!
//! See `src/deps/` for examples. Add a parser module, a variant to
//! `ManifestFormat`, and an entry in the `MANIFESTS` map.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod deps;
pub mod diagnostics;
pub mod docs;
pub mod error;
pub mod lang;
pub mod patterns;
pub mod report;
pub mod sync;

pub use analysis::{CodeEntity, EntityKind, Extraction, Extractor};
pub use config::SyncConfig;
pub use deps::{analyze_manifest, Dependency, Ecosystem, ManifestAnalysis};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use docs::{Artifact, Granularity, PendingLink};
pub use error::{StateError, StoreError, SyncError};
pub use lang::{classify, is_binary, Language};
pub use patterns::{Pattern, PatternKind};
pub use sync::{
    ArtifactStore, CancellationToken, FsArtifactStore, FsSourceTree, JsonStateFile, RunReport,
    SourceTree, StateStore, SyncEngine,
};
