//! The synchronization run.
//!
//! ```text
//! enumerate ──▶ read + fingerprint ──▶ partition ──▶ analyze (parallel)
//!                    (parallel)       new/changed/        │
//!                                     unchanged/removed   ▼
//!  save state ◀── apply (exclusive) ◀──────────── diff by digest
//! ```
//!
//! Planning never writes. Applying writes every operation in order and
//! saves state only after the last one succeeds, so a failed or cancelled
//! run leaves the previous state in place and the next run retries.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::analyze::{analyze_file, FileAnalysis};
use super::fingerprint::fingerprint;
use super::source::{Enumeration, SourceTree};
use super::state::{StateStore, SyncRecord, SyncState};
use super::store::ArtifactStore;
use crate::config::{self, SyncConfig};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::docs::{synthesize_tree, Artifact, PendingLink, ReferenceIndex, TreeFile, TREE_SOURCE};
use crate::error::SyncError;
use crate::lang::{classify, Language};
use crate::patterns::{recognize_tree, FileView, Pattern};

/// Shared flag that stops a run between file units.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Immutable snapshot of one scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: String,
    pub language: Language,
    pub fingerprint: String,
    pub size: u64,
    /// Unix seconds when the file was read.
    pub last_seen: u64,
}

/// Store operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// A planned store write.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub id: String,
    pub source: String,
    /// Content to write; `None` for deletes.
    pub artifact: Option<Artifact>,
}

impl Operation {
    pub fn record(&self) -> OperationRecord {
        OperationRecord {
            kind: self.kind,
            id: self.id.clone(),
            source: self.source.clone(),
        }
    }
}

/// An operation as reported, without content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub id: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub files_scanned: usize,
    pub analyzed: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub skipped: usize,
    pub degraded: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub root: String,
    pub dry_run: bool,
    /// Whether cross-file patterns covered every file in the tree.
    pub whole_tree: bool,
    pub counts: RunCounts,
    pub operations: Vec<OperationRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub patterns: Vec<Pattern>,
    pub pending_links: Vec<PendingLink>,
}

impl RunReport {
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

/// Everything a run would do, computed without writing.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub files: Vec<SourceFile>,
    pub operations: Vec<Operation>,
    pub next_state: SyncState,
    pub report: RunReport,
}

/// Result of reading one enumerated file.
enum Scanned {
    Skipped(Diagnostic),
    Unchanged(SourceFile),
    Pending(SourceFile, Vec<u8>),
}

/// Orchestrates runs for one configuration.
pub struct SyncEngine {
    config: SyncConfig,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        config::validate(&config).map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn check_cancelled(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run a sync: plan, apply every operation, then persist state.
    pub fn run(
        &self,
        source: &dyn SourceTree,
        store: &mut dyn ArtifactStore,
        state_store: &mut dyn StateStore,
    ) -> Result<RunReport, SyncError> {
        let previous = state_store.load_all()?;
        let plan = self.plan(source, &*store, &previous)?;
        self.check_cancelled()?;

        for op in &plan.operations {
            let result = match (&op.kind, &op.artifact) {
                (OperationKind::Delete, _) => store.delete(&op.id),
                (_, Some(artifact)) => store.put(artifact),
                (_, None) => Ok(()),
            };
            result.map_err(|source| SyncError::Store {
                operation: match op.kind {
                    OperationKind::Delete => "delete",
                    _ => "write",
                },
                artifact: op.id.clone(),
                source,
            })?;
        }

        state_store.save_all(&plan.next_state)?;

        let report = plan.report;
        tracing::info!(
            root = %report.root,
            files = report.counts.files_scanned,
            created = report.counts.created,
            updated = report.counts.updated,
            deleted = report.counts.deleted,
            diagnostics = report.diagnostics.len(),
            "sync complete"
        );
        Ok(report)
    }

    /// Compute the plan and report without touching the store or state.
    pub fn dry_run(
        &self,
        source: &dyn SourceTree,
        store: &dyn ArtifactStore,
        state_store: &dyn StateStore,
    ) -> Result<RunReport, SyncError> {
        let previous = state_store.load_all()?;
        let mut plan = self.plan(source, store, &previous)?;
        plan.report.dry_run = true;
        Ok(plan.report)
    }

    /// Plan a run against `previous` state. Only reads the source tree and
    /// lists the store.
    pub fn plan(
        &self,
        source: &dyn SourceTree,
        store: &dyn ArtifactStore,
        previous: &SyncState,
    ) -> Result<SyncPlan, SyncError> {
        self.check_cancelled()?;
        let root = source.root().to_path_buf();
        let enumeration = source.enumerate().map_err(|e| SyncError::ScanRoot {
            path: root.clone(),
            source: e,
        })?;
        tracing::debug!(files = enumeration.files.len(), "enumerated source tree");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency)
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        // Read and fingerprint every file.
        let scanned: Vec<Scanned> = pool.install(|| {
            enumeration
                .files
                .par_iter()
                .map(|path| self.scan(source, path, previous.records.get(path)))
                .collect::<Result<Vec<_>, _>>()
        })?;

        let mut files = Vec::new();
        let mut diagnostics = Vec::new();
        let mut pending = Vec::new();
        let mut unchanged = Vec::new();
        for item in scanned {
            match item {
                Scanned::Skipped(diagnostic) => diagnostics.push(diagnostic),
                Scanned::Unchanged(file) => {
                    unchanged.push(file.path.clone());
                    files.push(file);
                }
                Scanned::Pending(file, content) => {
                    files.push(file.clone());
                    pending.push((file, content));
                }
            }
        }

        // Extract changed and new files. Workers see only path, content and
        // the read-only config.
        let config = &self.config;
        let analyses: Vec<FileAnalysis> = pool.install(|| {
            pending
                .into_par_iter()
                .map(|(file, content)| {
                    if self.cancel.is_cancelled() {
                        return Err(SyncError::Cancelled);
                    }
                    analyze_file(&file.path, &content, file.fingerprint, config).map_err(|source| {
                        SyncError::Plan {
                            operation: "render",
                            artifact: file.path.clone(),
                            source,
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        self.check_cancelled()?;

        let mut next_state = SyncState::default();
        let mut operations = Vec::new();
        let mut counts = RunCounts {
            files_scanned: enumeration.files.len(),
            analyzed: analyses.len(),
            unchanged: unchanged.len(),
            skipped: diagnostics.len(),
            ..RunCounts::default()
        };

        // Skipped and unchanged files keep their records. Stored artifacts
        // the record does not know about were written by a run that never
        // saved its state.
        let kept = diagnostics.iter().map(|d| &d.path).chain(unchanged.iter());
        for path in kept {
            let record = previous.records.get(path);
            operations.extend(self.strays(store, path, record)?);
            if let Some(record) = record {
                next_state.records.insert(path.clone(), record.clone());
            }
        }

        for analysis in &analyses {
            let prior = self.prior_artifacts(store, &analysis.path, previous.records.get(&analysis.path))?;
            operations.extend(diff_artifacts(&analysis.path, &analysis.artifacts, &prior));
            diagnostics.extend(analysis.diagnostics.iter().cloned());
            if analysis.is_degraded() {
                counts.degraded += 1;
            }
            next_state.records.insert(analysis.path.clone(), record_for(analysis));
        }

        // Files that disappeared take their artifacts with them, unless the
        // directory holding them could not be walked this run.
        let present: BTreeSet<&str> = enumeration.files.iter().map(String::as_str).collect();
        for (path, record) in &previous.records {
            if path == TREE_SOURCE || present.contains(path.as_str()) {
                continue;
            }
            if enumeration.is_shadowed(path) {
                next_state.records.insert(path.clone(), record.clone());
                continue;
            }
            counts.removed += 1;
            let prior = self.prior_artifacts(store, path, Some(record))?;
            operations.extend(diff_artifacts(path, &[], &prior));
        }

        // Sources nobody tracks: a file that was new in a failed run and is
        // gone now.
        let stored = store.sources().map_err(|source| SyncError::Plan {
            operation: "list",
            artifact: "store".to_string(),
            source,
        })?;
        for path in &stored {
            if path == TREE_SOURCE
                || previous.records.contains_key(path)
                || present.contains(path.as_str())
                || enumeration.is_shadowed(path)
            {
                continue;
            }
            operations.extend(self.strays(store, path, None)?);
        }
        diagnostics.extend(shadow_diagnostics(&enumeration));

        // Cross-file checks need every file's entities in memory.
        let whole_tree = unchanged.is_empty();
        let patterns = if whole_tree {
            let views: Vec<FileView<'_>> = analyses
                .iter()
                .map(|a| FileView {
                    language: a.language,
                    module: &a.module,
                })
                .collect();
            recognize_tree(&views, &self.config.patterns)
        } else {
            Vec::new()
        };

        let tree_record = previous.records.get(TREE_SOURCE);
        match self.tree_artifacts(whole_tree, &files, &analyses, &patterns, enumeration.files.is_empty())? {
            Some(produced) => {
                let prior = self.prior_artifacts(store, TREE_SOURCE, tree_record)?;
                operations.extend(diff_artifacts(TREE_SOURCE, &produced, &prior));
                if !produced.is_empty() {
                    next_state
                        .records
                        .insert(TREE_SOURCE.to_string(), tree_record_for(&files, &produced));
                }
            }
            None => {
                operations.extend(self.strays(store, TREE_SOURCE, tree_record)?);
                if let Some(record) = tree_record {
                    next_state.records.insert(TREE_SOURCE.to_string(), record.clone());
                }
            }
        }

        operations.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(a.kind.cmp(&b.kind))
                .then_with(|| a.id.cmp(&b.id))
        });
        for op in &operations {
            match op.kind {
                OperationKind::Create => counts.created += 1,
                OperationKind::Update => counts.updated += 1,
                OperationKind::Delete => counts.deleted += 1,
            }
        }

        let index = ReferenceIndex::build(
            next_state
                .records
                .iter()
                .map(|(path, record)| (path.as_str(), &record.provides)),
        );
        let pending_links = index.pending(
            next_state
                .records
                .iter()
                .map(|(path, record)| (path.as_str(), &record.links)),
        );

        diagnostics.sort();
        for diagnostic in &diagnostics {
            tracing::warn!(path = %diagnostic.path, kind = %diagnostic.kind, "{}", diagnostic.message);
        }

        let report = RunReport {
            root: root.display().to_string(),
            dry_run: false,
            whole_tree,
            counts,
            operations: operations.iter().map(Operation::record).collect(),
            diagnostics,
            patterns,
            pending_links,
        };

        Ok(SyncPlan {
            files,
            operations,
            next_state,
            report,
        })
    }

    /// Tree-level artifacts with their digests, or `None` when the previous
    /// ones should stay. An empty list removes them.
    fn tree_artifacts(
        &self,
        whole_tree: bool,
        files: &[SourceFile],
        analyses: &[FileAnalysis],
        patterns: &[Pattern],
        tree_is_empty: bool,
    ) -> Result<Option<Vec<(Artifact, String)>>, SyncError> {
        if !self.config.tree_documents || tree_is_empty {
            return Ok(Some(Vec::new()));
        }
        if !whole_tree || analyses.is_empty() {
            return Ok(None);
        }
        let by_path: BTreeMap<&str, &FileAnalysis> = analyses.iter().map(|a| (a.path.as_str(), a)).collect();
        let views: Vec<TreeFile<'_>> = files
            .iter()
            .filter_map(|file| {
                let analysis = by_path.get(file.path.as_str())?;
                Some(TreeFile {
                    path: &file.path,
                    language: file.language,
                    size: file.size,
                    module: &analysis.module,
                    patterns: &analysis.patterns,
                    manifest: analysis.manifest.as_ref(),
                    degraded: analysis.is_degraded(),
                })
            })
            .collect();

        synthesize_tree(&views, patterns, self.config.patterns.min_occurrences)
            .into_iter()
            .map(|artifact| {
                let digest = artifact.digest().map_err(|source| SyncError::Plan {
                    operation: "render",
                    artifact: artifact.id.clone(),
                    source,
                })?;
                Ok((artifact, digest))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// Read one file and decide whether it needs analysis.
    fn scan(
        &self,
        source: &dyn SourceTree,
        path: &str,
        record: Option<&SyncRecord>,
    ) -> Result<Scanned, SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let size = match source.size(path) {
            Ok(size) => size,
            Err(e) => return Ok(Scanned::Skipped(unreadable(path, &e))),
        };
        if size > self.config.max_file_size {
            return Ok(Scanned::Skipped(Diagnostic::new(
                path,
                DiagnosticKind::Oversized,
                format!("{} bytes exceeds the {} byte limit", size, self.config.max_file_size),
            )));
        }
        let content = match source.read(path) {
            Ok(content) => content,
            Err(e) => return Ok(Scanned::Skipped(unreadable(path, &e))),
        };

        let file = SourceFile {
            path: path.to_string(),
            language: classify(path, &content),
            fingerprint: fingerprint(&content),
            size: content.len() as u64,
            last_seen: now_secs(),
        };

        let same = record.map(|r| r.fingerprint == file.fingerprint).unwrap_or(false);
        if same && !self.config.full_analysis {
            Ok(Scanned::Unchanged(file))
        } else {
            Ok(Scanned::Pending(file, content))
        }
    }

    /// Ids stored for `source`, as a planning step.
    fn listing(&self, store: &dyn ArtifactStore, source: &str) -> Result<Vec<String>, SyncError> {
        store.list(source).map_err(|e| SyncError::Plan {
            operation: "list",
            artifact: source.to_string(),
            source: e,
        })
    }

    /// Artifacts a source produced before this run, with their digests when
    /// known. Stored artifacts missing from the record come from a run that
    /// wrote to the store but never saved its state, so their digest is
    /// unknown.
    fn prior_artifacts(
        &self,
        store: &dyn ArtifactStore,
        path: &str,
        record: Option<&SyncRecord>,
    ) -> Result<BTreeMap<String, Option<String>>, SyncError> {
        let mut prior: BTreeMap<String, Option<String>> = record
            .map(|r| {
                r.artifacts
                    .iter()
                    .map(|(id, digest)| (id.clone(), Some(digest.clone())))
                    .collect()
            })
            .unwrap_or_default();
        let mut orphans = 0;
        for id in self.listing(store, path)? {
            prior.entry(id).or_insert_with(|| {
                orphans += 1;
                None
            });
        }
        if orphans > 0 {
            tracing::debug!(path, orphans, "recovering artifacts without a record");
        }
        Ok(prior)
    }

    /// Deletes for stored artifacts of `path` that `record` does not list.
    fn strays(
        &self,
        store: &dyn ArtifactStore,
        path: &str,
        record: Option<&SyncRecord>,
    ) -> Result<Vec<Operation>, SyncError> {
        let ops: Vec<Operation> = self
            .listing(store, path)?
            .into_iter()
            .filter(|id| record.map(|r| !r.artifacts.contains_key(id)).unwrap_or(true))
            .map(|id| Operation {
                kind: OperationKind::Delete,
                id,
                source: path.to_string(),
                artifact: None,
            })
            .collect();
        if !ops.is_empty() {
            tracing::debug!(path, strays = ops.len(), "removing artifacts without a record");
        }
        Ok(ops)
    }
}

/// Create, update and delete operations turning `prior` into `produced`.
/// An artifact whose digest matches is left alone.
fn diff_artifacts(
    path: &str,
    produced: &[(Artifact, String)],
    prior: &BTreeMap<String, Option<String>>,
) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut seen = BTreeSet::new();
    for (artifact, digest) in produced {
        seen.insert(artifact.id.as_str());
        let kind = match prior.get(&artifact.id) {
            Some(Some(previous)) if previous == digest => continue,
            Some(_) => OperationKind::Update,
            None => OperationKind::Create,
        };
        ops.push(Operation {
            kind,
            id: artifact.id.clone(),
            source: path.to_string(),
            artifact: Some(artifact.clone()),
        });
    }
    for id in prior.keys() {
        if !seen.contains(id.as_str()) {
            ops.push(Operation {
                kind: OperationKind::Delete,
                id: id.clone(),
                source: path.to_string(),
                artifact: None,
            });
        }
    }
    ops
}

fn record_for(analysis: &FileAnalysis) -> SyncRecord {
    SyncRecord {
        fingerprint: analysis.fingerprint.clone(),
        language: analysis.language,
        size: analysis.size,
        artifacts: analysis
            .artifacts
            .iter()
            .map(|(artifact, digest)| (artifact.id.clone(), digest.clone()))
            .collect(),
        provides: analysis.provides.clone(),
        links: analysis.links.clone(),
    }
}

/// Record for the tree documents. Its fingerprint covers every file they
/// were built from.
fn tree_record_for(files: &[SourceFile], produced: &[(Artifact, String)]) -> SyncRecord {
    let mut inputs: Vec<String> = files
        .iter()
        .map(|f| format!("{}:{}\n", f.path, f.fingerprint))
        .collect();
    inputs.sort();
    SyncRecord {
        fingerprint: fingerprint(inputs.concat().as_bytes()),
        language: Language::Unknown,
        size: files.iter().map(|f| f.size).sum(),
        artifacts: produced
            .iter()
            .map(|(artifact, digest)| (artifact.id.clone(), digest.clone()))
            .collect(),
        provides: BTreeSet::new(),
        links: BTreeSet::new(),
    }
}

fn unreadable(path: &str, error: &std::io::Error) -> Diagnostic {
    Diagnostic::new(path, DiagnosticKind::Unreadable, error.to_string())
}

fn shadow_diagnostics(enumeration: &Enumeration) -> Vec<Diagnostic> {
    enumeration
        .unreadable
        .iter()
        .map(|(path, message)| Diagnostic::new(path.as_str(), DiagnosticKind::Unreadable, message.as_str()))
        .collect()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn artifact(id: &str) -> (Artifact, String) {
        let artifact = Artifact {
            id: id.to_string(),
            title: id.to_string(),
            body: String::new(),
            tags: BTreeSet::new(),
            cross_references: BTreeSet::new(),
            source: "a.py".to_string(),
        };
        let digest = artifact.digest().unwrap();
        (artifact, digest)
    }

    #[test]
    fn test_diff_creates_updates_and_deletes() {
        let (same, same_digest) = artifact("a.py#file-level");
        let changed = artifact("a.py#run");
        let fresh = artifact("a.py#new");

        let mut prior = BTreeMap::new();
        prior.insert(same.id.clone(), Some(same_digest.clone()));
        prior.insert(changed.0.id.clone(), Some("stale".to_string()));
        prior.insert("a.py#gone".to_string(), Some("x".to_string()));

        let ops = diff_artifacts("a.py", &[(same, same_digest), changed, fresh], &prior);
        let summary: Vec<_> = ops.iter().map(|o| (o.kind, o.id.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (OperationKind::Update, "a.py#run"),
                (OperationKind::Create, "a.py#new"),
                (OperationKind::Delete, "a.py#gone"),
            ]
        );
    }

    #[test]
    fn test_unknown_digest_is_rewritten() {
        let produced = artifact("a.py#file-level");
        let mut prior = BTreeMap::new();
        prior.insert(produced.0.id.clone(), None);
        let ops = diff_artifacts("a.py", &[produced], &prior);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].kind, OperationKind::Update);
    }

    #[test]
    fn test_tree_record_ignores_file_order() {
        let file = |path: &str, fp: &str| SourceFile {
            path: path.to_string(),
            language: Language::Python,
            fingerprint: fp.to_string(),
            size: 10,
            last_seen: 1,
        };
        let produced = vec![artifact("@tree#overview")];
        let one = tree_record_for(&[file("a.py", "1"), file("b.py", "2")], &produced);
        let two = tree_record_for(&[file("b.py", "2"), file("a.py", "1")], &produced);
        assert_eq!(one, two);
        assert_eq!(one.size, 20);
        assert_eq!(one.artifacts.len(), 1);

        let changed = tree_record_for(&[file("a.py", "1"), file("b.py", "3")], &produced);
        assert_ne!(one.fingerprint, changed.fingerprint);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let config = SyncConfig {
            concurrency: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(SyncEngine::new(config), Err(SyncError::Config(_))));
    }
}
