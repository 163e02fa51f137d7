//! Integration tests for per-file analysis against the fixture project.
//!
//! `testdata/project` is a small polyglot repository: Python, Go,
//! TypeScript and Ruby sources plus one manifest per ecosystem.

mod common;

use std::collections::BTreeSet;
use std::path::PathBuf;

use codescribe::analysis::EntityKind;
use codescribe::deps::Ecosystem;
use codescribe::diagnostics::DiagnosticKind;
use codescribe::lang::{classify, Language};
use codescribe::sync::{
    analyze_file, fingerprint, FileAnalysis, FsArtifactStore, FsSourceTree, JsonStateFile,
    SyncEngine,
};
use common::{config, config_with_tree_documents};
use tempfile::TempDir;

fn project_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/project")
}

fn analyze(rel: &str) -> FileAnalysis {
    let content = std::fs::read(project_path().join(rel)).expect("fixture should exist");
    analyze_file(rel, &content, fingerprint(&content), &config()).expect("analysis should render")
}

fn names(analysis: &FileAnalysis, kind: EntityKind) -> Vec<String> {
    analysis
        .module
        .children_of(kind)
        .map(|e| e.name.clone())
        .collect()
}

fn dependencies(analysis: &FileAnalysis) -> (Ecosystem, BTreeSet<(String, bool)>) {
    let manifest = analysis.manifest.as_ref().expect("should be a manifest");
    assert!(manifest.diagnostic.is_none(), "{:?}", manifest.diagnostic);
    let deps = manifest
        .dependencies
        .iter()
        .map(|d| (d.name.clone(), d.dev))
        .collect();
    (manifest.ecosystem, deps)
}

fn set(items: &[(&str, bool)]) -> BTreeSet<(String, bool)> {
    items.iter().map(|(n, d)| (n.to_string(), *d)).collect()
}

#[test]
fn test_fixture_languages() {
    let cases = [
        ("src/orders.py", Language::Python),
        ("src/billing/invoice.go", Language::Go),
        ("web/app.ts", Language::TypeScript),
        ("lib/widget.rb", Language::Ruby),
        ("docs/guide.md", Language::Markdown),
        ("package.json", Language::Json),
        ("Cargo.toml", Language::Toml),
        ("Gemfile", Language::Ruby),
        ("pom.xml", Language::Xml),
        ("notes.dat", Language::Unknown),
    ];
    for (rel, expected) in cases {
        let content = std::fs::read(project_path().join(rel)).unwrap();
        assert_eq!(classify(rel, &content), expected, "{}", rel);
    }
}

#[test]
fn test_python_structure() {
    let analysis = analyze("src/orders.py");
    assert_eq!(analysis.language, Language::Python);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    assert_eq!(analysis.module.doc.as_deref(), Some("Order processing for the storefront."));

    assert_eq!(names(&analysis, EntityKind::Class), vec!["OrderRepository", "Order"]);
    assert_eq!(names(&analysis, EntityKind::Function), vec!["place_order", "cancel_order"]);

    let repo = analysis.module.classes().next().unwrap();
    let methods: Vec<_> = repo.functions().map(|f| f.name.as_str()).collect();
    assert_eq!(methods, vec!["__init__", "save", "find"]);

    for name in ["orders", "Order", "OrderRepository", "place_order"] {
        assert!(analysis.provides.contains(name), "missing {}", name);
    }
    assert!(analysis.links.contains("json"));
    assert!(analysis.links.contains("billing"));

    let (artifact, _) = &analysis.artifacts[0];
    assert!(artifact.tags.contains("role:source"));
    assert!(artifact.tags.contains("language:python"));
    assert!(artifact.body.contains("place_order"));
}

#[test]
fn test_go_structure() {
    let analysis = analyze("src/billing/invoice.go");
    assert_eq!(names(&analysis, EntityKind::Class), vec!["Invoice"]);
    let functions = names(&analysis, EntityKind::Function);
    assert!(functions.contains(&"NewInvoice".to_string()));
    assert!(names(&analysis, EntityKind::Import).contains(&"fmt".to_string()));
}

#[test]
fn test_test_directory_role() {
    let analysis = analyze("tests/test_orders.py");
    assert!(analysis.artifacts[0].0.tags.contains("role:tests"));
    // Imports from the sibling source module become links.
    assert!(analysis.links.contains("orders"));
}

#[test]
fn test_manifest_per_ecosystem() {
    let cases: Vec<(&str, Ecosystem, BTreeSet<(String, bool)>)> = vec![
        (
            "package.json",
            Ecosystem::Npm,
            set(&[("express", false), ("left-pad", false), ("typescript", true)]),
        ),
        (
            "requirements.txt",
            Ecosystem::PyPI,
            set(&[("requests", false), ("pydantic", false)]),
        ),
        (
            "go.mod",
            Ecosystem::Go,
            set(&[("github.com/google/uuid", false), ("golang.org/x/sync", false)]),
        ),
        (
            "Cargo.toml",
            Ecosystem::Crates,
            set(&[("serde", false), ("anyhow", false), ("tempfile", true)]),
        ),
        (
            "Gemfile",
            Ecosystem::RubyGems,
            set(&[("rails", false), ("rspec", true)]),
        ),
        (
            "pom.xml",
            Ecosystem::Maven,
            set(&[("com.google.guava:guava", false), ("junit:junit", true)]),
        ),
    ];

    for (rel, ecosystem, expected) in cases {
        let analysis = analyze(rel);
        assert_eq!(dependencies(&analysis), (ecosystem, expected), "{}", rel);
        let ids: Vec<_> = analysis.artifacts.iter().map(|(a, _)| a.id.clone()).collect();
        assert!(ids.contains(&format!("{}#dependencies", rel)), "{}", rel);
        assert!(ids.contains(&format!("{}#file-level", rel)), "{}", rel);
    }
}

#[test]
fn test_unknown_file_gets_presence_artifact() {
    let analysis = analyze("notes.dat");
    assert_eq!(analysis.language, Language::Unknown);
    assert_eq!(analysis.artifacts.len(), 1);
    assert!(analysis.artifacts[0].0.body.contains("Unrecognized file"));
}

#[test]
fn test_sync_fixture_project() {
    let out = TempDir::new().unwrap();
    let cfg = config();
    let source = FsSourceTree::new(project_path(), cfg.ignore_set().unwrap());
    let mut store = FsArtifactStore::new(out.path().join("artifacts"));
    let mut state = JsonStateFile::new(out.path().join("state.json"));
    let engine = SyncEngine::new(cfg).unwrap();

    let report = engine.run(&source, &mut store, &mut state).unwrap();
    assert_eq!(report.counts.files_scanned, 13);
    assert_eq!(report.counts.skipped, 0);
    assert!(report.whole_tree);
    assert!(report
        .diagnostics
        .iter()
        .all(|d| d.kind != DiagnosticKind::UnsupportedManifest));
    // One file-level artifact per file plus six dependency listings.
    assert_eq!(report.counts.created, 13 + 6);

    let report = engine.run(&source, &mut store, &mut state).unwrap();
    assert_eq!(report.operation_count(), 0);
    assert_eq!(report.counts.unchanged, 13);
}

#[test]
fn test_fixture_project_tree_documents() {
    let out = TempDir::new().unwrap();
    let cfg = config_with_tree_documents();
    let source = FsSourceTree::new(project_path(), cfg.ignore_set().unwrap());
    let mut store = FsArtifactStore::new(out.path().join("artifacts"));
    let mut state = JsonStateFile::new(out.path().join("state.json"));
    let engine = SyncEngine::new(cfg).unwrap();

    let report = engine.run(&source, &mut store, &mut state).unwrap();
    let tree_ids: Vec<_> = report
        .operations
        .iter()
        .filter(|o| o.source == "@tree")
        .map(|o| o.id.as_str())
        .collect();
    assert!(tree_ids.contains(&"@tree#overview"));
    assert!(tree_ids.contains(&"@tree#architecture"));
    assert!(tree_ids.contains(&"@tree#dependencies"));

    let overview = store.read("@tree#overview").unwrap().expect("overview written");
    assert!(overview.contains("- Files: 13"));
    let deps = store.read("@tree#dependencies").unwrap().expect("summary written");
    assert!(deps.contains("- Manifest files: 6"));
    assert!(out.path().join("artifacts/@tree/overview.md").is_file());

    let report = engine.run(&source, &mut store, &mut state).unwrap();
    assert_eq!(report.operation_count(), 0);
}
