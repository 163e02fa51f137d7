//! Documents describing the whole tree rather than one file.
//!
//! Only built when every current file was analyzed in the same run, since
//! they summarize all of them. Incremental runs leave them as they are.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use super::markdown::DirectoryRole;
use super::{artifact_id, Artifact};
use crate::analysis::{CodeEntity, EntityKind};
use crate::deps::{Ecosystem, ManifestAnalysis};
use crate::lang::Language;
use crate::patterns::{Pattern, PatternKind};

/// Source path tree-level artifacts are filed under. `@` cannot start a
/// relative path the scanner produces from a real file.
pub const TREE_SOURCE: &str = "@tree";

pub const OVERVIEW_KEY: &str = "overview";
pub const ARCHITECTURE_KEY: &str = "architecture";
pub const PATTERNS_KEY: &str = "patterns";
pub const DEPENDENCY_SUMMARY_KEY: &str = "dependencies";

const CONFIG_EXTENSIONS: &[&str] = &["json", "yml", "yaml", "toml", "ini", "cfg"];
const CONFIG_NAMES: &[&str] = &["Dockerfile", "Makefile", ".gitignore", ".editorconfig"];
const DOC_PREFIXES: &[&str] = &["README", "CONTRIBUTING", "LICENSE", "CHANGELOG"];
const LARGEST_MODULES: usize = 5;

/// One analyzed file as the tree documents see it.
#[derive(Debug, Clone, Copy)]
pub struct TreeFile<'a> {
    pub path: &'a str,
    pub language: Language,
    pub size: u64,
    pub module: &'a CodeEntity,
    /// Single-file patterns.
    pub patterns: &'a [Pattern],
    pub manifest: Option<&'a ManifestAnalysis>,
    pub degraded: bool,
}

/// Overview, architecture, pattern and dependency summaries for a tree.
///
/// `patterns` are the cross-file patterns. A file-level finding that shows
/// up in at least `min_occurrences` files is listed as recurring. The
/// pattern and dependency documents are omitted when they would be empty.
pub fn synthesize_tree(files: &[TreeFile<'_>], patterns: &[Pattern], min_occurrences: usize) -> Vec<Artifact> {
    if files.is_empty() {
        return Vec::new();
    }
    let mut files = files.to_vec();
    files.sort_by(|a, b| a.path.cmp(b.path));

    let mut artifacts = vec![
        tree_artifact(OVERVIEW_KEY, "Codebase Overview", overview_body(&files)),
        tree_artifact(ARCHITECTURE_KEY, "Project Architecture", architecture_body(&files)),
    ];

    let recurring = recurring_findings(&files, min_occurrences.max(2));
    if !patterns.is_empty() || !recurring.is_empty() {
        artifacts.push(tree_artifact(
            PATTERNS_KEY,
            "Codebase Patterns",
            patterns_body(patterns, &recurring),
        ));
    }
    if files.iter().any(|f| f.manifest.is_some()) {
        artifacts.push(tree_artifact(
            DEPENDENCY_SUMMARY_KEY,
            "Dependency Summary",
            dependency_body(&files),
        ));
    }
    artifacts
}

fn tree_artifact(key: &str, title: &str, body: String) -> Artifact {
    let mut tags = BTreeSet::new();
    tags.insert("tree".to_string());
    tags.insert(key.to_string());
    Artifact {
        id: artifact_id(TREE_SOURCE, key),
        title: title.to_string(),
        body,
        tags,
        cross_references: BTreeSet::new(),
        source: TREE_SOURCE.to_string(),
    }
}

#[derive(Default)]
struct ComponentCounts {
    classes: usize,
    functions: usize,
    methods: usize,
    imports: usize,
    comment_blocks: usize,
}

impl ComponentCounts {
    fn add(&mut self, module: &CodeEntity) {
        for entity in module.walk() {
            match entity.kind {
                EntityKind::Class => {
                    self.classes += 1;
                    self.methods += entity.functions().count();
                }
                EntityKind::Function => self.functions += 1,
                EntityKind::Import => self.imports += 1,
                EntityKind::CommentBlock => self.comment_blocks += 1,
                EntityKind::Module => {}
            }
        }
    }
}

fn overview_body(files: &[TreeFile<'_>]) -> String {
    let mut languages: BTreeMap<Language, usize> = BTreeMap::new();
    let mut components = ComponentCounts::default();
    for file in files {
        *languages.entry(file.language).or_insert(0) += 1;
        components.add(file.module);
    }
    let mut distribution: Vec<(Language, usize)> = languages.into_iter().collect();
    distribution.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut out = String::new();
    let _ = writeln!(out, "# Codebase Overview\n");
    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- Files: {}", files.len());
    let _ = writeln!(out, "- Total size: {} bytes", files.iter().map(|f| f.size).sum::<u64>());
    let code: Vec<&str> = distribution
        .iter()
        .filter(|(l, _)| l.is_code())
        .map(|(l, _)| l.display_name())
        .collect();
    if !code.is_empty() {
        let _ = writeln!(out, "- Languages: {}", code.join(", "));
    }
    let degraded = files.iter().filter(|f| f.degraded).count();
    if degraded > 0 {
        let _ = writeln!(out, "- Degraded parses: {}", degraded);
    }

    let _ = writeln!(out, "\n## Language Distribution\n");
    for (language, count) in &distribution {
        let share = *count as f64 * 100.0 / files.len() as f64;
        let _ = writeln!(out, "- {}: {} files ({:.1}%)", language.display_name(), count, share);
    }

    let _ = writeln!(out, "\n## Components\n");
    let _ = writeln!(out, "- Classes: {}", components.classes);
    let _ = writeln!(
        out,
        "- Functions: {} ({} methods)",
        components.functions, components.methods
    );
    let _ = writeln!(out, "- Imports: {}", components.imports);
    let _ = writeln!(out, "- Comment blocks: {}", components.comment_blocks);

    let mut largest: Vec<(&str, usize, usize)> = files
        .iter()
        .map(|f| (f.path, f.module.children.len(), f.module.span.lines()))
        .filter(|(_, entities, _)| *entities > 0)
        .collect();
    largest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    if !largest.is_empty() {
        let _ = writeln!(out, "\n## Largest Modules\n");
        for (path, entities, lines) in largest.into_iter().take(LARGEST_MODULES) {
            let _ = writeln!(out, "- `{}`: {} entities, {} lines", path, entities, lines);
        }
    }
    out
}

fn top_directory(path: &str) -> Option<&str> {
    path.split_once('/').map(|(top, _)| top)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_config_file(name: &str) -> bool {
    CONFIG_NAMES.contains(&name)
        || name.starts_with(".env")
        || name
            .rsplit_once('.')
            .map(|(_, ext)| CONFIG_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
}

fn is_doc_file(name: &str) -> bool {
    let upper = name.to_uppercase();
    DOC_PREFIXES.iter().any(|p| upper.starts_with(p))
}

fn architecture_body(files: &[TreeFile<'_>]) -> String {
    let mut directories: BTreeMap<&str, Vec<&TreeFile<'_>>> = BTreeMap::new();
    let mut root_files = Vec::new();
    for file in files {
        match top_directory(file.path) {
            Some(top) => directories.entry(top).or_default().push(file),
            None => root_files.push(file.path),
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "# Project Architecture\n");
    let _ = writeln!(out, "## Directory Structure\n");
    for (dir, members) in &directories {
        let role = DirectoryRole::of(members[0].path);
        let _ = write!(out, "- `{}/`: {}, {} files", dir, role, members.len());
        if let Some(language) = dominant_language(members) {
            let _ = write!(out, ", mostly {}", language.display_name());
        }
        out.push('\n');
    }
    if !root_files.is_empty() {
        let _ = writeln!(out, "- (root): {} files", root_files.len());
    }

    let config: Vec<&str> = root_files.iter().copied().filter(|p| is_config_file(p)).collect();
    if !config.is_empty() {
        let _ = writeln!(out, "\n## Configuration Files\n");
        for path in config {
            let _ = writeln!(out, "- `{}`", path);
        }
    }

    let mut docs: Vec<String> = root_files
        .iter()
        .filter(|p| is_doc_file(p))
        .map(|p| p.to_string())
        .collect();
    docs.extend(
        directories
            .iter()
            .filter(|(_, m)| DirectoryRole::of(m[0].path) == DirectoryRole::Documentation)
            .map(|(dir, _)| format!("{}/", dir)),
    );
    if !docs.is_empty() {
        let _ = writeln!(out, "\n## Documentation\n");
        for doc in docs {
            let _ = writeln!(out, "- `{}`", doc);
        }
    }

    let tests: Vec<(&str, usize)> = directories
        .iter()
        .filter(|(_, m)| DirectoryRole::of(m[0].path) == DirectoryRole::Tests)
        .map(|(dir, m)| (*dir, m.len()))
        .collect();
    let test_files = files
        .iter()
        .filter(|f| {
            let name = file_name(f.path);
            name.starts_with("test_") || name.contains("_test.") || name.contains(".test.") || name.contains(".spec.")
        })
        .count();
    if !tests.is_empty() || test_files > 0 {
        let _ = writeln!(out, "\n## Tests\n");
        for (dir, count) in tests {
            let _ = writeln!(out, "- `{}/`: {} files", dir, count);
        }
        if test_files > 0 {
            let _ = writeln!(out, "- Test files by name: {}", test_files);
        }
    }
    out
}

fn dominant_language(members: &[&TreeFile<'_>]) -> Option<Language> {
    let mut counts: BTreeMap<Language, usize> = BTreeMap::new();
    for file in members.iter().filter(|f| f.language.is_code()) {
        *counts.entry(file.language).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(language, _)| language)
}

/// A single-file finding seen in several files.
struct Recurring<'a> {
    kind: PatternKind,
    label: &'a str,
    files: Vec<&'a str>,
}

fn recurring_findings<'a>(files: &[TreeFile<'a>], min_occurrences: usize) -> Vec<Recurring<'a>> {
    let mut seen: BTreeMap<(PatternKind, &'a str), BTreeSet<&'a str>> = BTreeMap::new();
    for file in files {
        for pattern in file.patterns {
            seen.entry((pattern.kind, pattern.label.as_str()))
                .or_default()
                .insert(file.path);
        }
    }
    seen.into_iter()
        .filter(|(_, paths)| paths.len() >= min_occurrences)
        .map(|((kind, label), paths)| Recurring {
            kind,
            label,
            files: paths.into_iter().collect(),
        })
        .collect()
}

fn kind_heading(kind: PatternKind) -> &'static str {
    match kind {
        PatternKind::NamingConvention => "Naming Conventions",
        PatternKind::StructuralPattern => "Structural Patterns",
        PatternKind::AntiPattern => "Anti-patterns",
    }
}

fn patterns_body(patterns: &[Pattern], recurring: &[Recurring<'_>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Codebase Patterns");

    let mut by_kind: BTreeMap<PatternKind, Vec<&Pattern>> = BTreeMap::new();
    for pattern in patterns {
        by_kind.entry(pattern.kind).or_default().push(pattern);
    }
    for (kind, group) in &by_kind {
        let _ = writeln!(out, "\n## {}\n", kind_heading(*kind));
        for pattern in group {
            let _ = write!(
                out,
                "- **{}** (confidence {:.2}): {}",
                pattern.label, pattern.confidence, pattern.note
            );
            if !pattern.evidence.is_empty() {
                let evidence: Vec<String> = pattern.evidence.iter().map(|e| format!("`{}`", e)).collect();
                let _ = write!(out, " [{}]", evidence.join(", "));
            }
            out.push('\n');
        }
    }

    if !recurring.is_empty() {
        let _ = writeln!(out, "\n## Recurring Findings\n");
        for finding in recurring {
            let _ = writeln!(
                out,
                "- **{}** {} in {} files: {}",
                finding.kind,
                finding.label,
                finding.files.len(),
                finding.files.iter().map(|f| format!("`{}`", f)).collect::<Vec<_>>().join(", ")
            );
        }
    }
    out
}

#[derive(Default)]
struct EcosystemSummary<'a> {
    runtime: usize,
    dev: usize,
    manifests: Vec<&'a str>,
}

fn dependency_body(files: &[TreeFile<'_>]) -> String {
    let mut ecosystems: BTreeMap<Ecosystem, EcosystemSummary<'_>> = BTreeMap::new();
    let mut notes = Vec::new();
    for file in files {
        let Some(manifest) = file.manifest else {
            continue;
        };
        let summary = ecosystems.entry(manifest.ecosystem).or_default();
        summary.manifests.push(file.path);
        for dep in &manifest.dependencies {
            if dep.dev {
                summary.dev += 1;
            } else {
                summary.runtime += 1;
            }
        }
        if let Some(diagnostic) = &manifest.diagnostic {
            notes.push(format!("`{}`: {}", file.path, diagnostic.message));
        }
    }
    let total: usize = ecosystems.values().map(|s| s.runtime + s.dev).sum();
    let manifests: usize = ecosystems.values().map(|s| s.manifests.len()).sum();

    let mut out = String::new();
    let _ = writeln!(out, "# Dependency Summary\n");
    let _ = writeln!(out, "- Total dependencies: {}", total);
    let _ = writeln!(out, "- Manifest files: {}", manifests);
    for (ecosystem, summary) in &ecosystems {
        let _ = writeln!(out, "\n## {}\n", ecosystem);
        let _ = writeln!(out, "- Runtime: {}", summary.runtime);
        let _ = writeln!(out, "- Development: {}", summary.dev);
        let _ = writeln!(
            out,
            "- Manifests: {}",
            summary.manifests.iter().map(|m| format!("`{}`", m)).collect::<Vec<_>>().join(", ")
        );
    }
    if !notes.is_empty() {
        let _ = writeln!(out, "\n## Notes\n");
        for note in notes {
            let _ = writeln!(out, "- {}", note);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Extractor;
    use crate::deps::analyze_manifest;

    struct Fixture {
        path: &'static str,
        language: Language,
        text: &'static str,
        module: CodeEntity,
        manifest: Option<ManifestAnalysis>,
    }

    fn fixture(path: &'static str, language: Language, text: &'static str) -> Fixture {
        Fixture {
            path,
            language,
            text,
            module: Extractor::for_language(language).extract(path, text).module,
            manifest: analyze_manifest(path, text),
        }
    }

    fn view(f: &Fixture) -> TreeFile<'_> {
        TreeFile {
            path: f.path,
            language: f.language,
            size: f.text.len() as u64,
            module: &f.module,
            patterns: &[],
            manifest: f.manifest.as_ref(),
            degraded: false,
        }
    }

    fn sample() -> Vec<Fixture> {
        vec![
            fixture("src/app.py", Language::Python, "import os\n\nclass App:\n    def run(self):\n        pass\n"),
            fixture("src/util.py", Language::Python, "def helper():\n    pass\n"),
            fixture("tests/test_app.py", Language::Python, "def test_run():\n    pass\n"),
            fixture("README.md", Language::Markdown, "# demo\n"),
            fixture(
                "package.json",
                Language::Json,
                r#"{"dependencies": {"left-pad": "^1.0.0"}, "devDependencies": {"jest": "^29"}}"#,
            ),
        ]
    }

    fn find<'a>(artifacts: &'a [Artifact], key: &str) -> &'a Artifact {
        artifacts
            .iter()
            .find(|a| a.key() == key)
            .unwrap_or_else(|| panic!("missing {}", key))
    }

    #[test]
    fn test_tree_documents() {
        let fixtures = sample();
        let files: Vec<_> = fixtures.iter().map(view).collect();
        let artifacts = synthesize_tree(&files, &[], 3);

        let ids: Vec<_> = artifacts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["@tree#overview", "@tree#architecture", "@tree#dependencies"]);
        assert!(artifacts.iter().all(|a| a.source == TREE_SOURCE && a.tags.contains("tree")));

        let overview = find(&artifacts, OVERVIEW_KEY);
        assert!(overview.body.contains("- Files: 5"));
        assert!(overview.body.contains("- Python: 3 files (60.0%)"));
        assert!(overview.body.contains("- Classes: 1"));
        assert!(overview.body.contains("(1 methods)"));

        let architecture = find(&artifacts, ARCHITECTURE_KEY);
        assert!(architecture.body.contains("- `src/`: source, 2 files, mostly Python"));
        assert!(architecture.body.contains("- `tests/`: tests, 1 files"));
        assert!(architecture.body.contains("## Configuration Files\n\n- `package.json`"));
        assert!(architecture.body.contains("## Documentation\n\n- `README.md`"));

        let deps = find(&artifacts, DEPENDENCY_SUMMARY_KEY);
        assert!(deps.body.contains("- Total dependencies: 2"));
        assert!(deps.body.contains("## npm\n\n- Runtime: 1\n- Development: 1"));
    }

    #[test]
    fn test_tree_documents_ignore_input_order() {
        let fixtures = sample();
        let files: Vec<_> = fixtures.iter().map(view).collect();
        let mut reversed = files.clone();
        reversed.reverse();
        let one: Vec<_> = synthesize_tree(&files, &[], 3).iter().map(|a| a.render().unwrap()).collect();
        let two: Vec<_> = synthesize_tree(&reversed, &[], 3).iter().map(|a| a.render().unwrap()).collect();
        assert_eq!(one, two);
    }

    #[test]
    fn test_recurring_findings_need_enough_files() {
        let fixtures = sample();
        let finding = [Pattern::new(PatternKind::AntiPattern, "missing module docstring", Vec::new())];
        let mut files: Vec<_> = fixtures.iter().map(view).collect();
        files[0].patterns = &finding;
        assert!(synthesize_tree(&files, &[], 2).iter().all(|a| a.key() != PATTERNS_KEY));

        files[1].patterns = &finding;
        let artifacts = synthesize_tree(&files, &[], 2);
        let patterns = find(&artifacts, PATTERNS_KEY);
        assert!(patterns
            .body
            .contains("- **anti-pattern** missing module docstring in 2 files: `src/app.py`, `src/util.py`"));
    }

    #[test]
    fn test_cross_file_patterns_grouped_by_kind() {
        let fixtures = sample();
        let files: Vec<_> = fixtures.iter().map(view).collect();
        let cross = [Pattern::new(
            PatternKind::StructuralPattern,
            "layered imports",
            vec![fixtures[0].module.to_ref()],
        )
        .with_note("app imports util")];
        let artifacts = synthesize_tree(&files, &cross, 3);
        let patterns = find(&artifacts, PATTERNS_KEY);
        assert!(patterns.body.contains("## Structural Patterns\n\n- **layered imports**"));
        assert!(patterns.body.contains("app imports util [`src/app.py:1 app`]"));
    }

    #[test]
    fn test_empty_tree_has_no_documents() {
        assert!(synthesize_tree(&[], &[], 3).is_empty());
    }
}
