//! Markdown bodies for each artifact shape.

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use super::SynthesisInput;
use crate::analysis::{CodeEntity, EntityKind};
use crate::deps::{Dependency, ManifestAnalysis};
use crate::lang::Language;
use crate::patterns::Pattern;

/// Line counts shown in every file-level artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileMetrics {
    pub lines: usize,
    pub non_empty: usize,
    pub comments: usize,
}

impl FileMetrics {
    pub fn measure(text: &str, language: Language) -> Self {
        let mut metrics = FileMetrics::default();
        let marker = language.line_comment();
        let block = language.has_block_comments();
        let mut in_block = false;

        for line in text.lines() {
            metrics.lines += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            metrics.non_empty += 1;

            if in_block {
                metrics.comments += 1;
                if trimmed.contains("*/") {
                    in_block = false;
                }
            } else if marker.map(|m| trimmed.starts_with(m)).unwrap_or(false) {
                metrics.comments += 1;
            } else if block && trimmed.starts_with("/*") {
                metrics.comments += 1;
                in_block = !trimmed.contains("*/");
            }
        }
        metrics
    }
}

/// Role of a file's top-level directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryRole {
    Root,
    Source,
    Tests,
    Documentation,
    Configuration,
    Assets,
    Build,
    Dependencies,
    Other,
}

const ROLE_MARKERS: &[(DirectoryRole, &[&str])] = &[
    (DirectoryRole::Source, &["src", "source", "lib", "app"]),
    (DirectoryRole::Tests, &["test", "tests", "spec", "__tests__"]),
    (DirectoryRole::Documentation, &["docs", "documentation", "doc"]),
    (DirectoryRole::Configuration, &["config", "conf", ".config"]),
    (DirectoryRole::Assets, &["assets", "static", "public", "resources"]),
    (DirectoryRole::Build, &["build", "dist", "output", "out"]),
    (DirectoryRole::Dependencies, &["node_modules", "venv", "env", "vendor"]),
];

impl DirectoryRole {
    /// Classify by the first path component. Files at the root have no
    /// directory and are `Root`.
    pub fn of(path: &str) -> Self {
        let Some((top, _)) = path.split_once('/') else {
            return DirectoryRole::Root;
        };
        let top = top.to_lowercase();
        ROLE_MARKERS
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| top.contains(m)))
            .map(|(role, _)| *role)
            .unwrap_or(DirectoryRole::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryRole::Root => "root",
            DirectoryRole::Source => "source",
            DirectoryRole::Tests => "tests",
            DirectoryRole::Documentation => "documentation",
            DirectoryRole::Configuration => "configuration",
            DirectoryRole::Assets => "assets",
            DirectoryRole::Build => "build",
            DirectoryRole::Dependencies => "dependencies",
            DirectoryRole::Other => "other",
        }
    }
}

impl fmt::Display for DirectoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// First paragraph of a doc string, joined onto one line.
fn summary(doc: &str) -> String {
    doc.trim()
        .split("\n\n")
        .next()
        .unwrap_or("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn entity_line(out: &mut String, entity: &CodeEntity) {
    let label = entity.signature.as_deref().unwrap_or(&entity.name);
    let _ = write!(out, "- `{}` ({})", label, entity.span);
    if let Some(doc) = entity.doc.as_deref().map(summary).filter(|s| !s.is_empty()) {
        let _ = write!(out, ": {}", doc);
    }
    out.push('\n');
}

fn pattern_line(out: &mut String, pattern: &Pattern) {
    let _ = write!(
        out,
        "- **{}** {} (confidence {:.2}): {}",
        pattern.kind, pattern.label, pattern.confidence, pattern.note
    );
    if !pattern.evidence.is_empty() {
        let evidence: Vec<_> = pattern
            .evidence
            .iter()
            .map(|e| format!("`{}` L{}", e.name, e.line))
            .collect();
        let _ = write!(out, " [{}]", evidence.join(", "));
    }
    out.push('\n');
}

fn references_section(out: &mut String, refs: &BTreeSet<String>) {
    if refs.is_empty() {
        return;
    }
    out.push_str("\n## References\n\n");
    let links: Vec<_> = refs.iter().map(|r| format!("[[{}]]", r)).collect();
    out.push_str(&links.join(" "));
    out.push('\n');
}

fn overview(out: &mut String, input: &SynthesisInput<'_>) {
    let metrics = FileMetrics::measure(input.text, input.language);
    let _ = writeln!(out, "## Overview\n");
    let _ = writeln!(out, "- Language: {}", input.language.display_name());
    let _ = writeln!(out, "- Role: {}", DirectoryRole::of(input.path));
    let _ = writeln!(out, "- Size: {} bytes", input.size);
    let _ = writeln!(
        out,
        "- Lines: {} ({} non-empty, {} comment)",
        metrics.lines, metrics.non_empty, metrics.comments
    );
    if let Some(reason) = input.degraded {
        let _ = writeln!(out, "- Parse: degraded ({})", reason);
    }
}

/// Body of the `file-level` artifact. In per-entity mode `entity_keys` is
/// non-empty and classes and functions are listed by artifact key only.
pub(super) fn file_body(
    input: &SynthesisInput<'_>,
    refs: &BTreeSet<String>,
    entity_keys: &[(String, &CodeEntity)],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", input.path);
    if let Some(doc) = input.module.doc.as_deref().map(summary).filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "{}\n", doc);
    }
    overview(&mut out, input);

    let imports: Vec<_> = input.module.imports().collect();
    if !imports.is_empty() {
        let _ = writeln!(out, "\n## Imports ({})\n", imports.len());
        for import in imports {
            let _ = writeln!(out, "- `{}` ({})", import.name, import.span);
        }
    }

    if !entity_keys.is_empty() {
        let _ = writeln!(out, "\n## Contents\n");
        for (key, entity) in entity_keys {
            let _ = writeln!(out, "- {} `{}` ({}) -> `#{}`", entity.kind, entity.name, entity.span, key);
        }
    } else {
        let classes: Vec<_> = input.module.classes().collect();
        if !classes.is_empty() {
            let _ = writeln!(out, "\n## Classes ({})\n", classes.len());
            for class in classes {
                class_section(&mut out, class);
            }
        }
        let functions: Vec<_> = input.module.functions().collect();
        if !functions.is_empty() {
            let _ = writeln!(out, "\n## Functions ({})\n", functions.len());
            for function in functions {
                entity_line(&mut out, function);
            }
        }
    }

    let comment_blocks = input.module.children_of(EntityKind::CommentBlock).count();
    if comment_blocks > 0 {
        let _ = writeln!(out, "\n## Comment blocks\n\n{} block(s)", comment_blocks);
    }

    if !input.patterns.is_empty() {
        let _ = writeln!(out, "\n## Patterns\n");
        for pattern in input.patterns {
            pattern_line(&mut out, pattern);
        }
    }

    references_section(&mut out, refs);
    out
}

fn class_section(out: &mut String, class: &CodeEntity) {
    let _ = write!(out, "### `{}` ({})", class.name, class.span);
    if !class.bases.is_empty() {
        let _ = write!(out, " extends {}", class.bases.join(", "));
    }
    out.push_str("\n\n");
    if !class.decorators.is_empty() {
        let _ = writeln!(out, "Decorators: {}\n", class.decorators.join(", "));
    }
    if let Some(doc) = class.doc.as_deref().map(summary).filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "{}\n", doc);
    }
    for method in class.functions() {
        entity_line(out, method);
    }
    out.push('\n');
}

/// Body of a per-entity artifact.
pub(super) fn entity_body(input: &SynthesisInput<'_>, entity: &CodeEntity, refs: &BTreeSet<String>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} `{}`\n", entity.kind, entity.name);
    let _ = writeln!(out, "Defined in `{}` ({}).\n", input.path, entity.span);
    if let Some(signature) = &entity.signature {
        let _ = writeln!(out, "```{}\n{}\n```\n", input.language, signature);
    }
    if !entity.decorators.is_empty() {
        let _ = writeln!(out, "Decorators: {}\n", entity.decorators.join(", "));
    }
    if let Some(doc) = entity.doc.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "{}\n", doc);
    }

    let methods: Vec<_> = entity.functions().collect();
    if !methods.is_empty() {
        let _ = writeln!(out, "## Methods ({})\n", methods.len());
        for method in methods {
            entity_line(&mut out, method);
        }
    }

    let related: Vec<_> = input
        .patterns
        .iter()
        .filter(|p| {
            p.evidence
                .iter()
                .any(|e| entity.span.contains(&crate::analysis::LineSpan::new(e.line, e.line)))
        })
        .collect();
    if !related.is_empty() {
        let _ = writeln!(out, "\n## Patterns\n");
        for pattern in related {
            pattern_line(&mut out, pattern);
        }
    }

    references_section(&mut out, refs);
    out
}

/// Body of the `dependencies` artifact.
pub(super) fn dependencies_body(path: &str, manifest: &ManifestAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Dependencies: {}\n", path);
    let _ = writeln!(out, "Ecosystem: {}", manifest.ecosystem);

    let (dev, runtime): (Vec<&Dependency>, Vec<&Dependency>) =
        manifest.dependencies.iter().partition(|d| d.dev);
    for (heading, group) in [("Runtime", runtime), ("Development", dev)] {
        if group.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n## {} ({})\n", heading, group.len());
        for dep in group {
            let _ = writeln!(out, "- `{}` {}", dep.name, dep.constraint);
        }
    }
    if manifest.dependencies.is_empty() {
        out.push_str("\nNo dependencies declared.\n");
    }
    if let Some(diagnostic) = &manifest.diagnostic {
        let _ = writeln!(out, "\nNote: {}", diagnostic.message);
    }
    out
}

/// Body of the minimal artifact for an unrecognized file.
pub(super) fn presence_body(input: &SynthesisInput<'_>) -> String {
    format!(
        "# {}\n\nUnrecognized file, {} bytes. No entities extracted.\n",
        input.path, input.size
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_python() {
        let text = "# header\n\nimport os\n# note\nx = 1\n";
        let m = FileMetrics::measure(text, Language::Python);
        assert_eq!(m, FileMetrics { lines: 5, non_empty: 4, comments: 2 });
    }

    #[test]
    fn test_metrics_block_comments() {
        let text = "/*\n * Licensed\n */\nint main() {}\n// done\n";
        let m = FileMetrics::measure(text, Language::C);
        assert_eq!(m.comments, 4);
        assert_eq!(m.non_empty, 5);
    }

    #[test]
    fn test_directory_role() {
        assert_eq!(DirectoryRole::of("setup.py"), DirectoryRole::Root);
        assert_eq!(DirectoryRole::of("src/lib.rs"), DirectoryRole::Source);
        assert_eq!(DirectoryRole::of("tests/test_a.py"), DirectoryRole::Tests);
        assert_eq!(DirectoryRole::of("docs/index.md"), DirectoryRole::Documentation);
        assert_eq!(DirectoryRole::of("misc/x.txt"), DirectoryRole::Other);
    }

    #[test]
    fn test_summary_takes_first_paragraph() {
        assert_eq!(summary("Load the\n  config.\n\nMore detail."), "Load the config.");
    }
}
