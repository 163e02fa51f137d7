//! Output formatting for sync and inspect results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::Serialize;

use crate::analysis::{CodeEntity, EntityKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::patterns::{Pattern, PatternKind};
use crate::sync::{FileAnalysis, OperationKind, RunReport};

// =============================================================================
// JSON Format
// =============================================================================

/// JSON envelope for a sync run.
#[derive(Serialize)]
pub struct JsonSyncReport<'a> {
    pub version: &'static str,
    pub config: Option<String>,
    #[serde(flatten)]
    pub report: &'a RunReport,
}

/// Write a sync report in JSON format.
pub fn write_json(report: &RunReport, config_path: Option<&str>) -> anyhow::Result<()> {
    let envelope = JsonSyncReport {
        version: env!("CARGO_PKG_VERSION"),
        config: config_path.map(str::to_string),
        report,
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    println!("{}", json);
    Ok(())
}

/// Write a single-file analysis in JSON format.
pub fn write_inspect_json(analysis: &FileAnalysis) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(analysis)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header() {
    println!();
    print!("  ");
    print!("{}", "codescribe".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();
}

/// Write a sync report in pretty (human-readable) format.
pub fn write_pretty(report: &RunReport, config_path: Option<&str>) {
    write_header();

    print!("  {}", "Syncing:  ".dimmed());
    println!("{}", report.root);
    print!("  {}", "Config:   ".dimmed());
    println!("{}", config_path.unwrap_or("(defaults)"));
    if report.dry_run {
        println!("  {}", "Dry run: nothing was written".yellow());
    }
    println!();

    write_counts(report);
    println!();

    if !report.operations.is_empty() {
        write_operations(report);
        println!();
    }

    if !report.diagnostics.is_empty() {
        write_diagnostics(&report.diagnostics);
        println!();
    }

    if !report.patterns.is_empty() {
        println!("  {} ({}):", "Cross-file patterns".bold(), report.patterns.len());
        println!();
        write_patterns(&report.patterns);
        println!();
    } else if !report.whole_tree {
        println!(
            "  {}",
            "Cross-file patterns skipped: run with --full to analyze the whole tree".dimmed()
        );
        println!();
    }

    if !report.pending_links.is_empty() {
        println!(
            "  {} {}",
            "Pending links:".dimmed(),
            report.pending_links.len().to_string().dimmed()
        );
        println!();
    }
}

fn write_counts(report: &RunReport) {
    let c = &report.counts;
    if c.created + c.updated + c.deleted == 0 {
        print!("  {}", "✓ UP TO DATE".green());
    } else {
        print!("  {}", "✓ SYNCED".green());
    }
    print!(
        "  {} created  {} updated  {} deleted",
        c.created.to_string().green(),
        c.updated.to_string().yellow(),
        c.deleted.to_string().red()
    );
    println!();
    println!(
        "  {}",
        format!(
            "{} files: {} analyzed, {} unchanged, {} removed, {} skipped, {} degraded",
            c.files_scanned, c.analyzed, c.unchanged, c.removed, c.skipped, c.degraded
        )
        .dimmed()
    );
}

fn write_operations(report: &RunReport) {
    println!("  {} ({}):", "Operations".bold(), report.operations.len());
    println!();
    for op in &report.operations {
        match op.kind {
            OperationKind::Create => print!("    {} ", "+".green()),
            OperationKind::Update => print!("    {} ", "~".yellow()),
            OperationKind::Delete => print!("    {} ", "-".red()),
        }
        println!("{}", op.id.blue());
    }
}

fn write_diagnostics(diagnostics: &[Diagnostic]) {
    println!("  {} ({}):", "Diagnostics".bold(), diagnostics.len());
    println!();
    for d in diagnostics {
        write_diagnostic_tag(d.kind);
        print!("   ");
        print!("{:<22}", d.kind.as_str().dimmed());
        println!("{}", d.path.blue());
        println!("            {}", d.message);
    }
}

fn write_diagnostic_tag(kind: DiagnosticKind) {
    if kind.skips_file() {
        print!("    {} ", "SKIP ".red());
    } else {
        print!("    {} ", "WARN ".yellow());
    }
}

fn write_patterns(patterns: &[Pattern]) {
    for p in patterns {
        match p.kind {
            PatternKind::NamingConvention => print!("    {} ", "NAME ".blue()),
            PatternKind::StructuralPattern => print!("    {} ", "SHAPE".green()),
            PatternKind::AntiPattern => print!("    {} ", "SMELL".yellow()),
        }
        print!("{}", p.label);
        println!("{}", format!(" ({:.2})", p.confidence).dimmed());
        println!("            {}", p.note);
        if let Some(first) = p.evidence.first() {
            let more = p.evidence.len() - 1;
            let suffix = if more > 0 {
                format!(" and {} more", more)
            } else {
                String::new()
            };
            println!("            {}", format!("at {}{}", first, suffix).dimmed());
        }
    }
}

/// Write a single-file analysis in pretty format.
pub fn write_inspect_pretty(analysis: &FileAnalysis) {
    write_header();

    print!("  {}", "File:      ".dimmed());
    println!("{}", analysis.path);
    print!("  {}", "Language:  ".dimmed());
    println!("{} ({} extractor)", analysis.language, analysis.extractor);
    print!("  {}", "Size:      ".dimmed());
    println!("{} bytes", analysis.size);
    print!("  {}", "Fingerprint".dimmed());
    println!(" {}", analysis.fingerprint);
    println!();

    if !analysis.module.children.is_empty() {
        println!("  {}:", "Entities".bold());
        println!();
        for entity in &analysis.module.children {
            write_entity(entity, 2);
        }
        println!();
    }

    if !analysis.patterns.is_empty() {
        println!("  {} ({}):", "Patterns".bold(), analysis.patterns.len());
        println!();
        write_patterns(&analysis.patterns);
        println!();
    }

    if let Some(manifest) = &analysis.manifest {
        println!(
            "  {} ({}, {}):",
            "Dependencies".bold(),
            manifest.ecosystem,
            manifest.dependencies.len()
        );
        for dep in &manifest.dependencies {
            let scope = if dep.dev { " dev".dimmed() } else { "".normal() };
            println!("    {} {}{}", dep.name, dep.constraint.dimmed(), scope);
        }
        println!();
    }

    if !analysis.diagnostics.is_empty() {
        write_diagnostics(&analysis.diagnostics);
        println!();
    }

    println!("  {} ({}):", "Artifacts".bold(), analysis.artifacts.len());
    for (artifact, digest) in &analysis.artifacts {
        println!("    {} {}", artifact.id.blue(), digest[..12.min(digest.len())].dimmed());
    }
    println!();
}

fn write_entity(entity: &CodeEntity, depth: usize) {
    let indent = "  ".repeat(depth);
    let kind = match entity.kind {
        EntityKind::Class => entity.kind.as_str().green(),
        EntityKind::Function => entity.kind.as_str().cyan(),
        _ => entity.kind.as_str().dimmed(),
    };
    println!("{}{:<14} {} {}", indent, kind, entity.name, entity.span.to_string().dimmed());
    for child in &entity.children {
        write_entity(child, depth + 1);
    }
}
