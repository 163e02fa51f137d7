//! Per-file analysis: classify, extract, recognize, synthesize.
//!
//! Depends only on the file's path, content and the read-only config, so
//! files can be analyzed on any worker in any order.

use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::analysis::{CodeEntity, Extraction, Extractor};
use crate::config::SyncConfig;
use crate::deps::{analyze_manifest, ManifestAnalysis};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::docs::{synthesize, Artifact, SynthesisInput};
use crate::error::StoreError;
use crate::lang::{classify, is_binary, Language};
use crate::patterns::{recognize_file, Pattern};

/// Everything produced for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileAnalysis {
    pub path: String,
    pub language: Language,
    pub extractor: &'static str,
    pub size: u64,
    pub fingerprint: String,
    pub module: CodeEntity,
    pub patterns: Vec<Pattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ManifestAnalysis>,
    /// Artifacts with the digest of their rendered content.
    pub artifacts: Vec<(Artifact, String)>,
    pub provides: BTreeSet<String>,
    pub links: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileAnalysis {
    pub fn is_degraded(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ParseDegraded)
    }
}

/// Analyze one file's content. Only rendering artifacts can fail.
pub fn analyze_file(
    path: &str,
    content: &[u8],
    fingerprint: String,
    config: &SyncConfig,
) -> Result<FileAnalysis, StoreError> {
    let language = classify(path, content);
    let extractor = Extractor::for_language(language);
    // Binary files are documented by presence only.
    let binary = is_binary(content);
    let text = if binary {
        Cow::Borrowed("")
    } else {
        String::from_utf8_lossy(content)
    };
    let extraction = if binary {
        Extraction {
            module: CodeEntity::module(path, ""),
            degraded: None,
        }
    } else {
        extractor.extract(path, &text)
    };

    let mut diagnostics = Vec::new();
    if let Some(reason) = &extraction.degraded {
        diagnostics.push(Diagnostic::new(path, DiagnosticKind::ParseDegraded, reason.clone()));
    }

    let manifest = if binary { None } else { analyze_manifest(path, &text) };
    if let Some(diagnostic) = manifest.as_ref().and_then(|m| m.diagnostic.clone()) {
        diagnostics.push(diagnostic);
    }

    let patterns = recognize_file(&extraction.module, &text, language, &config.patterns);

    let input = SynthesisInput {
        path,
        language,
        size: content.len() as u64,
        text: &text,
        module: &extraction.module,
        patterns: &patterns,
        manifest: manifest.as_ref(),
        degraded: extraction.degraded.as_deref(),
    };
    let provides = input.provides();
    let links = input.cross_references();
    let artifacts = synthesize(&input, config.granularity)
        .into_iter()
        .map(|artifact| {
            let digest = artifact.digest()?;
            Ok((artifact, digest))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    tracing::debug!(
        path,
        language = %language,
        extractor = extractor.name(),
        entities = extraction.module.walk().len().saturating_sub(1),
        artifacts = artifacts.len(),
        "analyzed file"
    );

    diagnostics.sort();
    Ok(FileAnalysis {
        path: path.to_string(),
        language,
        extractor: extractor.name(),
        size: content.len() as u64,
        fingerprint,
        module: extraction.module,
        patterns,
        manifest,
        artifacts,
        provides,
        links,
        diagnostics,
    })
}
