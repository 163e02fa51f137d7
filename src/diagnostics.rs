//! Per-file, non-fatal diagnostics surfaced at the end of a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// The file could not be read; it keeps its previous sync record.
    Unreadable,
    /// The file exceeds the configured size limit; treated like unreadable.
    Oversized,
    /// Structural extraction produced a best-effort result.
    ParseDegraded,
    /// A manifest could not be turned into dependencies.
    UnsupportedManifest,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Unreadable => "unreadable",
            DiagnosticKind::Oversized => "oversized",
            DiagnosticKind::ParseDegraded => "parse-degraded",
            DiagnosticKind::UnsupportedManifest => "unsupported-manifest",
        }
    }

    /// Skipped files are not regenerated and keep their previous record.
    pub fn skips_file(&self) -> bool {
        matches!(self, DiagnosticKind::Unreadable | DiagnosticKind::Oversized)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single diagnostic attached to a source path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path, self.kind, self.message)
    }
}
