//! Pattern recognition over extracted entities.
//!
//! Two passes share the same output type:
//! - [`recognize_file`] runs naming and structural checks on one file.
//! - [`recognize_tree`] runs convention checks across every file in view.
//!   It is a pure pass over entities already in memory and never reads
//!   files.
//!
//! Every [`Pattern`] carries the entities that triggered it so results can
//! be audited rather than taken as bare labels.

mod naming;
mod structure;
mod tree;

pub use naming::{classify_name, NamingStyle};
pub use structure::{design_hints, recognize_file};
pub use tree::{recognize_tree, FileView};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::analysis::EntityRef;

/// Upper bound on evidence entries kept per pattern; notes carry full counts.
pub const MAX_EVIDENCE: usize = 25;

/// Category of a recognized pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    NamingConvention,
    StructuralPattern,
    AntiPattern,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::NamingConvention => "naming-convention",
            PatternKind::StructuralPattern => "structural-pattern",
            PatternKind::AntiPattern => "anti-pattern",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recognized convention, design pattern, or smell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub label: String,
    /// Entities that triggered the match (references, not ownership).
    pub evidence: Vec<EntityRef>,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f64,
    pub note: String,
}

impl Pattern {
    pub fn new(kind: PatternKind, label: impl Into<String>, evidence: Vec<EntityRef>) -> Self {
        Self {
            kind,
            label: label.into(),
            evidence,
            confidence: 1.0,
            note: String::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Evidence capped at [`MAX_EVIDENCE`] entries.
    fn capped(mut self) -> Self {
        self.evidence.sort();
        self.evidence.dedup();
        self.evidence.truncate(MAX_EVIDENCE);
        self
    }
}

/// Deterministic ordering used for every pattern list.
pub fn sort_patterns(patterns: &mut [Pattern]) {
    patterns.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| a.label.cmp(&b.label))
            .then_with(|| a.evidence.cmp(&b.evidence))
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
    });
}

/// Thresholds for structural checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    /// Minimum function names before a naming convention is claimed.
    pub min_naming_samples: usize,
    /// Maximum top-level classes and functions per module.
    pub max_module_entities: usize,
    /// Maximum lines per module.
    pub max_module_lines: usize,
    /// Maximum methods per class.
    pub max_class_methods: usize,
    /// Maximum lines per function.
    pub max_function_lines: usize,
    /// References from one class to another before flagging aggregation.
    pub aggregation_min_references: usize,
    /// Files that must share a design hint before it counts as recurring.
    pub min_occurrences: usize,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            min_naming_samples: 2,
            max_module_entities: 30,
            max_module_lines: 1000,
            max_class_methods: 20,
            max_function_lines: 100,
            aggregation_min_references: 3,
            min_occurrences: 2,
        }
    }
}

impl PatternThresholds {
    /// Tighter limits for young codebases.
    pub fn strict() -> Self {
        Self {
            max_module_entities: 20,
            max_module_lines: 500,
            max_class_methods: 15,
            max_function_lines: 50,
            ..Self::default()
        }
    }

    /// Looser limits for large, mature codebases.
    pub fn relaxed() -> Self {
        Self {
            max_module_entities: 50,
            max_module_lines: 2000,
            max_class_methods: 30,
            max_function_lines: 200,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(name: &str) -> Vec<EntityRef> {
        vec![EntityRef {
            file: "a.py".into(),
            name: name.into(),
            line: 1,
        }]
    }

    #[test]
    fn test_sort_patterns_is_stable_by_kind_then_label() {
        let mut patterns = vec![
            Pattern::new(PatternKind::AntiPattern, "god class", evidence("A")),
            Pattern::new(PatternKind::NamingConvention, "snake", evidence("f")),
            Pattern::new(PatternKind::AntiPattern, "long function", evidence("g")),
        ];
        sort_patterns(&mut patterns);
        let labels: Vec<_> = patterns.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["snake", "god class", "long function"]);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let p = Pattern::new(PatternKind::StructuralPattern, "x", Vec::new()).with_confidence(1.7);
        assert_eq!(p.confidence, 1.0);
    }

    #[test]
    fn test_threshold_presets() {
        assert!(PatternThresholds::strict().max_class_methods < PatternThresholds::default().max_class_methods);
        assert!(PatternThresholds::relaxed().max_function_lines > PatternThresholds::default().max_function_lines);
    }
}
