//! Structural extraction of code entities.
//!
//! Every file is reduced to a tree of [`CodeEntity`] values rooted at a
//! module entity. Two extractors implement the same contract:
//!
//! - **Precise**: tree-sitter grammar (Python, behind the `tree-sitter`
//!   feature). Captures signatures, docstrings and decorators.
//! - **Heuristic**: line and regex patterns for every other language,
//!   including plain text where only comment blocks are found.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌──────────────┐
//! │ Language     │────▶│ Extractor          │────▶│ Extraction   │
//! │ (classifier) │     │ Precise|Heuristic  │     │ module tree, │
//! └──────────────┘     └────────────────────┘     │ degraded?    │
//!                                                 └──────────────┘
//! ```
//!
//! Extraction never fails. Content that cannot be fully structured yields a
//! best-effort tree with `degraded` set, which the sync engine reports as a
//! `parse-degraded` diagnostic.

mod entity;
mod heuristic;
#[cfg(feature = "tree-sitter")]
mod python;

pub use entity::{
    collect_type_references, line_count, module_name, CodeEntity, EntityKind, EntityRef, LineSpan,
};

use crate::lang::{Language, Tier};

/// Result of extracting one file.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Module entity owning all top-level entities.
    pub module: CodeEntity,
    /// Reason the result is incomplete, if it is.
    pub degraded: Option<String>,
}

impl Extraction {
    /// Top-level entities in source order.
    pub fn entities(&self) -> &[CodeEntity] {
        &self.module.children
    }
}

/// The closed set of structural extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Precise,
    Heuristic(Language),
}

impl Extractor {
    /// Select the extractor for a classified language.
    pub fn for_language(language: Language) -> Self {
        match language.tier() {
            Tier::Primary => Extractor::Precise,
            _ => Extractor::Heuristic(language),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Extractor::Precise => "precise",
            Extractor::Heuristic(_) => "heuristic",
        }
    }

    pub fn extract(&self, path: &str, text: &str) -> Extraction {
        match self {
            #[cfg(feature = "tree-sitter")]
            Extractor::Precise => python::extract(path, text),
            #[cfg(not(feature = "tree-sitter"))]
            Extractor::Precise => heuristic::extract(path, text, Language::Python),
            Extractor::Heuristic(language) => heuristic::extract(path, text, *language),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_selection() {
        assert_eq!(
            Extractor::for_language(Language::Go),
            Extractor::Heuristic(Language::Go)
        );
        assert_eq!(
            Extractor::for_language(Language::Unknown),
            Extractor::Heuristic(Language::Unknown)
        );
        #[cfg(feature = "tree-sitter")]
        assert_eq!(Extractor::for_language(Language::Python), Extractor::Precise);
    }

    #[test]
    fn test_spans_stay_within_file() {
        let sources = [
            ("a.py", Language::Python, "class A:\n    def f(self):\n        pass\n"),
            ("a.ts", Language::TypeScript, "export class A {\n  run(): void {\n  }\n"),
            ("a.rb", Language::Ruby, "class A\n  def f\n  end\nend\n"),
            ("a.txt", Language::Unknown, "# one\n# two\n"),
        ];
        for (path, language, text) in sources {
            let extraction = Extractor::for_language(language).extract(path, text);
            let lines = line_count(text);
            for entity in extraction.module.walk() {
                assert!(entity.span.end <= lines.max(1), "{} escapes {}", entity.name, path);
                for child in &entity.children {
                    assert!(entity.span.contains(&child.span), "{} not nested in {}", child.name, entity.name);
                }
            }
        }
    }
}
