//! Identifier casing classification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::analysis::CodeEntity;

/// Casing style of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStyle {
    SnakeCase,
    CamelCase,
    PascalCase,
    ScreamingSnakeCase,
    /// Single lowercase word; compatible with snake_case and camelCase.
    Lowercase,
    Other,
}

impl NamingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingStyle::SnakeCase => "snake_case",
            NamingStyle::CamelCase => "camelCase",
            NamingStyle::PascalCase => "PascalCase",
            NamingStyle::ScreamingSnakeCase => "SCREAMING_SNAKE_CASE",
            NamingStyle::Lowercase => "lowercase",
            NamingStyle::Other => "other",
        }
    }

    /// Whether a name of this style conforms to `dominant`.
    pub fn conforms_to(&self, dominant: NamingStyle) -> bool {
        *self == dominant
            || (*self == NamingStyle::Lowercase
                && matches!(dominant, NamingStyle::SnakeCase | NamingStyle::CamelCase))
    }
}

impl fmt::Display for NamingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify an identifier. Dunder names and names without letters have no
/// meaningful style and return `None`.
pub fn classify_name(name: &str) -> Option<NamingStyle> {
    if name.starts_with("__") && name.ends_with("__") {
        return None;
    }
    let core = name.trim_matches('_');
    let first = core.chars().next()?;
    if !core.chars().any(|c| c.is_alphabetic()) {
        return None;
    }

    let has_upper = core.chars().any(|c| c.is_uppercase());
    let has_lower = core.chars().any(|c| c.is_lowercase());
    let style = if core.contains('_') {
        if !has_upper {
            NamingStyle::SnakeCase
        } else if !has_lower {
            NamingStyle::ScreamingSnakeCase
        } else {
            NamingStyle::Other
        }
    } else if first.is_lowercase() {
        if has_upper {
            NamingStyle::CamelCase
        } else {
            NamingStyle::Lowercase
        }
    } else if first.is_uppercase() {
        if has_lower {
            NamingStyle::PascalCase
        } else if core.chars().count() > 1 {
            NamingStyle::ScreamingSnakeCase
        } else {
            NamingStyle::PascalCase
        }
    } else {
        NamingStyle::Other
    };
    Some(style)
}

/// Function names that participate in naming checks, with their style.
///
/// Constructors named after their class are excluded since their casing is
/// dictated by the class name.
pub(crate) fn function_styles(module: &CodeEntity) -> Vec<(&CodeEntity, NamingStyle)> {
    let mut out = Vec::new();
    collect_function_styles(module, None, &mut out);
    out
}

fn collect_function_styles<'a>(
    entity: &'a CodeEntity,
    class_name: Option<&str>,
    out: &mut Vec<(&'a CodeEntity, NamingStyle)>,
) {
    for child in &entity.children {
        match child.kind {
            crate::analysis::EntityKind::Function => {
                if Some(child.name.as_str()) == class_name || child.name == "constructor" {
                    continue;
                }
                if let Some(style) = classify_name(&child.name) {
                    out.push((child, style));
                }
            }
            crate::analysis::EntityKind::Class => {
                collect_function_styles(child, Some(&child.name), out);
            }
            _ => {}
        }
    }
}

/// The dominant style among `styles`: the most frequent non-lowercase style,
/// falling back to lowercase when every name is a single word. Ties break
/// by style order.
pub(crate) fn dominant_style(styles: &[NamingStyle]) -> Option<NamingStyle> {
    let mut counts: BTreeMap<NamingStyle, usize> = BTreeMap::new();
    for style in styles {
        *counts.entry(*style).or_insert(0) += 1;
    }
    let best = counts
        .iter()
        .filter(|(style, _)| **style != NamingStyle::Lowercase)
        .fold(None, |best: Option<(NamingStyle, usize)>, (style, count)| match best {
            Some((_, n)) if n >= *count => best,
            _ => Some((*style, *count)),
        });
    match best {
        Some((style, _)) => Some(style),
        None if counts.contains_key(&NamingStyle::Lowercase) => Some(NamingStyle::Lowercase),
        None => None,
    }
}
