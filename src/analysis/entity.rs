//! Normalized code entities produced by the structural extractors.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Inclusive, 1-indexed line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        let start = start.max(1);
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Create a span from a tree-sitter node.
    #[cfg(feature = "tree-sitter")]
    pub fn from_node(node: tree_sitter::Node) -> Self {
        // tree-sitter rows are 0-indexed
        Self::new(node.start_position().row + 1, node.end_position().row + 1)
    }

    pub fn lines(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, other: &LineSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Shrink this span so it lies within `outer`.
    pub fn clamp_to(&self, outer: &LineSpan) -> LineSpan {
        let start = self.start.clamp(outer.start, outer.end);
        let end = self.end.clamp(start, outer.end);
        LineSpan { start, end }
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "L{}", self.start)
        } else {
            write!(f, "L{}-L{}", self.start, self.end)
        }
    }
}

/// Kind of code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Module,
    Class,
    Function,
    Import,
    CommentBlock,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Module => "module",
            EntityKind::Class => "class",
            EntityKind::Function => "function",
            EntityKind::Import => "import",
            EntityKind::CommentBlock => "comment-block",
        }
    }

    /// Kinds that own a body and may hold nested entities.
    pub fn is_container(&self) -> bool {
        matches!(self, EntityKind::Module | EntityKind::Class)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structural unit of source code.
///
/// A module owns its top-level entities and a class owns its methods.
/// Entities are rebuilt from file content on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntity {
    pub kind: EntityKind,
    pub name: String,
    /// Path of the containing file, relative to the scan root.
    pub file: String,
    pub span: LineSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Decorator or attribute markers, without the leading sigil.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    /// Base classes or implemented interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    /// Capitalized identifiers referenced in the body, with counts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CodeEntity>,
}

impl CodeEntity {
    pub fn new(kind: EntityKind, name: impl Into<String>, file: impl Into<String>, span: LineSpan) -> Self {
        Self {
            kind,
            name: name.into(),
            file: file.into(),
            span,
            signature: None,
            doc: None,
            decorators: Vec::new(),
            bases: Vec::new(),
            references: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// The module entity that roots a file's entity tree.
    pub fn module(file: &str, text: &str) -> Self {
        let name = module_name(file);
        Self::new(EntityKind::Module, name, file, LineSpan::new(1, line_count(text)))
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        let signature = signature.into();
        if !signature.is_empty() {
            self.signature = Some(signature);
        }
        self
    }

    pub fn with_doc(mut self, doc: Option<String>) -> Self {
        self.doc = doc.filter(|d| !d.trim().is_empty());
        self
    }

    /// Children of the given kind, in source order.
    pub fn children_of(&self, kind: EntityKind) -> impl Iterator<Item = &CodeEntity> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    /// Methods of a class, or top-level functions of a module.
    pub fn functions(&self) -> impl Iterator<Item = &CodeEntity> {
        self.children_of(EntityKind::Function)
    }

    pub fn classes(&self) -> impl Iterator<Item = &CodeEntity> {
        self.children_of(EntityKind::Class)
    }

    pub fn imports(&self) -> impl Iterator<Item = &CodeEntity> {
        self.children_of(EntityKind::Import)
    }

    /// Depth-first iteration over this entity and all descendants.
    pub fn walk(&self) -> Vec<&CodeEntity> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(entity) = stack.pop() {
            out.push(entity);
            for child in entity.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// All functions in the tree: top-level functions and methods.
    pub fn all_functions(&self) -> Vec<&CodeEntity> {
        self.walk()
            .into_iter()
            .filter(|e| e.kind == EntityKind::Function)
            .collect()
    }

    pub fn all_classes(&self) -> Vec<&CodeEntity> {
        self.walk()
            .into_iter()
            .filter(|e| e.kind == EntityKind::Class)
            .collect()
    }

    pub fn to_ref(&self) -> EntityRef {
        EntityRef {
            file: self.file.clone(),
            name: self.name.clone(),
            line: self.span.start,
        }
    }

    /// Restore the nesting invariant: children sorted by position and
    /// contained in their parent, the root contained in the file.
    pub fn normalize(&mut self, file_span: &LineSpan) {
        self.span = self.span.clamp_to(file_span);
        let outer = self.span;
        self.children
            .sort_by(|a, b| a.span.start.cmp(&b.span.start).then(a.span.end.cmp(&b.span.end)));
        for child in &mut self.children {
            child.normalize(&outer);
        }
    }
}

/// Reference to an entity used as pattern evidence.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub file: String,
    pub name: String,
    pub line: usize,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.file, self.line, self.name)
    }
}

/// Number of lines in `text`, as an editor would count them.
pub fn line_count(text: &str) -> usize {
    text.lines().count()
}

/// Module name for a relative path: the file name without its extension.
pub fn module_name(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

lazy_static! {
    static ref TYPE_IDENT: Regex = Regex::new(r"\b[A-Z][A-Za-z0-9_]*\b").unwrap();
}

/// Count capitalized identifiers in `text`, skipping `own_name` and
/// all-caps constants.
pub fn collect_type_references(text: &str, own_name: &str) -> BTreeMap<String, usize> {
    let mut refs = BTreeMap::new();
    for m in TYPE_IDENT.find_iter(text) {
        let ident = m.as_str();
        if ident == own_name || ident.len() < 2 {
            continue;
        }
        if ident.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
            continue;
        }
        *refs.entry(ident.to_string()).or_insert(0) += 1;
    }
    refs
}
