//! Precise Python extraction using tree-sitter.

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language as Grammar, Node, Parser, Query, QueryCursor};

use super::entity::{collect_type_references, CodeEntity, EntityKind, LineSpan};
use super::{heuristic, Extraction};
use crate::lang::Language;

/// Tree-sitter query for module-level imports.
const IMPORT_QUERY: &str = r#"
; import module
(import_statement
  name: (dotted_name) @module)

; import module as alias
(import_statement
  name: (aliased_import
    name: (dotted_name) @module))

; from module import name
(import_from_statement
  module_name: (dotted_name) @module)

; from . import name (relative imports)
(import_from_statement
  module_name: (relative_import) @module)
"#;

static GRAMMAR: Lazy<Grammar> = Lazy::new(|| tree_sitter_python::LANGUAGE.into());

static IMPORTS: Lazy<Option<Query>> = Lazy::new(|| match Query::new(&GRAMMAR, IMPORT_QUERY) {
    Ok(query) => Some(query),
    Err(e) => {
        tracing::warn!(error = %e, "python import query failed to compile");
        None
    }
});

/// Extract a Python module's entity tree.
///
/// Syntax errors never fail extraction. Definitions inside `ERROR` nodes
/// are recovered, the heuristic extractor is consulted as a second opinion,
/// and the result is marked degraded.
pub fn extract(path: &str, text: &str) -> Extraction {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&GRAMMAR) {
        return fallback(path, text, format!("python grammar unavailable: {}", e));
    }
    let Some(tree) = parser.parse(text, None) else {
        return fallback(path, text, "parser produced no syntax tree".to_string());
    };

    let root = tree.root_node();
    let walker = Walker {
        path,
        source: text.as_bytes(),
    };

    let mut module = CodeEntity::module(path, text);
    module.doc = docstring(Some(root), walker.source);
    module.children = walker.items(root, false);
    module.children.extend(walker.imports(root));
    let file_span = module.span;
    module.normalize(&file_span);

    if !root.has_error() {
        return Extraction {
            module,
            degraded: None,
        };
    }

    let reason = match first_error_row(root) {
        Some(row) => format!("syntax error near line {}", row + 1),
        None => "syntax error".to_string(),
    };
    let recovered = heuristic::extract(path, text, Language::Python);
    let module = if recovered.module.walk().len() > module.walk().len() {
        recovered.module
    } else {
        module
    };
    Extraction {
        module,
        degraded: Some(reason),
    }
}

fn fallback(path: &str, text: &str, reason: String) -> Extraction {
    let mut extraction = heuristic::extract(path, text, Language::Python);
    extraction.degraded = Some(reason);
    extraction
}

fn first_error_row(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_row)
}

struct Walker<'a> {
    path: &'a str,
    source: &'a [u8],
}

impl<'a> Walker<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    /// Definitions and comment blocks directly inside a module, class body
    /// or error node.
    fn items(&self, container: Node, in_class: bool) -> Vec<CodeEntity> {
        let mut cursor = container.walk();
        let children: Vec<Node> = container.named_children(&mut cursor).collect();

        let mut out = Vec::new();
        let mut comments: Vec<Node> = Vec::new();

        for child in children {
            let definition = match child.kind() {
                "comment" => {
                    let adjacent = comments
                        .last()
                        .map(|prev| prev.end_position().row + 1 == child.start_position().row)
                        .unwrap_or(true);
                    if !adjacent {
                        self.flush_comments(&mut comments, &mut out, in_class);
                    }
                    comments.push(child);
                    continue;
                }
                "function_definition" => Some(self.function(child, Vec::new(), child)),
                "class_definition" => Some(self.class(child, Vec::new(), child)),
                "decorated_definition" => self.decorated(child),
                "ERROR" => {
                    self.flush_comments(&mut comments, &mut out, in_class);
                    out.extend(self.items(child, in_class));
                    continue;
                }
                _ => None,
            };

            match definition {
                Some(mut entity) => {
                    let leading = comments
                        .last()
                        .map(|c| c.end_position().row + 1 == child.start_position().row)
                        .unwrap_or(false);
                    if leading && entity.doc.is_none() {
                        entity.doc = Some(self.comment_text(&comments)).filter(|d| !d.is_empty());
                        comments.clear();
                    } else {
                        self.flush_comments(&mut comments, &mut out, in_class);
                    }
                    out.push(entity);
                }
                None => self.flush_comments(&mut comments, &mut out, in_class),
            }
        }
        self.flush_comments(&mut comments, &mut out, in_class);
        out
    }

    fn flush_comments(&self, comments: &mut Vec<Node>, out: &mut Vec<CodeEntity>, in_class: bool) {
        if comments.len() >= 2 && !in_class {
            let (Some(first), Some(last)) = (comments.first(), comments.last()) else {
                return;
            };
            let text = self.comment_text(comments);
            let name = text.lines().next().unwrap_or("").chars().take(48).collect::<String>();
            let span = LineSpan::new(first.start_position().row + 1, last.end_position().row + 1);
            let mut entity = CodeEntity::new(EntityKind::CommentBlock, name, self.path, span);
            entity.doc = Some(text).filter(|t| !t.is_empty());
            out.push(entity);
        }
        comments.clear();
    }

    fn comment_text(&self, comments: &[Node]) -> String {
        comments
            .iter()
            .map(|c| self.text(*c).trim_start_matches('#').trim())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    fn decorated(&self, node: Node) -> Option<CodeEntity> {
        let definition = node.child_by_field_name("definition")?;
        let mut cursor = node.walk();
        let decorators: Vec<String> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .map(|c| collapse(self.text(c).trim_start_matches('@')))
            .collect();

        match definition.kind() {
            "function_definition" => Some(self.function(definition, decorators, node)),
            "class_definition" => Some(self.class(definition, decorators, node)),
            _ => None,
        }
    }

    /// `outer` is the node whose span the entity covers, which includes
    /// decorators when present.
    fn function(&self, node: Node, decorators: Vec<String>, outer: Node) -> CodeEntity {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or("<anonymous>");
        let params = node
            .child_by_field_name("parameters")
            .map(|n| collapse(self.text(n)))
            .unwrap_or_else(|| "()".to_string());
        let returns = node
            .child_by_field_name("return_type")
            .map(|n| format!(" -> {}", collapse(self.text(n))))
            .unwrap_or_default();
        let is_async = node.child(0).map(|c| c.kind() == "async").unwrap_or(false);
        let signature = format!(
            "{}def {}{}{}",
            if is_async { "async " } else { "" },
            name,
            params,
            returns
        );

        let mut entity = CodeEntity::new(EntityKind::Function, name, self.path, LineSpan::from_node(outer))
            .with_signature(signature)
            .with_doc(docstring(node.child_by_field_name("body"), self.source));
        entity.decorators = decorators;
        entity.references = collect_type_references(self.text(node), name);
        entity
    }

    fn class(&self, node: Node, decorators: Vec<String>, outer: Node) -> CodeEntity {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or("<anonymous>");

        let mut bases = Vec::new();
        let mut signature = format!("class {}", name);
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            signature.push_str(&collapse(self.text(superclasses)));
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if matches!(base.kind(), "identifier" | "attribute" | "subscript") {
                    let text = self.text(base);
                    let text = text.split('[').next().unwrap_or(text).trim();
                    if text != "object" {
                        bases.push(text.to_string());
                    }
                }
            }
        }

        let body = node.child_by_field_name("body");
        let mut entity = CodeEntity::new(EntityKind::Class, name, self.path, LineSpan::from_node(outer))
            .with_signature(signature)
            .with_doc(docstring(body, self.source));
        entity.decorators = decorators;
        entity.bases = bases;
        entity.references = collect_type_references(self.text(node), name);
        if let Some(body) = body {
            entity.children = self
                .items(body, true)
                .into_iter()
                .filter(|e| matches!(e.kind, EntityKind::Function | EntityKind::Class))
                .collect();
        }
        entity
    }

    /// Module-level import statements, one entity per imported module.
    fn imports(&self, root: Node) -> Vec<CodeEntity> {
        let Some(query) = IMPORTS.as_ref() else {
            return Vec::new();
        };

        let mut entities = Vec::new();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, self.source);
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let Some(statement) = statement_of(capture.node) else {
                    continue;
                };
                let top_level = statement
                    .parent()
                    .map(|p| matches!(p.kind(), "module" | "ERROR"))
                    .unwrap_or(false);
                if !top_level {
                    continue;
                }
                let entity = CodeEntity::new(
                    EntityKind::Import,
                    self.text(capture.node),
                    self.path,
                    LineSpan::from_node(statement),
                )
                .with_signature(collapse(self.text(statement)));
                entities.push(entity);
            }
        }
        entities
    }
}

fn statement_of(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if matches!(n.kind(), "import_statement" | "import_from_statement") {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Docstring of a module or block: a string literal as its first statement.
fn docstring(body: Option<Node>, source: &[u8]) -> Option<String> {
    let body = body?;
    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0).filter(|n| n.kind() == "string")?;
    let raw = string.utf8_text(source).ok()?;
    Some(clean_docstring(raw)).filter(|d| !d.is_empty())
}

fn clean_docstring(raw: &str) -> String {
    let unprefixed = raw.trim_start_matches(['r', 'R', 'b', 'B', 'u', 'U', 'f', 'F']);
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| unprefixed.strip_prefix(q).and_then(|s| s.strip_suffix(q)))
        .unwrap_or(unprefixed);
    inner
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Collapse runs of whitespace, so multi-line headers render on one line.
fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#""""Order processing."""

import os
from typing import List
import json as j

# Shared helpers below.
# Kept small on purpose.


@dataclass
class Order(Base, metaclass=Meta):
    """An order."""

    def __init__(self, items: List[Item]) -> None:
        self.items = items

    @property
    def total(self):
        """Sum of item prices."""
        return sum(i.price for i in self.items)


async def fetch(url,
                timeout=5) -> bytes:
    import local_only
    return b""
"#;

    #[test]
    fn test_extracts_module_structure() {
        let result = extract("orders.py", SAMPLE);
        assert!(result.degraded.is_none());

        let module = &result.module;
        assert_eq!(module.name, "orders");
        assert_eq!(module.doc.as_deref(), Some("Order processing."));

        let imports: Vec<_> = module.imports().map(|i| i.name.as_str()).collect();
        assert_eq!(imports, vec!["os", "typing", "json"]);

        let comments: Vec<_> = module.children_of(EntityKind::CommentBlock).collect();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].span, LineSpan::new(7, 8));
    }

    #[test]
    fn test_class_with_methods_and_decorators() {
        let result = extract("orders.py", SAMPLE);
        let order = result.module.classes().next().expect("class Order");

        assert_eq!(order.name, "Order");
        assert_eq!(order.decorators, vec!["dataclass"]);
        assert_eq!(order.bases, vec!["Base"]);
        assert_eq!(order.doc.as_deref(), Some("An order."));
        assert_eq!(order.signature.as_deref(), Some("class Order(Base, metaclass=Meta)"));
        assert_eq!(order.span.start, 11);

        let methods: Vec<_> = order.functions().map(|f| f.name.as_str()).collect();
        assert_eq!(methods, vec!["__init__", "total"]);

        let init = order.functions().next().unwrap();
        assert_eq!(
            init.signature.as_deref(),
            Some("def __init__(self, items: List[Item]) -> None")
        );
        assert_eq!(init.references.get("Item"), Some(&1));

        let total = order.functions().nth(1).unwrap();
        assert_eq!(total.decorators, vec!["property"]);
        assert_eq!(total.doc.as_deref(), Some("Sum of item prices."));
        for method in order.functions() {
            assert!(order.span.contains(&method.span));
        }
    }

    #[test]
    fn test_async_multiline_signature() {
        let result = extract("orders.py", SAMPLE);
        let fetch = result.module.functions().next().expect("fetch");
        assert_eq!(
            fetch.signature.as_deref(),
            Some("async def fetch(url, timeout=5) -> bytes")
        );
        // Function-local imports are not module imports.
        assert!(result.module.imports().all(|i| i.name != "local_only"));
    }

    #[test]
    fn test_syntax_error_degrades() {
        let source = "def ok():\n    return 1\n\ndef broken(:\n    pass\n";
        let result = extract("broken.py", source);
        assert!(result.degraded.is_some());
        assert!(result.module.functions().any(|f| f.name == "ok"));
        for entity in result.module.walk() {
            assert!(entity.span.end <= 5);
        }
    }

    #[test]
    fn test_empty_module() {
        let result = extract("empty.py", "");
        assert!(result.degraded.is_none());
        assert!(result.module.children.is_empty());
    }

    #[test]
    fn test_clean_docstring() {
        assert_eq!(clean_docstring("\"\"\"\n    Hello.\n    World.\n    \"\"\""), "Hello.\nWorld.");
        assert_eq!(clean_docstring("r'raw'"), "raw");
    }
}
