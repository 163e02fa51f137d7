//! Line and regex based structural extraction.
//!
//! Recognizes common declaration keywords across C-like, Python-like and
//! brace-delimited languages. Block extents come from brace depth,
//! indentation, or `end` keywords depending on the language. The scanner
//! under-extracts rather than guessing: a declaration whose body cannot be
//! found is dropped or kept as a one-line entity, and every span is clamped
//! to the file.

use lazy_static::lazy_static;
use regex::Regex;

use super::entity::{collect_type_references, CodeEntity, EntityKind, LineSpan};
use super::Extraction;
use crate::lang::Language;

lazy_static! {
    // Declarations
    static ref PY_CLASS: Regex =
        Regex::new(r"^\s*class\s+([A-Za-z_]\w*)\s*(?:\(([^)]*)\))?\s*:").unwrap();
    static ref PY_DEF: Regex =
        Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap();
    static ref RB_CLASS: Regex =
        Regex::new(r"^\s*(?:class|module)\s+([A-Z][\w:]*)(?:\s*<\s*([\w:]+))?").unwrap();
    static ref RB_DEF: Regex =
        Regex::new(r"^\s*def\s+(?:self\.)?([A-Za-z_]\w*[?!=]?)").unwrap();
    static ref GO_TYPE: Regex =
        Regex::new(r"^\s*type\s+([A-Za-z_]\w*)(?:\[[^\]]*\])?\s+(?:struct|interface)\b").unwrap();
    static ref GO_FUNC: Regex =
        Regex::new(r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*[(\[]").unwrap();
    static ref RUST_TYPE: Regex =
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|union)\s+([A-Za-z_]\w*)").unwrap();
    static ref RUST_IMPL: Regex = Regex::new(
        r"^\s*(?:unsafe\s+)?impl(?:<[^>]*>)?\s+(?:([\w:]+)(?:<[^>]*>)?\s+for\s+)?([A-Za-z_][\w:]*)"
    ).unwrap();
    static ref RUST_FN: Regex = Regex::new(
        r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:const|async|unsafe|extern(?:\s+"[^"]*")?)\s+)*fn\s+([A-Za-z_]\w*)"#
    ).unwrap();
    static ref SHELL_FN: Regex =
        Regex::new(r"^\s*(?:function\s+([A-Za-z_][\w-]*)|([A-Za-z_][\w-]*)\s*\(\s*\))").unwrap();
    static ref CLASS_DECL: Regex = Regex::new(
        r"^\s*(?:(?:export|default|public|private|protected|internal|abstract|final|static|sealed|open|partial|data|typedef|inner|enum)\s+)*(?:class|struct|interface|trait|enum|object|protocol|record)\s+([A-Za-z_]\w*)"
    ).unwrap();
    static ref FUNCTION_KEYWORD: Regex = Regex::new(
        r"^\s*(?:(?:export|default|async|public|private|protected|static|final|abstract)\s+)*function\s*\*?\s*&?([A-Za-z_$][\w$]*)\s*\("
    ).unwrap();
    static ref ARROW_BINDING: Regex = Regex::new(
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)"
    ).unwrap();
    static ref FUN_KEYWORD: Regex = Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|open|override|static|final|inline|suspend|class|mutating|@\w+)\s+)*(?:fun|func)\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?([A-Za-z_]\w*)"
    ).unwrap();
    static ref CLASS_METHOD: Regex = Regex::new(
        r"^\s*(?:(?:public|private|protected|static|async|readonly|get|set|override|abstract)\s+)*\*?([A-Za-z_$#][\w$]*)\s*(?:<[^>]*>)?\s*\([^)]*\)?\s*(?::\s*[^{;=]+)?\{?\s*$"
    ).unwrap();
    static ref C_LIKE_METHOD: Regex = Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|static|final|abstract|synchronized|virtual|override|async|inline|extern|unsafe|native|sealed|constexpr|explicit|friend|default)\s+)*(?:[\w:<>\[\],.*&?]+\s+)+\**&?([A-Za-z_~]\w*)\s*\("
    ).unwrap();
    static ref CONSTRUCTOR: Regex = Regex::new(
        r"^\s*(?:(?:public|private|protected|internal|static|explicit)\s+)*([A-Za-z_]\w*)\s*\("
    ).unwrap();

    // Bases
    static ref EXTENDS: Regex = Regex::new(r"\bextends\s+([\w.]+)").unwrap();
    static ref IMPLEMENTS: Regex = Regex::new(r"\bimplements\s+([\w.,\s]+)").unwrap();
    static ref COLON_BASES: Regex = Regex::new(r"^\s*:\s*([^{]+)").unwrap();

    // Imports
    static ref PY_IMPORT: Regex = Regex::new(r"^import\s+([\w.]+)").unwrap();
    static ref PY_FROM: Regex = Regex::new(r"^from\s+(\.*[\w.]*)\s+import\b").unwrap();
    static ref JS_IMPORT: Regex =
        Regex::new(r#"^(?:import|export)\s+(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap();
    static ref JS_REQUIRE: Regex =
        Regex::new(r#"^(?:(?:const|let|var)\s+[^=]+=\s*)?require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap();
    static ref JVM_IMPORT: Regex = Regex::new(r"^import\s+(?:static\s+)?([\w.]+(?:\.\*)?)").unwrap();
    static ref GO_IMPORT: Regex = Regex::new(r#"^import\s+(?:[\w.]+\s+)?"([^"]+)""#).unwrap();
    static ref GO_IMPORT_SPEC: Regex = Regex::new(r#"^(?:[\w.]+\s+)?"([^"]+)""#).unwrap();
    static ref C_INCLUDE: Regex = Regex::new(r#"^#\s*include\s*[<"]([^>"]+)[>"]"#).unwrap();
    static ref RUST_USE: Regex = Regex::new(r"^(?:pub(?:\([^)]*\))?\s+)?use\s+([\w:]+)").unwrap();
    static ref CS_USING: Regex = Regex::new(r"^using\s+(?:static\s+)?([\w.]+)\s*;").unwrap();
    static ref PHP_USE: Regex = Regex::new(r"^use\s+([\w\\]+)").unwrap();
    static ref PHP_REQUIRE: Regex =
        Regex::new(r#"^(?:require|include)(?:_once)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap();
    static ref RB_REQUIRE: Regex =
        Regex::new(r#"^require(?:_relative)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap();
    static ref SH_SOURCE: Regex = Regex::new(r"^(?:source|\.)\s+(\S+)").unwrap();

    // Markers
    static ref AT_DECORATOR: Regex = Regex::new(r"^@([A-Za-z_][\w.]*(?:\(.*\))?)\s*$").unwrap();
    static ref RUST_ATTRIBUTE: Regex = Regex::new(r"^#!?\[(.+)\]\s*$").unwrap();
    static ref CS_ATTRIBUTE: Regex = Regex::new(r"^\[([A-Z][\w.]*(?:\(.*\))?)\]\s*$").unwrap();
}

/// Identifiers that C-like method patterns can pick up from control flow.
const NOT_A_NAME: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "else", "do", "try", "sizeof",
    "typeof", "function", "await", "yield", "throw", "case", "delete", "using", "lock", "fixed",
    "foreach", "synchronized", "super", "this", "elif", "with",
];

const MAX_SIGNATURE: usize = 160;

/// Extract entities from `text` using line heuristics for `language`.
pub fn extract(path: &str, text: &str, language: Language) -> Extraction {
    let lines: Vec<&str> = text.lines().collect();
    let mut scanner = Scanner::new(path, &lines, language);
    scanner.run();
    scanner.finish(text)
}

struct Decl {
    kind: EntityKind,
    name: String,
    bases: Vec<String>,
    /// Drop the declaration when no body can be found.
    requires_body: bool,
}

struct Flat {
    entity: CodeEntity,
    parent: Option<usize>,
}

struct Open {
    index: usize,
    /// Last line of the block, 0-indexed.
    end: usize,
    kind: EntityKind,
}

struct PendingComment {
    start: usize,
    end: usize,
    text: Vec<String>,
}

struct Scanner<'a> {
    path: &'a str,
    lines: &'a [&'a str],
    language: Language,
    flat: Vec<Flat>,
    open: Vec<Open>,
    comment: Option<PendingComment>,
    decorators: Vec<String>,
    decorator_start: Option<usize>,
    /// Most recent declaration and its header line, for docstrings.
    last_decl: Option<(usize, usize)>,
    module_doc: Option<String>,
    saw_code: bool,
    unbalanced: bool,
    in_go_imports: bool,
}

impl<'a> Scanner<'a> {
    fn new(path: &'a str, lines: &'a [&'a str], language: Language) -> Self {
        Self {
            path,
            lines,
            language,
            flat: Vec::new(),
            open: Vec::new(),
            comment: None,
            decorators: Vec::new(),
            decorator_start: None,
            last_decl: None,
            module_doc: None,
            saw_code: false,
            unbalanced: false,
            in_go_imports: false,
        }
    }

    fn run(&mut self) {
        let mut i = 0;
        while i < self.lines.len() {
            self.close_finished(i);
            let line = self.lines[i];
            let trimmed = line.trim();

            if trimmed.is_empty() || (i == 0 && trimmed.starts_with("#!")) {
                i += 1;
                continue;
            }

            if self.language.has_block_comments() && trimmed.starts_with("/*") {
                let end = self.block_comment(i);
                i = end + 1;
                continue;
            }

            if self.language.is_indent_scoped()
                && (trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''"))
            {
                let end = self.triple_quoted(i);
                i = end + 1;
                continue;
            }

            if let Some(text) = self.line_comment_text(trimmed) {
                self.push_comment(i, i, vec![text]);
                i += 1;
                continue;
            }

            if let Some(marker) = self.match_decorator(trimmed) {
                self.decorator_start.get_or_insert(i);
                self.decorators.push(marker);
                i += 1;
                continue;
            }

            if self.language.is_code() {
                if let Some(decl) = self.match_declaration(line) {
                    if self.add_declaration(i, decl) {
                        self.saw_code = true;
                        i += 1;
                        continue;
                    }
                }
                if self.open.is_empty() {
                    if let Some(module) = self.match_import(trimmed) {
                        self.flush_comment();
                        self.add_import(i, module, trimmed);
                        self.saw_code = true;
                        i += 1;
                        continue;
                    }
                }
            }

            self.flush_comment();
            self.decorators.clear();
            self.decorator_start = None;
            self.last_decl = None;
            self.saw_code = true;
            i += 1;
        }
        self.flush_comment();
    }

    fn finish(self, text: &str) -> Extraction {
        let mut module = CodeEntity::module(self.path, text);
        module.doc = self.module_doc;

        let mut kids: Vec<Vec<usize>> = vec![Vec::new(); self.flat.len()];
        let mut roots = Vec::new();
        let mut slots = Vec::with_capacity(self.flat.len());
        for (i, flat) in self.flat.into_iter().enumerate() {
            match flat.parent {
                Some(p) => kids[p].push(i),
                None => roots.push(i),
            }
            slots.push(Some(flat.entity));
        }
        for root in roots {
            if let Some(entity) = build_tree(root, &mut slots, &kids) {
                module.children.push(entity);
            }
        }

        let file_span = module.span;
        module.normalize(&file_span);

        Extraction {
            module,
            degraded: self
                .unbalanced
                .then(|| "unbalanced braces; block extents clamped to end of file".to_string()),
        }
    }

    fn close_finished(&mut self, line: usize) {
        while let Some(top) = self.open.last() {
            if top.end < line {
                self.open.pop();
            } else {
                break;
            }
        }
    }

    // =========================================================================
    // Comments and markers
    // =========================================================================

    fn line_comment_text(&self, trimmed: &str) -> Option<String> {
        let prefix = self.language.line_comment()?;
        let rest = trimmed.strip_prefix(prefix)?;
        let rest = rest.trim_start_matches(['/', '!', '#']);
        Some(rest.trim().to_string())
    }

    fn block_comment(&mut self, start: usize) -> usize {
        let mut text = Vec::new();
        let mut end = start;
        for (j, line) in self.lines.iter().enumerate().skip(start) {
            end = j;
            let mut body = line.trim();
            if j == start {
                body = body.trim_start_matches("/*").trim_start_matches('*');
            }
            let closes = body.contains("*/");
            let body = body.split("*/").next().unwrap_or("");
            let body = body.trim().trim_start_matches('*').trim();
            if !body.is_empty() {
                text.push(body.to_string());
            }
            if closes {
                break;
            }
        }
        self.push_comment(start, end, text);
        end
    }

    fn triple_quoted(&mut self, start: usize) -> usize {
        let first = self.lines[start].trim();
        let quote = &first[..3];
        let mut text = Vec::new();
        let mut end = self.lines.len().saturating_sub(1);

        let rest = &first[3..];
        if let Some(pos) = rest.find(quote) {
            text.push(rest[..pos].trim().to_string());
            end = start;
        } else {
            if !rest.trim().is_empty() {
                text.push(rest.trim().to_string());
            }
            for (j, line) in self.lines.iter().enumerate().skip(start + 1) {
                if let Some(pos) = line.find(quote) {
                    let tail = line[..pos].trim();
                    if !tail.is_empty() {
                        text.push(tail.to_string());
                    }
                    end = j;
                    break;
                }
                text.push(line.trim().to_string());
            }
        }
        let doc = text.join("\n").trim().to_string();

        if let Some((index, header)) = self.last_decl {
            if start > header && start <= header + 3 && self.flat[index].entity.doc.is_none() {
                self.flat[index].entity.doc = Some(doc).filter(|d| !d.is_empty());
                self.last_decl = None;
                return end;
            }
        }
        if !self.saw_code && self.open.is_empty() && self.module_doc.is_none() {
            self.module_doc = Some(doc).filter(|d| !d.is_empty());
        }
        end
    }

    fn push_comment(&mut self, start: usize, end: usize, text: Vec<String>) {
        if let Some(pending) = self.comment.as_mut() {
            if pending.end + 1 == start {
                pending.end = end;
                pending.text.extend(text);
                return;
            }
        }
        self.flush_comment();
        self.comment = Some(PendingComment { start, end, text });
    }

    /// Resolve a pending comment that did not attach to a declaration.
    fn flush_comment(&mut self) {
        let Some(pending) = self.comment.take() else {
            return;
        };
        if !self.open.is_empty() {
            return;
        }
        let text = pending.text.join("\n").trim().to_string();
        if !self.saw_code && self.module_doc.is_none() {
            self.module_doc = Some(text).filter(|t| !t.is_empty());
            return;
        }
        if pending.end > pending.start {
            let name = comment_name(&text, pending.start + 1);
            let mut entity = CodeEntity::new(
                EntityKind::CommentBlock,
                name,
                self.path,
                LineSpan::new(pending.start + 1, pending.end + 1),
            );
            entity.doc = Some(text).filter(|t| !t.is_empty());
            self.flat.push(Flat {
                entity,
                parent: None,
            });
        }
    }

    fn match_decorator(&self, trimmed: &str) -> Option<String> {
        let re: &Regex = match self.language {
            Language::Rust => &RUST_ATTRIBUTE,
            Language::CSharp => &CS_ATTRIBUTE,
            Language::Python
            | Language::Java
            | Language::Kotlin
            | Language::TypeScript
            | Language::JavaScript
            | Language::Swift => &AT_DECORATOR,
            _ => return None,
        };
        re.captures(trimmed).map(|c| c[1].to_string())
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn match_declaration(&self, line: &str) -> Option<Decl> {
        let parent_kind = self.open.last().map(|o| o.kind);
        let in_class = parent_kind == Some(EntityKind::Class);

        let class = |name: &str, bases: Vec<String>| Decl {
            kind: EntityKind::Class,
            name: name.to_string(),
            bases,
            requires_body: false,
        };
        let function = |name: &str, requires_body: bool| Decl {
            kind: EntityKind::Function,
            name: name.to_string(),
            bases: Vec::new(),
            requires_body,
        };

        match self.language {
            Language::Python => {
                if let Some(c) = PY_CLASS.captures(line) {
                    let bases = c.get(2).map(|b| split_bases(b.as_str())).unwrap_or_default();
                    return Some(class(&c[1], bases));
                }
                PY_DEF.captures(line).map(|c| function(&c[1], false))
            }
            Language::Ruby => {
                if let Some(c) = RB_CLASS.captures(line) {
                    let bases = c.get(2).map(|b| vec![b.as_str().to_string()]).unwrap_or_default();
                    return Some(class(&c[1], bases));
                }
                RB_DEF.captures(line).map(|c| function(&c[1], false))
            }
            Language::Go => {
                if let Some(c) = GO_TYPE.captures(line) {
                    return Some(class(&c[1], Vec::new()));
                }
                GO_FUNC.captures(line).map(|c| function(&c[1], true))
            }
            Language::Rust => {
                if let Some(c) = RUST_TYPE.captures(line) {
                    return Some(class(&c[1], Vec::new()));
                }
                if let Some(c) = RUST_IMPL.captures(line) {
                    let name = c[2].rsplit("::").next().unwrap_or(&c[2]).to_string();
                    let bases = c.get(1).map(|t| vec![t.as_str().to_string()]).unwrap_or_default();
                    return Some(Decl {
                        kind: EntityKind::Class,
                        name,
                        bases,
                        requires_body: true,
                    });
                }
                RUST_FN.captures(line).map(|c| function(&c[1], false))
            }
            Language::Shell => SHELL_FN.captures(line).and_then(|c| {
                let name = c.get(1).or_else(|| c.get(2))?;
                Some(function(name.as_str(), true))
            }),
            _ => {
                if let Some(c) = CLASS_DECL.captures(line) {
                    let name_end = c.get(1).map(|m| m.end()).unwrap_or(0);
                    return Some(class(&c[1], brace_bases(line, name_end)));
                }
                if let Some(c) = FUNCTION_KEYWORD.captures(line) {
                    return Some(function(&c[1], false));
                }
                if matches!(self.language, Language::JavaScript | Language::TypeScript) {
                    if let Some(c) = ARROW_BINDING.captures(line) {
                        return Some(function(&c[1], false));
                    }
                    if in_class {
                        return CLASS_METHOD
                            .captures(line)
                            .filter(|c| !NOT_A_NAME.contains(&&c[1]))
                            .map(|c| function(&c[1], true));
                    }
                    return None;
                }
                if matches!(self.language, Language::Kotlin | Language::Swift) {
                    if let Some(c) = FUN_KEYWORD.captures(line) {
                        return Some(function(&c[1], false));
                    }
                }
                if let Some(c) = C_LIKE_METHOD.captures(line) {
                    if !NOT_A_NAME.contains(&&c[1]) && !line.trim_start().starts_with("return ") {
                        return Some(function(&c[1], true));
                    }
                }
                if in_class {
                    let class_name = self.open.last().map(|o| self.flat[o.index].entity.name.as_str());
                    if let Some(c) = CONSTRUCTOR.captures(line) {
                        if Some(&c[1]) == class_name {
                            return Some(function(&c[1], true));
                        }
                    }
                }
                None
            }
        }
    }

    /// Record a declaration found at line `i`. Returns false when the line
    /// turned out not to be a definition.
    fn add_declaration(&mut self, i: usize, decl: Decl) -> bool {
        let end = match self.block_end(i) {
            Some(end) => end,
            None if decl.requires_body => return false,
            None => i,
        };

        // Entities inside function bodies are locals, not structure.
        let parent = match self.open.last() {
            Some(open) if open.kind == EntityKind::Function => {
                self.comment = None;
                self.decorators.clear();
                self.decorator_start = None;
                return true;
            }
            Some(open) => Some(open.index),
            None => None,
        };

        let first_line = self.decorator_start.take().unwrap_or(i);
        let doc = match self.comment.take() {
            Some(pending) if pending.end + 1 == first_line => Some(pending.text.join("\n")),
            Some(pending) => {
                self.comment = Some(pending);
                self.flush_comment();
                None
            }
            None => None,
        };

        let header = self.lines[i].trim();
        let signature = truncate(
            header
                .trim_end_matches('{')
                .trim_end()
                .trim_end_matches(':')
                .trim_end(),
        );
        let body = self.lines[i..=end].join("\n");

        let mut entity = CodeEntity::new(
            decl.kind,
            decl.name.as_str(),
            self.path,
            LineSpan::new(first_line + 1, end + 1),
        )
        .with_signature(signature)
        .with_doc(doc);
        entity.decorators = std::mem::take(&mut self.decorators);
        entity.bases = decl.bases;
        entity.references = collect_type_references(&body, &decl.name);

        let index = self.flat.len();
        self.flat.push(Flat { entity, parent });
        self.open.push(Open {
            index,
            end,
            kind: decl.kind,
        });
        self.last_decl = Some((index, i));
        true
    }

    fn block_end(&mut self, start: usize) -> Option<usize> {
        if self.language.is_indent_scoped() {
            Some(self.indent_block_end(start))
        } else if self.language.is_end_scoped() {
            Some(self.end_keyword_block_end(start))
        } else {
            self.brace_block_end(start)
        }
    }

    fn indent_block_end(&self, start: usize) -> usize {
        let base = indent_of(self.lines[start]);
        let mut parens = paren_delta(self.lines[start]);
        let mut end = start;
        for (j, line) in self.lines.iter().enumerate().skip(start + 1) {
            if parens > 0 {
                parens += paren_delta(line);
                end = j;
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if indent_of(line) <= base {
                break;
            }
            end = j;
        }
        end
    }

    fn end_keyword_block_end(&self, start: usize) -> usize {
        let base = indent_of(self.lines[start]);
        for (j, line) in self.lines.iter().enumerate().skip(start + 1) {
            let t = line.trim();
            let is_end = t == "end" || t.starts_with("end ") || t.starts_with("end.");
            if is_end && indent_of(line) == base {
                return j;
            }
        }
        self.indent_block_end(start)
    }

    fn brace_block_end(&mut self, start: usize) -> Option<usize> {
        let mut depth = 0i64;
        let mut parens = 0i64;
        let mut opened = false;

        for (j, line) in self.lines.iter().enumerate().skip(start) {
            if j > start && !opened {
                let t = line.trim();
                let continues = parens > 0
                    || t.starts_with('{')
                    || t.starts_with("extends")
                    || t.starts_with("implements")
                    || t.starts_with("throws")
                    || t.starts_with("where")
                    || t.starts_with(':')
                    || t.starts_with(',')
                    || (t.is_empty() && j - start < 2);
                if !continues {
                    return None;
                }
            }
            for c in significant_chars(line, self.language) {
                match c {
                    '(' => parens += 1,
                    ')' => parens -= 1,
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => {
                        depth -= 1;
                        if opened && depth <= 0 {
                            return Some(j);
                        }
                    }
                    ';' if !opened && parens <= 0 => return None,
                    _ => {}
                }
            }
        }

        if opened {
            self.unbalanced = true;
            Some(self.lines.len().saturating_sub(1))
        } else {
            None
        }
    }

    // =========================================================================
    // Imports
    // =========================================================================

    fn match_import(&mut self, trimmed: &str) -> Option<String> {
        let capture = |re: &Regex| re.captures(trimmed).map(|c| c[1].to_string());
        match self.language {
            Language::Python => capture(&PY_IMPORT).or_else(|| capture(&PY_FROM)),
            Language::JavaScript | Language::TypeScript => {
                capture(&JS_IMPORT).or_else(|| capture(&JS_REQUIRE))
            }
            Language::Java | Language::Kotlin | Language::Swift => {
                capture(&JVM_IMPORT).map(|m| m.trim_end_matches(".*").to_string())
            }
            Language::Go => {
                if self.in_go_imports {
                    if trimmed.starts_with(')') {
                        self.in_go_imports = false;
                        return None;
                    }
                    return capture(&GO_IMPORT_SPEC);
                }
                if trimmed.starts_with("import (") {
                    self.in_go_imports = true;
                    return None;
                }
                capture(&GO_IMPORT)
            }
            Language::C | Language::Cpp => capture(&C_INCLUDE),
            Language::Rust => capture(&RUST_USE).map(|m| m.trim_end_matches("::").to_string()),
            Language::CSharp => capture(&CS_USING),
            Language::Php => capture(&PHP_USE).or_else(|| capture(&PHP_REQUIRE)),
            Language::Ruby => capture(&RB_REQUIRE),
            Language::Shell => capture(&SH_SOURCE),
            _ => None,
        }
    }

    fn add_import(&mut self, i: usize, module: String, line: &str) {
        let entity = CodeEntity::new(EntityKind::Import, module, self.path, LineSpan::new(i + 1, i + 1))
            .with_signature(truncate(line));
        self.flat.push(Flat {
            entity,
            parent: None,
        });
    }
}

fn build_tree(index: usize, slots: &mut [Option<CodeEntity>], kids: &[Vec<usize>]) -> Option<CodeEntity> {
    let mut entity = slots[index].take()?;
    for &child in &kids[index] {
        if let Some(c) = build_tree(child, slots, kids) {
            entity.children.push(c);
        }
    }
    Some(entity)
}

/// Characters that matter for block structure: string and char literals
/// and trailing line comments are skipped.
fn significant_chars(line: &str, language: Language) -> Vec<char> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '/' if chars.get(i + 1) == Some(&'/') => break,
            '"' | '`' => {
                i += 1;
                while i < chars.len() && chars[i] != c {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            '\'' => {
                // Rust lifetimes look like unterminated char literals.
                let is_char_literal = chars.get(i + 2) == Some(&'\'')
                    || (chars.get(i + 1) == Some(&'\\') && chars[i + 2..].iter().take(6).any(|&x| x == '\''));
                if language == Language::Rust && !is_char_literal {
                    i += 1;
                    continue;
                }
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

fn paren_delta(line: &str) -> i64 {
    line.chars().fold(0, |acc, c| match c {
        '(' | '[' => acc + 1,
        ')' | ']' => acc - 1,
        _ => acc,
    })
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn split_bases(list: &str) -> Vec<String> {
    list.split(',')
        .map(|b| b.trim())
        .filter(|b| !b.is_empty() && !b.contains('='))
        .map(|b| b.split('<').next().unwrap_or(b).trim().to_string())
        .filter(|b| b != "object")
        .collect()
}

/// Base types from `extends`/`implements` clauses or a `: Base, Other` list.
fn brace_bases(line: &str, name_end: usize) -> Vec<String> {
    let mut bases = Vec::new();
    if let Some(c) = EXTENDS.captures(line) {
        bases.push(c[1].to_string());
    }
    if let Some(c) = IMPLEMENTS.captures(line) {
        bases.extend(split_bases(c[1].trim_end_matches('{')));
    }
    if bases.is_empty() && name_end <= line.len() {
        let rest = &line[name_end..];
        let rest = rest.trim_start_matches(|c: char| c == '<' || c.is_alphanumeric() || c == '>' || c == ',');
        if let Some(c) = COLON_BASES.captures(rest) {
            let list = c[1].split(" where ").next().unwrap_or("");
            bases.extend(
                split_bases(list)
                    .into_iter()
                    .map(|b| b.split('(').next().unwrap_or(&b).trim().to_string())
                    .filter(|b| !b.is_empty()),
            );
        }
    }
    bases
}

fn comment_name(text: &str, line: usize) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    if first.is_empty() {
        format!("comment@{}", line)
    } else {
        truncate_to(first, 48)
    }
}

fn truncate(s: &str) -> String {
    truncate_to(s, MAX_SIGNATURE)
}

fn truncate_to(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push_str("...");
        out
    }
}
