//! Language classification from path, shebang and content.
//!
//! Classification is a pure function of the relative path and a content
//! prefix. Nothing here touches the filesystem.

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How much structure can be recovered for a language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// A precise grammar is available.
    Primary,
    /// Source code handled by the heuristic extractor.
    Secondary,
    /// Markup, configuration and plain text.
    Generic,
    Unknown,
}

/// Language identity assigned to a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    C,
    Cpp,
    CSharp,
    Go,
    Rust,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Shell,
    Markdown,
    Yaml,
    Json,
    Toml,
    Xml,
    Unknown,
}

/// Extension (lowercase, without dot) to language.
static EXTENSIONS: phf::Map<&'static str, Language> = phf_map! {
    "py" => Language::Python,
    "pyi" => Language::Python,
    "js" => Language::JavaScript,
    "jsx" => Language::JavaScript,
    "mjs" => Language::JavaScript,
    "cjs" => Language::JavaScript,
    "ts" => Language::TypeScript,
    "tsx" => Language::TypeScript,
    "java" => Language::Java,
    "c" => Language::C,
    "h" => Language::C,
    "cpp" => Language::Cpp,
    "cc" => Language::Cpp,
    "cxx" => Language::Cpp,
    "hpp" => Language::Cpp,
    "hh" => Language::Cpp,
    "cs" => Language::CSharp,
    "go" => Language::Go,
    "rs" => Language::Rust,
    "rb" => Language::Ruby,
    "php" => Language::Php,
    "swift" => Language::Swift,
    "kt" => Language::Kotlin,
    "kts" => Language::Kotlin,
    "sh" => Language::Shell,
    "bash" => Language::Shell,
    "zsh" => Language::Shell,
    "md" => Language::Markdown,
    "markdown" => Language::Markdown,
    "yaml" => Language::Yaml,
    "yml" => Language::Yaml,
    "json" => Language::Json,
    "toml" => Language::Toml,
    "xml" => Language::Xml,
};

/// Extensionless file names with a conventional language.
static FILE_NAMES: phf::Map<&'static str, Language> = phf_map! {
    "Gemfile" => Language::Ruby,
    "Rakefile" => Language::Ruby,
    "Makefile" => Language::Shell,
    "Dockerfile" => Language::Shell,
};

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Shell => "shell",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Json => "json",
            Language::Toml => "toml",
            Language::Xml => "xml",
            Language::Unknown => "unknown",
        }
    }

    /// Human-readable name used in artifact titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Java => "Java",
            Language::C => "C",
            Language::Cpp => "C++",
            Language::CSharp => "C#",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Ruby => "Ruby",
            Language::Php => "PHP",
            Language::Swift => "Swift",
            Language::Kotlin => "Kotlin",
            Language::Shell => "Shell",
            Language::Markdown => "Markdown",
            Language::Yaml => "YAML",
            Language::Json => "JSON",
            Language::Toml => "TOML",
            Language::Xml => "XML",
            Language::Unknown => "Unknown",
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Language::Python if cfg!(feature = "tree-sitter") => Tier::Primary,
            Language::Markdown
            | Language::Yaml
            | Language::Json
            | Language::Toml
            | Language::Xml => Tier::Generic,
            Language::Unknown => Tier::Unknown,
            _ => Tier::Secondary,
        }
    }

    /// Whether the language is source code (as opposed to markup or data).
    pub fn is_code(&self) -> bool {
        matches!(self.tier(), Tier::Primary | Tier::Secondary)
    }

    /// Languages whose blocks are delimited by indentation.
    pub fn is_indent_scoped(&self) -> bool {
        matches!(self, Language::Python)
    }

    /// Languages whose blocks end with an `end` keyword.
    pub fn is_end_scoped(&self) -> bool {
        matches!(self, Language::Ruby)
    }

    /// Line comment prefix, when the language has one.
    pub fn line_comment(&self) -> Option<&'static str> {
        match self {
            Language::Python | Language::Ruby | Language::Shell | Language::Yaml | Language::Toml => {
                Some("#")
            }
            Language::Markdown | Language::Json | Language::Xml => None,
            Language::Unknown => Some("#"),
            _ => Some("//"),
        }
    }

    /// Whether `/* ... */` block comments exist in the language.
    pub fn has_block_comments(&self) -> bool {
        matches!(
            self,
            Language::JavaScript
                | Language::TypeScript
                | Language::Java
                | Language::C
                | Language::Cpp
                | Language::CSharp
                | Language::Go
                | Language::Rust
                | Language::Php
                | Language::Swift
                | Language::Kotlin
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bytes inspected when sniffing for binary content.
const BINARY_SNIFF_LEN: usize = 8192;

/// Whether content looks binary: a NUL byte or invalid UTF-8 within the
/// first [`BINARY_SNIFF_LEN`] bytes. A multi-byte sequence cut off by the
/// sniff window does not count.
pub fn is_binary(prefix: &[u8]) -> bool {
    let window = &prefix[..prefix.len().min(BINARY_SNIFF_LEN)];
    if window.contains(&0) {
        return true;
    }
    match std::str::from_utf8(window) {
        Ok(_) => false,
        Err(e) => e.error_len().is_some() || window.len() == prefix.len(),
    }
}

/// Classify a file from its relative path and a prefix of its content.
/// Binary content is always [`Language::Unknown`], whatever its name.
pub fn classify(path: &str, prefix: &[u8]) -> Language {
    if is_binary(prefix) {
        return Language::Unknown;
    }

    let file_name = path.rsplit('/').next().unwrap_or(path);

    if let Some((stem, ext)) = file_name.rsplit_once('.') {
        if !stem.is_empty() {
            if let Some(lang) = EXTENSIONS.get(ext.to_ascii_lowercase().as_str()) {
                return *lang;
            }
        }
    }

    if let Some(lang) = FILE_NAMES.get(file_name) {
        return *lang;
    }

    let head = String::from_utf8_lossy(&prefix[..prefix.len().min(512)]);
    if let Some(lang) = classify_shebang(&head) {
        return lang;
    }

    classify_content(&head)
}

fn classify_shebang(head: &str) -> Option<Language> {
    let first = head.lines().next()?;
    let interpreter_line = first.strip_prefix("#!")?;

    // `#!/usr/bin/env python3` names the interpreter as the first argument.
    let mut parts = interpreter_line.split_whitespace();
    let mut program = parts.next()?.rsplit('/').next()?;
    if program == "env" {
        program = parts.find(|p| !p.starts_with('-'))?;
    }

    let lang = if program.starts_with("python") {
        Language::Python
    } else if program == "node" || program == "deno" || program == "bun" {
        Language::JavaScript
    } else if matches!(program, "sh" | "bash" | "zsh" | "dash" | "ksh") {
        Language::Shell
    } else if program == "ruby" {
        Language::Ruby
    } else if program == "php" {
        Language::Php
    } else {
        return None;
    };
    Some(lang)
}

fn classify_content(head: &str) -> Language {
    let trimmed = head.trim_start();
    if trimmed.starts_with("<?php") {
        return Language::Php;
    }
    if trimmed.starts_with("<?xml") {
        return Language::Xml;
    }
    for line in head.lines().take(20) {
        let line = line.trim();
        if line.starts_with("package main") {
            return Language::Go;
        }
        if line.starts_with("#include <") || line.starts_with("#include \"") {
            return Language::C;
        }
    }
    Language::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(classify("a.py", b""), Language::Python);
        assert_eq!(classify("src/app/main.TS", b""), Language::TypeScript);
        assert_eq!(classify("lib/x.rs", b""), Language::Rust);
        assert_eq!(classify("docs/README.md", b""), Language::Markdown);
        assert_eq!(classify("package.json", b""), Language::Json);
    }

    #[test]
    fn test_classify_by_file_name() {
        assert_eq!(classify("Gemfile", b"source 'https://rubygems.org'"), Language::Ruby);
        assert_eq!(classify("build/Makefile", b"all:\n"), Language::Shell);
    }

    #[test]
    fn test_classify_by_shebang() {
        assert_eq!(classify("bin/tool", b"#!/usr/bin/env python3\nprint(1)\n"), Language::Python);
        assert_eq!(classify("bin/run", b"#!/bin/bash\necho hi\n"), Language::Shell);
        assert_eq!(classify("bin/srv", b"#!/usr/bin/env -S node --flag\n"), Language::JavaScript);
        assert_eq!(classify("bin/odd", b"#!/usr/bin/perl\n"), Language::Unknown);
    }

    #[test]
    fn test_classify_by_content() {
        assert_eq!(classify("main", b"// comment\npackage main\n"), Language::Go);
        assert_eq!(classify("thing", b"<?php echo 1;"), Language::Php);
        assert_eq!(classify("notes", b"just some words"), Language::Unknown);
    }

    #[test]
    fn test_binary_content_is_unknown() {
        assert!(is_binary(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"));
        assert!(is_binary(&[0x66, 0x6f, 0xff, 0xfe, 0x6f]));
        assert_eq!(classify("image.py", b"GIF89a\0\x01"), Language::Unknown);
        assert_eq!(classify("blob", b"# heading\0# more\n"), Language::Unknown);

        assert!(!is_binary("caf\u{e9} # note\n".as_bytes()));
        // A multi-byte character split by the sniff window is still text.
        let mut long = vec![b'a'; BINARY_SNIFF_LEN - 1];
        long.extend_from_slice("\u{e9}\u{e9}".as_bytes());
        assert!(!is_binary(&long));
    }

    #[test]
    fn test_dotfile_is_not_an_extension() {
        // `.py` alone is a hidden file named "py", not a Python module.
        assert_eq!(classify(".py", b"hello"), Language::Unknown);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let prefix = b"#!/usr/bin/env ruby\nputs 1\n";
        let first = classify("script", prefix);
        for _ in 0..5 {
            assert_eq!(classify("script", prefix), first);
        }
    }

    #[test]
    fn test_tiers() {
        assert_eq!(Language::Java.tier(), Tier::Secondary);
        assert_eq!(Language::Yaml.tier(), Tier::Generic);
        assert_eq!(Language::Unknown.tier(), Tier::Unknown);
        #[cfg(feature = "tree-sitter")]
        assert_eq!(Language::Python.tier(), Tier::Primary);
    }
}
