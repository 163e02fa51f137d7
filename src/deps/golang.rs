//! go.mod parsing.
//!
//! Only `require` directives produce dependencies. `replace` and `exclude`
//! blocks are skipped. Modules marked `// indirect` are kept as runtime
//! dependencies since go.mod does not distinguish dev requirements.

use super::utils::dependency;
use super::{Dependency, Ecosystem, ManifestError};

#[derive(Clone, Copy, PartialEq)]
enum Block {
    None,
    Require,
    Other,
}

/// Parse go.mod content. A file without a `module` line is malformed.
pub(super) fn parse_go_mod(path: &str, content: &str) -> Result<Vec<Dependency>, ManifestError> {
    let mut has_module = false;
    let mut block = Block::None;
    let mut deps = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        if block != Block::None {
            if line == ")" {
                block = Block::None;
            } else if block == Block::Require {
                if let Some((module, version)) = parse_require_line(line) {
                    deps.push(dependency(module, version, path, Ecosystem::Go, false));
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("module ") {
            has_module = !rest.trim().is_empty();
            continue;
        }

        let (directive, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match (directive, rest) {
            ("require", "(") => block = Block::Require,
            ("require", single) => {
                if let Some((module, version)) = parse_require_line(single) {
                    deps.push(dependency(module, version, path, Ecosystem::Go, false));
                }
            }
            (_, "(") => block = Block::Other,
            _ => {}
        }
    }

    if !has_module {
        return Err(ManifestError::Malformed("no module declaration found in go.mod".into()));
    }
    Ok(deps)
}

/// Parse a require line: `google.golang.org/grpc v1.78.0 // indirect`.
fn parse_require_line(line: &str) -> Option<(String, String)> {
    let line = line.split("//").next().unwrap_or("").trim();
    let mut parts = line.split_whitespace();
    let module = parts.next()?;
    let version = parts.next().unwrap_or("");
    Some((module.to_string(), version.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_mod_blocks() {
        let content = r#"
module github.com/example/project

go 1.22

require (
    github.com/spf13/cobra v1.8.0
    golang.org/x/sync v0.6.0 // indirect
)

require github.com/stretchr/testify v1.9.0

replace (
    github.com/foo/bar => ../bar
)
"#;
        let deps = parse_go_mod("go.mod", content).expect("valid go.mod");
        let names: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.constraint.as_str())).collect();
        assert_eq!(
            names,
            vec![
                ("github.com/spf13/cobra", "v1.8.0"),
                ("golang.org/x/sync", "v0.6.0"),
                ("github.com/stretchr/testify", "v1.9.0"),
            ]
        );
        assert!(deps.iter().all(|d| d.ecosystem == Ecosystem::Go && !d.dev));
    }

    #[test]
    fn test_go_mod_without_module_is_malformed() {
        assert!(parse_go_mod("go.mod", "require github.com/x/y v1.0.0\n").is_err());
    }

    #[test]
    fn test_parse_require_line() {
        assert_eq!(
            parse_require_line("google.golang.org/grpc v1.78.0"),
            Some(("google.golang.org/grpc".into(), "v1.78.0".into()))
        );
        assert_eq!(parse_require_line("// only a comment"), None);
    }
}
