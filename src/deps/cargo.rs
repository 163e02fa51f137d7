//! Cargo.toml parsing.

use toml::Value;

use super::utils::dependency;
use super::{Dependency, Ecosystem, ManifestError};

const SECTIONS: &[(&str, bool)] = &[
    ("dependencies", false),
    ("dev-dependencies", true),
    ("build-dependencies", true),
];

pub(super) fn parse_cargo_toml(path: &str, content: &str) -> Result<Vec<Dependency>, ManifestError> {
    let root: Value = toml::from_str(content)?;
    let mut deps = Vec::new();

    for (section, dev) in SECTIONS {
        push_table(&mut deps, path, root.get(*section), *dev);
    }
    // Workspace-level dependency declarations are inherited by members.
    if let Some(workspace) = root.get("workspace") {
        push_table(&mut deps, path, workspace.get("dependencies"), false);
    }
    Ok(deps)
}

fn push_table(deps: &mut Vec<Dependency>, path: &str, table: Option<&Value>, dev: bool) {
    let Some(table) = table.and_then(Value::as_table) else {
        return;
    };
    for (name, spec) in table {
        deps.push(dependency(name.as_str(), constraint(spec), path, Ecosystem::Crates, dev));
    }
}

fn constraint(spec: &Value) -> String {
    match spec {
        Value::String(version) => version.clone(),
        Value::Table(t) => {
            if let Some(version) = t.get("version").and_then(Value::as_str) {
                version.to_string()
            } else if let Some(p) = t.get("path").and_then(Value::as_str) {
                format!("path:{}", p)
            } else if let Some(git) = t.get("git").and_then(Value::as_str) {
                format!("git:{}", git)
            } else if t.get("workspace").and_then(Value::as_bool) == Some(true) {
                "workspace".to_string()
            } else {
                String::new()
            }
        }
        other => other.to_string(),
    }
}
