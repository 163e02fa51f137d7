//! Python manifests: requirements*.txt, pyproject.toml and setup.cfg.

use toml::Value;

use super::utils::{dependency, is_dev_group, split_requirement};
use super::{Dependency, Ecosystem, ManifestError};

/// requirements*.txt. Options (`-r`, `-e`, `--hash`) and comments are
/// skipped. Files named for dev or test are dev dependencies.
pub(super) fn parse_requirements(path: &str, content: &str) -> Vec<Dependency> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let dev = is_dev_group(file_name);

    content
        .lines()
        .map(|line| line.split(" #").next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(split_requirement)
        .map(|(name, constraint)| dependency(name, constraint, path, Ecosystem::PyPI, dev))
        .collect()
}

/// pyproject.toml: PEP 621 `[project]` tables and Poetry tables.
pub(super) fn parse_pyproject(path: &str, content: &str) -> Result<Vec<Dependency>, ManifestError> {
    let root: Value = toml::from_str(content)?;
    let mut deps = Vec::new();

    if let Some(project) = root.get("project") {
        for req in string_array(project.get("dependencies")) {
            push_requirement(&mut deps, path, req, false);
        }
        if let Some(optional) = project.get("optional-dependencies").and_then(Value::as_table) {
            for (group, reqs) in optional {
                for req in string_array(Some(reqs)) {
                    push_requirement(&mut deps, path, req, is_dev_group(group));
                }
            }
        }
    }

    if let Some(poetry) = root.get("tool").and_then(|t| t.get("poetry")) {
        push_poetry_table(&mut deps, path, poetry.get("dependencies"), false);
        push_poetry_table(&mut deps, path, poetry.get("dev-dependencies"), true);
        if let Some(groups) = poetry.get("group").and_then(Value::as_table) {
            for (group, body) in groups {
                push_poetry_table(&mut deps, path, body.get("dependencies"), is_dev_group(group));
            }
        }
    }

    Ok(deps)
}

/// setup.cfg `[options] install_requires` and `[options.extras_require]`.
pub(super) fn parse_setup_cfg(path: &str, content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    let mut section = String::new();
    // Key whose indented continuation lines are requirements, and whether
    // they are dev dependencies.
    let mut collecting: Option<bool> = None;

    for raw in content.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        if trimmed.starts_with('[') {
            section = trimmed.trim_matches(|c| c == '[' || c == ']').trim().to_string();
            collecting = None;
            continue;
        }

        let indented = raw.starts_with(' ') || raw.starts_with('\t');
        if indented {
            if let Some(dev) = collecting {
                push_requirement(&mut deps, path, trimmed, dev);
            }
            continue;
        }

        collecting = None;
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let dev = match (section.as_str(), key) {
            ("options", "install_requires") => false,
            ("options.extras_require", group) => is_dev_group(group),
            _ => continue,
        };
        let value = value.trim();
        if value.is_empty() {
            collecting = Some(dev);
        } else {
            for req in value.split(';').filter(|r| !r.trim().is_empty()) {
                push_requirement(&mut deps, path, req, dev);
            }
        }
    }
    deps
}

fn string_array(value: Option<&Value>) -> impl Iterator<Item = &str> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn push_requirement(deps: &mut Vec<Dependency>, path: &str, req: &str, dev: bool) {
    if let Some((name, constraint)) = split_requirement(req) {
        deps.push(dependency(name, constraint, path, Ecosystem::PyPI, dev));
    }
}

/// Poetry dependency table: `name = "^1.0"` or `name = { version = "^1.0" }`.
fn push_poetry_table(deps: &mut Vec<Dependency>, path: &str, table: Option<&Value>, dev: bool) {
    let Some(table) = table.and_then(Value::as_table) else {
        return;
    };
    for (name, spec) in table {
        if name == "python" {
            continue;
        }
        let constraint = match spec {
            Value::String(s) => s.clone(),
            Value::Table(t) => t
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| t.get("path").and_then(Value::as_str).map(|p| format!("path:{}", p)))
                .or_else(|| t.get("git").and_then(Value::as_str).map(|g| format!("git:{}", g)))
                .unwrap_or_default(),
            other => other.to_string(),
        };
        deps.push(dependency(name.as_str(), constraint, path, Ecosystem::PyPI, dev));
    }
}
