//! package.json and composer.json parsing.

use serde_json::Value;

use super::utils::dependency;
use super::{Dependency, Ecosystem, ManifestError};

const NPM_SECTIONS: &[(&str, bool)] = &[
    ("dependencies", false),
    ("devDependencies", true),
    ("peerDependencies", false),
    ("optionalDependencies", false),
];

const COMPOSER_SECTIONS: &[(&str, bool)] = &[("require", false), ("require-dev", true)];

pub(super) fn parse_package_json(path: &str, content: &str) -> Result<Vec<Dependency>, ManifestError> {
    parse_sections(path, content, Ecosystem::Npm, NPM_SECTIONS)
}

/// composer.json. Platform requirements (`php`, `ext-*`) are not packages
/// and are skipped.
pub(super) fn parse_composer_json(path: &str, content: &str) -> Result<Vec<Dependency>, ManifestError> {
    let mut deps = parse_sections(path, content, Ecosystem::Composer, COMPOSER_SECTIONS)?;
    deps.retain(|d| d.name != "php" && !d.name.starts_with("ext-"));
    Ok(deps)
}

fn parse_sections(
    path: &str,
    content: &str,
    ecosystem: Ecosystem,
    sections: &[(&str, bool)],
) -> Result<Vec<Dependency>, ManifestError> {
    let root: Value = serde_json::from_str(content)?;
    let Some(root) = root.as_object() else {
        return Err(ManifestError::Malformed("top level is not an object".into()));
    };

    let mut deps = Vec::new();
    for (section, dev) in sections {
        let Some(table) = root.get(*section).and_then(Value::as_object) else {
            continue;
        };
        // serde_json maps are sorted by key, so output order is stable.
        for (name, constraint) in table {
            let constraint = match constraint {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            deps.push(dependency(name.as_str(), constraint, path, ecosystem, *dev));
        }
    }
    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_json_keeps_constraints_verbatim() {
        let content = r#"{
            "name": "app",
            "dependencies": { "left-pad": "^1.0.0", "express": "~4.18.2" },
            "devDependencies": { "jest": ">=29 <30" }
        }"#;
        let deps = parse_package_json("package.json", content).expect("valid json");
        assert_eq!(deps.len(), 3);

        let left_pad = deps.iter().find(|d| d.name == "left-pad").expect("left-pad");
        assert_eq!(left_pad.constraint, "^1.0.0");
        assert!(!left_pad.dev);

        let jest = deps.iter().find(|d| d.name == "jest").expect("jest");
        assert_eq!(jest.constraint, ">=29 <30");
        assert!(jest.dev);
        assert_eq!(jest.manifest, "package.json");
    }

    #[test]
    fn test_package_json_without_dependencies() {
        let deps = parse_package_json("package.json", r#"{"name": "empty"}"#).expect("valid json");
        assert!(deps.is_empty());
    }

    #[test]
    fn test_package_json_invalid() {
        assert!(parse_package_json("package.json", "{").is_err());
        assert!(parse_package_json("package.json", "[1, 2]").is_err());
    }

    #[test]
    fn test_composer_skips_platform_requirements() {
        let content = r#"{
            "require": { "php": ">=8.1", "ext-json": "*", "monolog/monolog": "^3.0" },
            "require-dev": { "phpunit/phpunit": "^10" }
        }"#;
        let deps = parse_composer_json("composer.json", content).expect("valid json");
        let names: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.dev)).collect();
        assert_eq!(names, vec![("monolog/monolog", false), ("phpunit/phpunit", true)]);
        assert!(deps.iter().all(|d| d.ecosystem == Ecosystem::Composer));
    }
}
