//! Gemfile parsing.

use lazy_static::lazy_static;
use regex::Regex;

use super::utils::{dependency, is_dev_group, ANY_VERSION};
use super::{Dependency, Ecosystem};

lazy_static! {
    static ref GEM: Regex =
        Regex::new(r#"^gem\s+['"]([^'"]+)['"]((?:\s*,\s*['"][^'"]*['"])*)"#).unwrap();
    static ref QUOTED: Regex = Regex::new(r#"['"]([^'"]*)['"]"#).unwrap();
    static ref GROUP: Regex = Regex::new(r"^group\s+(.+?)\s+do\b").unwrap();
    static ref INLINE_GROUP: Regex = Regex::new(r"group:\s*\[?([^\]]+)\]?").unwrap();
}

/// Parse `gem` lines. Gems inside a `group :development` or `:test` block,
/// or with such an inline `group:` option, are dev dependencies.
pub(super) fn parse_gemfile(path: &str, content: &str) -> Vec<Dependency> {
    let mut deps = Vec::new();
    // One entry per open `do` block; true when it is a dev group.
    let mut blocks: Vec<bool> = Vec::new();

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if let Some(caps) = GROUP.captures(line) {
            blocks.push(is_dev_groups(&caps[1]));
            continue;
        }
        if line.ends_with(" do") || line.contains(" do |") {
            blocks.push(false);
            continue;
        }
        if line == "end" {
            blocks.pop();
            continue;
        }

        let Some(caps) = GEM.captures(line) else {
            continue;
        };
        let name = &caps[1];
        let versions: Vec<_> = QUOTED
            .captures_iter(caps.get(2).map(|m| m.as_str()).unwrap_or(""))
            .map(|c| c[1].to_string())
            .collect();
        let constraint = if versions.is_empty() {
            ANY_VERSION.to_string()
        } else {
            versions.join(", ")
        };
        let inline_dev = INLINE_GROUP
            .captures(line)
            .map(|c| is_dev_groups(&c[1]))
            .unwrap_or(false);
        let dev = inline_dev || blocks.iter().any(|dev| *dev);
        deps.push(dependency(name, constraint, path, Ecosystem::RubyGems, dev));
    }
    deps
}

/// True when every group in `:development, :test` is a dev group.
fn is_dev_groups(groups: &str) -> bool {
    let names: Vec<_> = groups
        .split(',')
        .map(|g| g.trim().trim_start_matches(':').trim_matches(|c| c == '"' || c == '\''))
        .filter(|g| !g.is_empty())
        .collect();
    !names.is_empty() && names.iter().all(|g| is_dev_group(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gemfile() {
        let content = r#"
source "https://rubygems.org"

gem "rails", "~> 7.1"
gem 'pg', '>= 1.1', '< 2.0'
gem "puma"

group :development, :test do
  gem "rspec-rails"
end

gem "rubocop", group: :development
"#;
        let deps = parse_gemfile("Gemfile", content);
        let found: Vec<_> = deps
            .iter()
            .map(|d| (d.name.as_str(), d.constraint.as_str(), d.dev))
            .collect();
        assert_eq!(
            found,
            vec![
                ("rails", "~> 7.1", false),
                ("pg", ">= 1.1, < 2.0", false),
                ("puma", "*", false),
                ("rspec-rails", "*", true),
                ("rubocop", "*", true),
            ]
        );
    }

    #[test]
    fn test_production_group_is_runtime() {
        let deps = parse_gemfile("Gemfile", "group :production do\n  gem 'redis'\nend\n");
        assert_eq!(deps.len(), 1);
        assert!(!deps[0].dev);
    }
}
