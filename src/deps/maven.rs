//! pom.xml parsing.
//!
//! Reads `<dependency>` elements with a line-tolerant regex rather than a
//! full XML parser. Dependencies inside `<dependencyManagement>` and plugin
//! declarations are included; Maven property references are kept verbatim.

use lazy_static::lazy_static;
use regex::Regex;

use super::utils::{dependency, ANY_VERSION};
use super::{Dependency, Ecosystem};

lazy_static! {
    static ref DEPENDENCY: Regex = Regex::new(r"(?s)<dependency>(.*?)</dependency>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

fn element<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    let value = body[start..end].trim();
    (!value.is_empty()).then_some(value)
}

pub(super) fn parse_pom(path: &str, content: &str) -> Vec<Dependency> {
    let content = COMMENT.replace_all(content, "");
    DEPENDENCY
        .captures_iter(&content)
        .filter_map(|caps| {
            let body = caps.get(1)?.as_str();
            let artifact = element(body, "artifactId")?;
            let name = match element(body, "groupId") {
                Some(group) => format!("{}:{}", group, artifact),
                None => artifact.to_string(),
            };
            let version = element(body, "version").unwrap_or(ANY_VERSION);
            let dev = matches!(element(body, "scope"), Some("test" | "provided"));
            Some(dependency(name, version, path, Ecosystem::Maven, dev))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pom() {
        let content = r#"<project>
  <dependencies>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
      <version>[2.0,3.0)</version>
    </dependency>
    <!-- <dependency><groupId>old</groupId><artifactId>gone</artifactId></dependency> -->
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>${junit.version}</version>
      <scope>test</scope>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>bom-managed</artifactId>
    </dependency>
  </dependencies>
</project>"#;
        let deps = parse_pom("pom.xml", content);
        let found: Vec<_> = deps
            .iter()
            .map(|d| (d.name.as_str(), d.constraint.as_str(), d.dev))
            .collect();
        assert_eq!(
            found,
            vec![
                ("org.slf4j:slf4j-api", "[2.0,3.0)", false),
                ("junit:junit", "${junit.version}", true),
                ("com.example:bom-managed", "*", false),
            ]
        );
    }

    #[test]
    fn test_pom_without_dependencies() {
        assert!(parse_pom("pom.xml", "<project></project>").is_empty());
    }
}
