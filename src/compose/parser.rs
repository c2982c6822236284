//! Compose document parsing and linting
//!
//! Only the parts of a compose file the charm cares about are modelled. The
//! lint is advisory: the compose engine stays the authority on validity.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the compose file inside the docker root
pub const COMPOSE_FILE_NAME: &str = "docker-compose.yml";

/// Path of the compose file for a docker root
pub fn compose_path(root: &Path) -> PathBuf {
    root.join(COMPOSE_FILE_NAME)
}

/// Minimal view of a compose file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComposeDocument {
    /// Project name
    #[serde(default)]
    pub name: Option<String>,
    /// Services
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDocument>,
}

/// Minimal view of a compose service
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDocument {
    /// Image name
    #[serde(default)]
    pub image: Option<String>,
    /// Build configuration, either a path or a mapping
    #[serde(default)]
    pub build: Option<serde_yaml::Value>,
    /// Port mappings in short or long syntax
    #[serde(default)]
    pub ports: Option<Vec<serde_yaml::Value>>,
}

/// Compose document parser
pub struct ComposeParser;

impl ComposeParser {
    /// Parse a compose document from a string
    pub fn parse_str(content: &str) -> crate::Result<ComposeDocument> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Collect warnings about a rendered compose document
    ///
    /// Returns an empty list for a document that looks usable.
    pub fn lint(content: &str) -> Vec<String> {
        let doc = match Self::parse_str(content) {
            Ok(doc) => doc,
            Err(e) => return vec![format!("rendered compose file could not be parsed: {}", e)],
        };

        let mut warnings = Vec::new();

        if doc.services.is_empty() {
            warnings.push("compose file declares no services".to_string());
        }

        for (name, service) in &doc.services {
            if service.image.is_none() && service.build.is_none() {
                warnings.push(format!(
                    "service '{}' has neither 'image' nor 'build'",
                    name
                ));
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_compose() {
        let yaml = r#"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
  db:
    image: postgres:13
"#;

        let doc = ComposeParser::parse_str(yaml).unwrap();
        assert_eq!(doc.services.len(), 2);
        assert_eq!(doc.services["web"].ports.as_ref().map(Vec::len), Some(1));
        assert!(ComposeParser::lint(yaml).is_empty());
    }

    #[test]
    fn test_lint_missing_image() {
        let yaml = r#"
services:
  web:
    ports:
      - "80:80"
"#;

        let warnings = ComposeParser::lint(yaml);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'web'"));
    }

    #[test]
    fn test_lint_invalid_yaml() {
        let warnings = ComposeParser::lint("services: [unclosed");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("could not be parsed"));
    }

    #[test]
    fn test_compose_path() {
        assert_eq!(
            compose_path(Path::new("/srv/app")),
            PathBuf::from("/srv/app/docker-compose.yml")
        );
    }
}
