//! Charm configuration
//!
//! The orchestrator hands the charm a flat configuration mapping. It is read
//! here from a YAML file with the same keys.

use crate::error::{CharmError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default directory holding the compose file
pub const DEFAULT_DOCKER_ROOT: &str = "/srv/docker-compose";

/// Configuration mapping as delivered by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharmConfig {
    /// Directory the compose file is written to
    pub docker_root: PathBuf,
    /// Compose file template
    pub docker_compose_yml: Option<String>,
    /// Treat a failed engine version query as fatal
    pub strict_version_query: bool,
    /// Docker binary to invoke
    pub docker_bin: PathBuf,
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            docker_root: PathBuf::from(DEFAULT_DOCKER_ROOT),
            docker_compose_yml: None,
            strict_version_query: false,
            docker_bin: PathBuf::from("docker"),
        }
    }
}

impl CharmConfig {
    /// Load the configuration from a YAML file
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parse the configuration from a YAML string
    pub fn parse_str(content: &str) -> Result<Self> {
        // An empty document deserializes as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.docker_root.as_os_str().is_empty() {
            return Err(CharmError::InvalidConfig("docker_root must not be empty".to_string()));
        }
        if !self.docker_root.is_absolute() {
            return Err(CharmError::InvalidConfig(format!(
                "docker_root must be an absolute path, got {}",
                self.docker_root.display()
            )));
        }
        Ok(())
    }

    /// The desired state declared by this configuration
    pub fn desired(&self) -> DesiredConfig {
        DesiredConfig {
            compose_template: self.docker_compose_yml.clone().unwrap_or_default(),
            root_dir: self.docker_root.clone(),
        }
    }
}

/// Declared target of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfig {
    pub compose_template: String,
    pub root_dir: PathBuf,
}

impl DesiredConfig {
    pub fn new(compose_template: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            compose_template: compose_template.into(),
            root_dir: root_dir.into(),
        }
    }

    /// Whether a template has been supplied at all
    pub fn has_template(&self) -> bool {
        !self.compose_template.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
docker_root: /srv/app
docker_compose_yml: |
  services:
    web:
      image: nginx
strict_version_query: true
"#;
        let config = CharmConfig::parse_str(yaml).unwrap();
        assert_eq!(config.docker_root, PathBuf::from("/srv/app"));
        assert!(config.strict_version_query);
        assert_eq!(config.docker_bin, PathBuf::from("docker"));

        let desired = config.desired();
        assert!(desired.has_template());
        assert!(desired.compose_template.starts_with("services:\n"));
    }

    #[test]
    fn test_defaults() {
        let config = CharmConfig::parse_str("").unwrap();
        assert_eq!(config, CharmConfig::default());
        assert!(!config.desired().has_template());

        let temp = tempdir().unwrap();
        let config = CharmConfig::load(&temp.path().join("missing.yaml")).unwrap();
        assert_eq!(config.docker_root, PathBuf::from(DEFAULT_DOCKER_ROOT));
    }

    #[test]
    fn test_relative_root_is_rejected() {
        let result = CharmConfig::parse_str("docker_root: relative/dir\n");
        assert!(matches!(result, Err(CharmError::InvalidConfig(_))));
    }

    #[test]
    fn test_whitespace_template_counts_as_unset() {
        assert!(!DesiredConfig::new("  \n", "/tmp/x").has_template());
    }
}
