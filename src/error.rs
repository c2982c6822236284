//! Error types for the compose charm

use thiserror::Error;

/// Result type for charm operations
pub type Result<T> = std::result::Result<T, CharmError>;

/// Charm error types
#[derive(Error, Debug)]
pub enum CharmError {
    #[error("Install error: {0}")]
    Install(String),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Compose engine error: {0}")]
    Run(#[from] RunError),

    #[error("Version query failed: {0}")]
    VersionQuery(RunError),

    #[error("Another event is already being handled")]
    Busy,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Compose template rendering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder '{name}' at offset {offset}")]
    UnknownPlaceholder { name: String, offset: usize },

    #[error("malformed template at offset {offset}: {message}")]
    Malformed { offset: usize, message: String },
}

/// A failed invocation of the compose engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} while running {}{}", exit_status(.exit_code), .command, detail(.stderr))]
pub struct RunError {
    /// Exit code, `None` if the process could not be spawned or was killed
    pub exit_code: Option<i32>,
    /// The command line that failed
    pub command: String,
    /// Captured stderr (trimmed), or the spawn error
    pub stderr: String,
}

impl RunError {
    pub fn new(exit_code: Option<i32>, command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            command: command.into(),
            stderr: stderr.into().trim().to_string(),
        }
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("Exit code {}", code),
        None => "No exit code".to_string(),
    }
}

fn detail(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}
