//! Compose file handling
//!
//! Rendering of the configured template and a light lint of the result.

pub mod parser;
pub mod render;

pub use parser::{compose_path, ComposeDocument, ComposeParser, COMPOSE_FILE_NAME};
pub use render::{render, HostFacts};
