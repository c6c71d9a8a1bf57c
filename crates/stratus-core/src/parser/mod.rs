//! KDL parser
//!
//! Parses a Stratus definition file. Each node type lives in its own
//! module.

mod backend;
mod engine;
mod resource;


use backend::parse_backend;
use engine::parse_engine;
use resource::parse_resource;

pub use engine::parse_duration;
pub use resource::kdl_to_attr;

use crate::error::{DefinitionError, Result};
use crate::model::Definition;
use kdl::KdlDocument;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Parse a definition file; the project name defaults to its directory
pub fn parse_definition_file<P: AsRef<Path>>(path: P) -> Result<Definition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| DefinitionError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let name = path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_definition_string(&content, name)
}

/// Parse a definition from a string
pub fn parse_definition_string(content: &str, default_name: String) -> Result<Definition> {
    let doc: KdlDocument = content.parse()?;

    let mut definition = Definition {
        name: default_name,
        ..Default::default()
    };
    let mut seen = BTreeSet::new();

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                if let Some(name) = node.entries().first().and_then(|e| e.value().as_string()) {
                    definition.name = name.to_string();
                }
            }
            "engine" => {
                definition.engine = parse_engine(node)?;
            }
            "backend" => {
                let settings = parse_backend(node)?;
                definition.backends.insert(settings.tag.clone(), settings);
            }
            "resource" => {
                let decl = parse_resource(node)?;
                if !seen.insert((decl.kind, decl.name.clone())) {
                    return Err(DefinitionError::DuplicateResource {
                        kind: decl.kind.to_string(),
                        name: decl.name,
                    });
                }
                definition.resources.push(decl);
            }
            other => {
                tracing::warn!("Ignoring unknown node '{}'", other);
            }
        }
    }

    tracing::debug!(
        "Parsed definition '{}' with {} resources",
        definition.name,
        definition.resources.len()
    );
    Ok(definition)
}
