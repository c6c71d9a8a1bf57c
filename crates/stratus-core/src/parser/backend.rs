//! backend node

use crate::error::{DefinitionError, Result};
use super::resource::kdl_to_attr;
use crate::model::BackendSettings;
use kdl::KdlNode;
use stratus_engine::Backend;

/// Parse `backend "<tag>" { key "value" ... }`
pub fn parse_backend(node: &KdlNode) -> Result<BackendSettings> {
    let tag = node
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .ok_or_else(|| DefinitionError::InvalidConfig("backend requires a tag".to_string()))?;
    let backend =
        Backend::parse(tag).map_err(|e| DefinitionError::InvalidConfig(e.to_string()))?;

    let mut settings = BackendSettings {
        tag: backend.tag().to_string(),
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if let Some(value) = child.entries().first().and_then(|e| kdl_to_attr(e.value())) {
                settings
                    .settings
                    .insert(child.name().value().replace('-', "_"), value.to_string());
            }
        }
    }

    Ok(settings)
}
