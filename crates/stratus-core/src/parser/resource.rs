//! resource node

use crate::error::{DefinitionError, Result};
use crate::model::ResourceDecl;
use kdl::{KdlNode, KdlValue};
use stratus_engine::{AttrValue, Attributes, ResourceKind};

/// Convert a KDL value to an attribute value; `#null` has none
pub fn kdl_to_attr(value: &KdlValue) -> Option<AttrValue> {
    match value {
        KdlValue::String(s) => Some(AttrValue::String(s.clone())),
        KdlValue::Integer(i) => Some(match i64::try_from(*i) {
            Ok(i) => AttrValue::Int(i),
            Err(_) => AttrValue::String(i.to_string()),
        }),
        KdlValue::Float(f) => Some(AttrValue::String(f.to_string())),
        KdlValue::Bool(b) => Some(AttrValue::Bool(*b)),
        KdlValue::Null => None,
    }
}

/// Parse `resource "<kind>" "<name>" { backend "<tag>"; key value ... }`
///
/// Attribute names are stored snake_case (`subnet-cidr` becomes
/// `subnet_cidr`). A node with several arguments is stored as a
/// comma-separated string.
pub fn parse_resource(node: &KdlNode) -> Result<ResourceDecl> {
    let mut args = node
        .entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string());

    let kind_str = args.next().ok_or_else(|| {
        DefinitionError::InvalidConfig("resource requires a kind and a name".to_string())
    })?;
    let kind: ResourceKind = kind_str
        .parse()
        .map_err(|_| DefinitionError::UnknownKind(kind_str.to_string()))?;
    let name = args
        .next()
        .ok_or_else(|| {
            DefinitionError::InvalidConfig(format!("resource {} requires a name", kind))
        })?
        .to_string();

    let mut backend: Option<String> = None;
    let mut attributes = Attributes::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value().replace('-', "_");
            let values: Vec<AttrValue> = child
                .entries()
                .iter()
                .filter(|e| e.name().is_none())
                .filter_map(|e| kdl_to_attr(e.value()))
                .collect();

            if key == "backend" {
                backend = values.first().and_then(|v| v.as_str()).map(str::to_string);
                continue;
            }

            let value = match values.len() {
                0 => continue,
                1 => values.into_iter().next(),
                _ => Some(AttrValue::String(
                    values
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                )),
            };
            if let Some(value) = value {
                attributes.insert(key, value);
            }
        }
    }

    let backend = backend.ok_or_else(|| DefinitionError::MissingBackend(name.clone()))?;

    Ok(ResourceDecl {
        kind,
        name,
        backend,
        attributes,
    })
}
