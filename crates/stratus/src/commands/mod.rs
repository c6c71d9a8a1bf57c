pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;
pub mod state;

use stratus_engine::{ResourceSpec, StoredResource};

/// What apply will do for one declared resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    /// Replace; carries the attributes that changed
    Replace(Vec<String>),
    Unchanged,
}

/// Compare a normalized declaration with the stored record
pub fn action(stored: Option<&StoredResource>, normalized: &ResourceSpec) -> Action {
    let Some(stored) = stored else {
        return Action::Create;
    };
    if stored.record.backend_tag() != Some(normalized.backend.as_str()) {
        return Action::Replace(vec!["type".to_string()]);
    }
    let changed = stored.record.diverging_keys(&normalized.attributes);
    if changed.is_empty() {
        Action::Unchanged
    } else {
        Action::Replace(changed)
    }
}
