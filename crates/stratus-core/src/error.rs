use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("Failed to read definition file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read {path}\nReason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("Invalid definition: {0}")]
    InvalidConfig(String),

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Resource '{0}' has no backend")]
    MissingBackend(String),

    #[error("Resource {kind} '{name}' is declared more than once")]
    DuplicateResource { kind: String, name: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
}

pub type Result<T> = std::result::Result<T, DefinitionError>;
