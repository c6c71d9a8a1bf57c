//! Azure adapter error types

use stratus_engine::{AdapterError, SubResourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("az not found. Please install the Azure CLI: https://aka.ms/installazurecli")]
    AzNotFound,

    #[error("az command failed: {0}")]
    CommandFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid identifier '{id}' for {kind}")]
    InvalidId { kind: String, id: String },

    #[error("Missing input '{0}'")]
    MissingInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Sub-resource not supported by the Azure adapter: {0}")]
    Unsupported(SubResourceKind),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AzureError>;

/// stderr fragments az prints for missing resources
const NOT_FOUND_MARKERS: &[&str] = &[
    "ResourceNotFound",
    "ResourceGroupNotFound",
    "NotFound",
    "could not be found",
    "was not found",
];

/// stderr fragments for failures worth retrying
const TRANSIENT_MARKERS: &[&str] = &[
    "TooManyRequests",
    "throttl",
    "timed out",
    "ServiceUnavailable",
    "InternalServerError",
    "Connection aborted",
];

impl AzureError {
    pub fn is_not_found(&self) -> bool {
        match self {
            AzureError::NotFound(_) => true,
            AzureError::CommandFailed(stderr) => {
                NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m))
            }
            _ => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            AzureError::CommandFailed(stderr) => {
                TRANSIENT_MARKERS.iter().any(|m| stderr.contains(m))
            }
            AzureError::IoError(_) => true,
            _ => false,
        }
    }
}

impl From<AzureError> for AdapterError {
    fn from(err: AzureError) -> Self {
        if let AzureError::Unsupported(kind) = err {
            AdapterError::NotSupported(kind)
        } else if err.is_not_found() {
            AdapterError::NotFound(err.to_string())
        } else if err.is_transient() {
            AdapterError::Transient(err.to_string())
        } else {
            AdapterError::Permanent(err.to_string())
        }
    }
}
