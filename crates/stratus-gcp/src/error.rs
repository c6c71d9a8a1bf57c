//! Google Cloud adapter error types

use stratus_engine::{AdapterError, SubResourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Google Cloud API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Invalid identifier '{id}' for {kind}")]
    InvalidId { kind: String, id: String },

    #[error("Missing input '{0}'")]
    MissingInput(String),

    #[error("Sub-resource not supported by the Google Cloud adapter: {0}")]
    Unsupported(SubResourceKind),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GcpError>;

impl GcpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GcpError::ApiError { status: 404, .. })
    }

    pub fn is_transient(&self) -> bool {
        match self {
            GcpError::ApiError { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            GcpError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<GcpError> for AdapterError {
    fn from(err: GcpError) -> Self {
        if let GcpError::Unsupported(kind) = err {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> GcpError {
        GcpError::ApiError {
            status,
            message: "error".into(),
        }
    }

    #[test]
    fn test_error_classification() {
        assert!(AdapterError::from(api(404)).is_not_found());
        assert!(AdapterError::from(api(429)).is_transient());
        assert!(AdapterError::from(api(503)).is_transient());
        assert!(matches!(AdapterError::from(api(409)), AdapterError::Permanent(_)));
        assert!(matches!(
            AdapterError::from(GcpError::MissingInput("zone".into())),
            AdapterError::Permanent(_)
        ));
    }
}
