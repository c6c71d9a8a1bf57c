//! AWS adapter error types

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use stratus_engine::{AdapterError, SubResourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS API error ({code}): {message}")]
    Api { code: String, message: String },

    #[error("AWS request could not be sent: {0}")]
    Dispatch(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Missing input '{0}'")]
    MissingInput(String),

    #[error("AWS response did not include {0}")]
    MissingOutput(&'static str),

    #[error("Malformed {kind} identifier: {id}")]
    InvalidId { kind: SubResourceKind, id: String },

    #[error("Invalid AWS request: {0}")]
    InvalidRequest(String),

    #[error("Sub-resource not supported by the AWS adapter: {0}")]
    Unsupported(SubResourceKind),
}

pub type Result<T> = std::result::Result<T, AwsError>;

/// Error codes AWS returns for throttling and server-side hiccups
const TRANSIENT_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "Throttling",
    "ThrottlingException",
    "SlowDown",
    "InternalError",
    "ServiceUnavailable",
    "RequestTimeout",
];

impl AwsError {
    /// Convert an SDK error, classifying it by error code
    pub fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        match &err {
            SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
                return AwsError::Dispatch(DisplayErrorContext(&err).to_string());
            }
            _ => {}
        }
        let code = err.code().unwrap_or("Unknown").to_string();
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
        if is_not_found_code(&code) {
            return AwsError::NotFound(message);
        }
        AwsError::Api { code, message }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            AwsError::NotFound(_) => true,
            AwsError::Api { code, .. } => is_not_found_code(code),
            _ => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            AwsError::Dispatch(_) => true,
            AwsError::Api { code, .. } => TRANSIENT_CODES.contains(&code.as_str()),
            _ => false,
        }
    }
}

/// Not-found codes outside the EC2 `*.NotFound` family
const NOT_FOUND_CODES: &[&str] = &[
    "NotFound",
    "NoSuchBucket",
    "NoSuchHostedZone",
    "ResourceNotFoundException",
    "RepositoryNotFoundException",
    "QueueDoesNotExist",
    "AWS.SimpleQueueService.NonExistentQueue",
];

/// `InvalidVpcID.NotFound`, `InvalidInstanceID.NotFound`, `NoSuchBucket`, ...
fn is_not_found_code(code: &str) -> bool {
    code.ends_with(".NotFound") || NOT_FOUND_CODES.contains(&code)
}

impl From<AwsError> for AdapterError {
    fn from(err: AwsError) -> Self {
        if let AwsError::Unsupported(kind) = err {
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
