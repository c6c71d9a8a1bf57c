//! Engine and adapter error types

use crate::backend::{Backend, ResourceKind, SubResourceKind};
use crate::diagnostics::Diagnostic;
use thiserror::Error;

/// Errors reported by a backend adapter for a single primitive call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Sub-resource not supported: {0}")]
    NotSupported(SubResourceKind),

    #[error("Transient backend failure: {0}")]
    Transient(String),

    #[error("Backend rejected request: {0}")]
    Permanent(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AdapterError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AdapterError::NotFound(_))
    }
}

/// Coarse error taxonomy exposed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    UnsupportedBackend,
    UnsupportedSubResource,
    ValidationFailure,
    TransientFailure,
    TimedOut,
    NotFound,
}

/// What went wrong inside a chain step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCause {
    /// The adapter call itself failed
    Adapter(AdapterError),

    /// The asynchronous operation reached a failed terminal state
    OperationFailed(String),

    /// The asynchronous operation did not settle before the deadline
    TimedOut,

    /// Post-apply verification did not find the sub-resource
    Verification(String),
}

impl std::fmt::Display for StepCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepCause::Adapter(err) => write!(f, "{}", err),
            StepCause::OperationFailed(msg) => write!(f, "operation failed: {}", msg),
            StepCause::TimedOut => write!(f, "operation timed out"),
            StepCause::Verification(msg) => write!(f, "verification failed: {}", msg),
        }
    }
}

/// Failure of one chain step, with the rollback outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub kind: ResourceKind,
    pub backend: Backend,

    /// Index of the failing step in the chain
    pub step: usize,
    pub sub_resource: SubResourceKind,
    pub cause: StepCause,

    /// Diagnostics from rolling back earlier steps
    pub rollback: Vec<Diagnostic>,

    /// Identifier of a sub-resource the failing step may have left behind
    pub orphan: Option<String>,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} on {}: step {} ({}) failed: {}",
            self.kind, self.backend, self.step, self.sub_resource, self.cause
        )
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Unknown resource kind: {0}")]
    UnknownResourceKind(String),

    #[error("No adapter registered for backend: {0}")]
    BackendNotConfigured(Backend),

    #[error("{kind} on {backend} requires unsupported sub-resource: {sub_resource}")]
    UnsupportedSubResource {
        kind: ResourceKind,
        backend: Backend,
        sub_resource: SubResourceKind,
    },

    #[error("Invalid {kind} definition: {message}")]
    InvalidSpec { kind: ResourceKind, message: String },

    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("{0}")]
    Step(Box<StepFailure>),

    #[error("{kind} not found on {backend}: {id}")]
    NotFound {
        kind: ResourceKind,
        backend: Backend,
        id: String,
    },

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::UnsupportedBackend(_) | EngineError::BackendNotConfigured(_) => {
                ErrorClass::UnsupportedBackend
            }
            EngineError::UnsupportedSubResource { .. } => ErrorClass::UnsupportedSubResource,
            EngineError::NotFound { .. } => ErrorClass::NotFound,
            EngineError::Step(failure) => match &failure.cause {
                StepCause::Adapter(AdapterError::NotSupported(_)) => {
                    ErrorClass::UnsupportedSubResource
                }
                StepCause::Adapter(AdapterError::Transient(_)) => ErrorClass::TransientFailure,
                StepCause::Adapter(AdapterError::NotFound(_)) => ErrorClass::NotFound,
                StepCause::TimedOut => ErrorClass::TimedOut,
                StepCause::Adapter(AdapterError::Permanent(_))
                | StepCause::OperationFailed(_)
                | StepCause::Verification(_) => ErrorClass::ValidationFailure,
            },
            EngineError::Io(_) | EngineError::Lock(_) => ErrorClass::TransientFailure,
            _ => ErrorClass::ValidationFailure,
        }
    }

    /// Whether the host may retry the whole call
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::TransientFailure | ErrorClass::TimedOut
        )
    }

    /// Primary diagnostic followed by any secondary ones
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            EngineError::Step(failure) => {
                let mut out = vec![Diagnostic::error(failure.to_string())];
                if let Some(orphan) = &failure.orphan {
                    out.push(
                        Diagnostic::warning(format!(
                            "{} may have been left behind",
                            failure.sub_resource
                        ))
                        .with_detail(orphan.clone()),
                    );
                }
                out.extend(failure.rollback.iter().cloned());
                out
            }
            other => vec![Diagnostic::error(other.to_string())],
        }
    }

    pub fn step_failure(&self) -> Option<&StepFailure> {
        match self {
            EngineError::Step(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<StepFailure> for EngineError {
    fn from(failure: StepFailure) -> Self {
        EngineError::Step(Box::new(failure))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
