//! Stratus reconciliation engine
//!
//! Provisions one declared resource on any of several cloud backends.
//! A declaration names a resource kind, a backend tag and a flat map of
//! attributes; the engine turns it into an ordered chain of sub-resource
//! calls against the backend's adapter and reconciles the result into a
//! flat record.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  stratus CLI                      │
//! │          (plan / apply / refresh / destroy)       │
//! └─────────────────┬────────────────────────────────┘
//!                   │ Request
//! ┌─────────────────▼────────────────────────────────┐
//! │                 Dispatcher                        │
//! │   backend tag → adapter, naming/normalization     │
//! └─────────────────┬────────────────────────────────┘
//!                   │
//! ┌─────────────────▼────────────────────────────────┐
//! │                 Reconciler                        │
//! │  ┌──────────────┐  ┌──────────┐  ┌────────────┐  │
//! │  │ ChainBuilder │  │  Poller  │  │  Rollback  │  │
//! │  └──────────────┘  └──────────┘  └────────────┘  │
//! └───────┬───────────────┬──────────────┬───────────┘
//!         │               │              │
//! ┌───────▼──────┐ ┌──────▼──────┐ ┌─────▼───────┐
//! │ aws adapter  │ │azure adapter│ │ gcp adapter │
//! └──────────────┘ └─────────────┘ └─────────────┘
//! ```

pub mod adapter;
pub mod attrs;
pub mod backend;
pub mod catalog;
pub mod chain;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod memory;
pub mod naming;
pub mod poller;
pub mod reconciler;
pub mod state;

// Re-exports
pub use adapter::{
    AdapterResult, Applied, BackendAdapter, BackendCapability, Completion, OperationHandle,
    OperationProbe, OperationStatus,
};
pub use attrs::{AttrValue, Attributes, AttributesExt, ResourceRecord, ResourceSpec};
pub use backend::{Backend, ResourceKind, SubResourceKind};
pub use chain::{Chain, ChainBuilder, ChainStep, ReusePolicy, Teardown};
pub use diagnostics::{Diagnostic, Reconciled, Severity};
pub use dispatcher::{Dispatcher, DispatcherBuilder, Request, Response};
pub use error::{AdapterError, EngineError, ErrorClass, Result, StepCause, StepFailure};
pub use memory::MemoryBackend;
pub use naming::{SizeClass, normalize};
pub use poller::{PollConfig, PollOutcome, Poller};
pub use reconciler::{Phase, Reconciler};
pub use state::{GlobalState, StateLock, StateManager, StoredResource};
