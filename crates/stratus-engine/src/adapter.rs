//! Backend adapter trait definition
//!
//! An adapter exposes primitive create/get/delete per sub-resource kind for
//! one backend. Each method makes exactly one backend call and never
//! retries; retry and polling policy live in the engine.

use crate::attrs::{Attributes, ID_KEY};
use crate::backend::SubResourceKind;
use crate::error::AdapterError;
use crate::poller::PollOutcome;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// How a sub-resource reaches its final state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Done when `apply` returns
    Sync,
    /// `apply` returns an operation handle that must be polled
    Poll,
}

/// Sub-resource kinds an adapter supports and how each completes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendCapability {
    kinds: BTreeMap<SubResourceKind, Completion>,
}

impl BackendCapability {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: SubResourceKind, completion: Completion) -> Self {
        self.kinds.insert(kind, completion);
        self
    }

    pub fn sync(self, kind: SubResourceKind) -> Self {
        self.with(kind, Completion::Sync)
    }

    pub fn poll(self, kind: SubResourceKind) -> Self {
        self.with(kind, Completion::Poll)
    }

    pub fn completion(&self, kind: SubResourceKind) -> Option<Completion> {
        self.kinds.get(&kind).copied()
    }

    pub fn supports(&self, kind: SubResourceKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubResourceKind, Completion)> + '_ {
        self.kinds.iter().map(|(k, c)| (*k, *c))
    }
}

/// Status reported by an operation probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Done,
    Failed(String),
}

/// Queries the backend for the status of one asynchronous operation
#[async_trait]
pub trait OperationProbe: Send + Sync {
    async fn status(&self) -> AdapterResult<OperationStatus>;
}

/// Opaque reference to an in-flight backend operation
///
/// Only meaningful to the adapter instance that issued it. The first
/// terminal outcome observed by the poller is cached on the handle.
#[derive(Clone)]
pub struct OperationHandle {
    reference: String,
    issuer: String,
    probe: Arc<dyn OperationProbe>,
    outcome: Arc<Mutex<Option<PollOutcome>>>,
}

impl OperationHandle {
    pub fn new(
        reference: impl Into<String>,
        issuer: impl Into<String>,
        probe: Arc<dyn OperationProbe>,
    ) -> Self {
        Self {
            reference: reference.into(),
            issuer: issuer.into(),
            probe,
            outcome: Arc::new(Mutex::new(None)),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub async fn status(&self) -> AdapterResult<OperationStatus> {
        self.probe.status().await
    }

    pub fn outcome(&self) -> Option<PollOutcome> {
        self.outcome.lock().clone()
    }

    pub(crate) fn settle(&self, outcome: PollOutcome) {
        let mut slot = self.outcome.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
    }
}

impl fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("reference", &self.reference)
            .field("issuer", &self.issuer)
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// Result of an `apply` call
#[derive(Debug, Clone)]
pub struct Applied {
    /// Outputs of the sub-resource; always contains `id`
    pub outputs: Attributes,

    /// Set when the sub-resource completes asynchronously
    pub pending: Option<OperationHandle>,
}

impl Applied {
    pub fn done(id: impl Into<String>) -> Self {
        let mut outputs = Attributes::new();
        outputs.insert(ID_KEY.to_string(), id.into().into());
        Self {
            outputs,
            pending: None,
        }
    }

    pub fn pending(id: impl Into<String>, handle: OperationHandle) -> Self {
        let mut applied = Self::done(id);
        applied.pending = Some(handle);
        applied
    }

    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<crate::AttrValue>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.outputs.get(ID_KEY).and_then(|v| v.as_str())
    }
}

/// Backend adapter abstraction trait
///
/// Every backend (AWS, Azure, GCP, the in-memory reference backend)
/// implements this trait. Adapters are constructed once with their
/// credentials and shared as `Arc<dyn BackendAdapter>`.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Label used in logs and as the issuer of operation handles
    fn label(&self) -> &str;

    /// Supported sub-resource kinds
    fn capability(&self) -> BackendCapability;

    /// Create a sub-resource
    ///
    /// When the chain has a deterministic identifier for the sub-resource it
    /// is passed as the `id` input.
    async fn apply(&self, kind: SubResourceKind, inputs: &Attributes) -> AdapterResult<Applied>;

    /// Check whether a sub-resource exists
    async fn exists(&self, kind: SubResourceKind, id: &str) -> AdapterResult<bool>;

    /// Delete a sub-resource
    async fn destroy(
        &self,
        kind: SubResourceKind,
        id: &str,
    ) -> AdapterResult<Option<OperationHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(OperationStatus);

    #[async_trait]
    impl OperationProbe for Fixed {
        async fn status(&self) -> AdapterResult<OperationStatus> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_capability_lookup() {
        let cap = BackendCapability::new()
            .sync(SubResourceKind::ResourceGroup)
            .poll(SubResourceKind::ComputeInstance);
        assert_eq!(
            cap.completion(SubResourceKind::ComputeInstance),
            Some(Completion::Poll)
        );
        assert!(cap.supports(SubResourceKind::ResourceGroup));
        assert!(!cap.supports(SubResourceKind::DnsZone));
    }

    #[tokio::test]
    async fn test_handle_settles_once() {
        let handle = OperationHandle::new("op-1", "memory", Arc::new(Fixed(OperationStatus::Done)));
        assert_eq!(handle.status().await.unwrap(), OperationStatus::Done);
        assert!(handle.outcome().is_none());

        handle.settle(PollOutcome::Converged);
        handle.settle(PollOutcome::TimedOut);
        assert_eq!(handle.outcome(), Some(PollOutcome::Converged));
    }

    #[test]
    fn test_applied_outputs_contain_id() {
        let applied = Applied::done("rg-1").with_output("location", "eastus");
        assert_eq!(applied.id(), Some("rg-1"));
        assert!(applied.pending.is_none());
        assert_eq!(applied.outputs.len(), 2);
    }
}
