//! In-memory reference backend
//!
//! Keeps sub-resources in a map and records every call, which makes it the
//! backend of choice for `stratus apply --simulate` and for the engine
//! tests. Failures, slow operations and out-of-band deletions can be
//! injected per sub-resource kind.

use crate::adapter::{
    AdapterResult, Applied, BackendAdapter, BackendCapability, Completion, OperationHandle,
    OperationProbe, OperationStatus,
};
use crate::attrs::{Attributes, AttributesExt, ID_KEY};
use crate::backend::SubResourceKind;
use crate::error::AdapterError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One recorded adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Apply(SubResourceKind, String),
    Exists(SubResourceKind, String),
    Destroy(SubResourceKind, String),
    Status(String),
}

#[derive(Debug, Default)]
struct Inner {
    resources: BTreeMap<(SubResourceKind, String), Attributes>,
    seq: u64,
    calls: Vec<Call>,
    fail_apply: BTreeMap<SubResourceKind, AdapterError>,
    fail_destroy: BTreeMap<SubResourceKind, AdapterError>,
    fail_exists: BTreeMap<SubResourceKind, AdapterError>,
    fail_operation: BTreeMap<SubResourceKind, String>,
    stalled: BTreeSet<SubResourceKind>,
}

/// In-memory backend
#[derive(Clone)]
pub struct MemoryBackend {
    label: String,
    capability: BackendCapability,
    polls_until_done: u32,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    /// Backend supporting every sub-resource kind synchronously
    pub fn new(label: impl Into<String>) -> Self {
        let capability = SubResourceKind::ALL
            .into_iter()
            .fold(BackendCapability::new(), |cap, kind| cap.sync(kind));
        Self {
            label: label.into(),
            capability,
            polls_until_done: 1,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Complete the given kinds asynchronously
    pub fn with_async(mut self, kinds: &[SubResourceKind]) -> Self {
        for kind in kinds {
            self.capability = self.capability.poll(*kind);
        }
        self
    }

    /// Replace the supported kinds
    pub fn with_capability(mut self, capability: BackendCapability) -> Self {
        self.capability = capability;
        self
    }

    /// Number of status probes before an async operation reports done
    pub fn with_polls_until_done(mut self, polls: u32) -> Self {
        self.polls_until_done = polls.max(1);
        self
    }

    pub fn fail_apply(&self, kind: SubResourceKind, error: AdapterError) {
        self.inner.lock().fail_apply.insert(kind, error);
    }

    pub fn fail_destroy(&self, kind: SubResourceKind, error: AdapterError) {
        self.inner.lock().fail_destroy.insert(kind, error);
    }

    /// Existence checks on this kind fail
    pub fn fail_exists(&self, kind: SubResourceKind, error: AdapterError) {
        self.inner.lock().fail_exists.insert(kind, error);
    }

    /// Async operations on this kind end in a failed state
    pub fn fail_operation(&self, kind: SubResourceKind, message: impl Into<String>) {
        self.inner.lock().fail_operation.insert(kind, message.into());
    }

    /// Drop every injected failure
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.fail_apply.clear();
        inner.fail_destroy.clear();
        inner.fail_exists.clear();
        inner.fail_operation.clear();
        inner.stalled.clear();
    }

    /// Async operations on this kind never settle
    pub fn stall(&self, kind: SubResourceKind) {
        self.inner.lock().stalled.insert(kind);
    }

    /// Add a sub-resource as if it had been created outside the engine
    pub fn insert(&self, kind: SubResourceKind, id: impl Into<String>) {
        let id = id.into();
        let mut attrs = Attributes::new();
        attrs.insert(ID_KEY.to_string(), id.clone().into());
        self.inner.lock().resources.insert((kind, id), attrs);
    }

    /// Delete a sub-resource behind the engine's back
    pub fn remove(&self, kind: SubResourceKind, id: &str) -> bool {
        self.inner
            .lock()
            .resources
            .remove(&(kind, id.to_string()))
            .is_some()
    }

    pub fn contains(&self, kind: SubResourceKind, id: &str) -> bool {
        self.inner
            .lock()
            .resources
            .contains_key(&(kind, id.to_string()))
    }

    /// Stored inputs of a sub-resource
    pub fn get(&self, kind: SubResourceKind, id: &str) -> Option<Attributes> {
        self.inner
            .lock()
            .resources
            .get(&(kind, id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    fn operation(&self, kind: SubResourceKind, reference: String) -> OperationHandle {
        let inner = self.inner.lock();
        let outcome = if inner.stalled.contains(&kind) {
            None
        } else if let Some(msg) = inner.fail_operation.get(&kind) {
            Some(OperationStatus::Failed(msg.clone()))
        } else {
            Some(OperationStatus::Done)
        };
        drop(inner);

        let probe = MemoryOperation {
            reference: reference.clone(),
            remaining: Mutex::new(self.polls_until_done),
            outcome,
            inner: self.inner.clone(),
        };
        OperationHandle::new(reference, self.label.clone(), Arc::new(probe))
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("label", &self.label)
            .field("resources", &self.len())
            .finish()
    }
}

struct MemoryOperation {
    reference: String,
    remaining: Mutex<u32>,
    /// `None` for operations that never settle
    outcome: Option<OperationStatus>,
    inner: Arc<Mutex<Inner>>,
}

#[async_trait]
impl OperationProbe for MemoryOperation {
    async fn status(&self) -> AdapterResult<OperationStatus> {
        self.inner
            .lock()
            .calls
            .push(Call::Status(self.reference.clone()));

        let Some(outcome) = &self.outcome else {
            return Ok(OperationStatus::Pending);
        };
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            Ok(OperationStatus::Pending)
        } else {
            Ok(outcome.clone())
        }
    }
}

#[async_trait]
impl BackendAdapter for MemoryBackend {
    fn label(&self) -> &str {
        &self.label
    }

    fn capability(&self) -> BackendCapability {
        self.capability.clone()
    }

    async fn apply(&self, kind: SubResourceKind, inputs: &Attributes) -> AdapterResult<Applied> {
        let completion = self
            .capability
            .completion(kind)
            .ok_or(AdapterError::NotSupported(kind))?;

        let id = {
            let mut inner = self.inner.lock();
            let id = match inputs.str_attr(ID_KEY) {
                Some(id) => id.to_string(),
                None => {
                    inner.seq += 1;
                    format!("{}-{}", kind, inner.seq)
                }
            };
            inner.calls.push(Call::Apply(kind, id.clone()));

            if let Some(err) = inner.fail_apply.get(&kind) {
                return Err(err.clone());
            }
            if inner.resources.contains_key(&(kind, id.clone())) {
                return Err(AdapterError::Permanent(format!("{} already exists", id)));
            }

            let mut stored = inputs.clone();
            stored.insert(ID_KEY.to_string(), id.clone().into());
            inner.resources.insert((kind, id.clone()), stored);
            id
        };

        tracing::debug!("[{}] applied {} {}", self.label, kind, id);

        match completion {
            Completion::Sync => Ok(Applied::done(id)),
            Completion::Poll => {
                let handle = self.operation(kind, format!("create/{}/{}", kind, id));
                Ok(Applied::pending(id, handle))
            }
        }
    }

    async fn exists(&self, kind: SubResourceKind, id: &str) -> AdapterResult<bool> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Exists(kind, id.to_string()));
        if let Some(err) = inner.fail_exists.get(&kind) {
            return Err(err.clone());
        }
        Ok(inner.resources.contains_key(&(kind, id.to_string())))
    }

    async fn destroy(
        &self,
        kind: SubResourceKind,
        id: &str,
    ) -> AdapterResult<Option<OperationHandle>> {
        let completion = {
            let mut inner = self.inner.lock();
            inner.calls.push(Call::Destroy(kind, id.to_string()));

            if let Some(err) = inner.fail_destroy.get(&kind) {
                return Err(err.clone());
            }
            if inner.resources.remove(&(kind, id.to_string())).is_none() {
                return Err(AdapterError::NotFound(id.to_string()));
            }
            self.capability.completion(kind)
        };

        tracing::debug!("[{}] destroyed {} {}", self.label, kind, id);

        match completion {
            Some(Completion::Poll) => Ok(Some(
                self.operation(kind, format!("delete/{}/{}", kind, id)),
            )),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(id: Option<&str>) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), "web".into());
        if let Some(id) = id {
            attrs.insert(ID_KEY.into(), id.into());
        }
        attrs
    }

    #[tokio::test]
    async fn test_apply_uses_target_or_generates_id() {
        let backend = MemoryBackend::new("memory");

        let applied = backend
            .apply(SubResourceKind::ObjectBucket, &inputs(Some("assets")))
            .await
            .unwrap();
        assert_eq!(applied.id(), Some("assets"));

        let applied = backend
            .apply(SubResourceKind::VirtualNetwork, &inputs(None))
            .await
            .unwrap();
        assert_eq!(applied.id(), Some("virtual-network-1"));

        assert!(backend.exists(SubResourceKind::ObjectBucket, "assets").await.unwrap());
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_apply_is_rejected() {
        let backend = MemoryBackend::new("memory");
        backend.insert(SubResourceKind::ResourceGroup, "stratus-rg");
        let err = backend
            .apply(SubResourceKind::ResourceGroup, &inputs(Some("stratus-rg")))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Permanent(_)));
    }

    #[tokio::test]
    async fn test_destroy_missing_is_not_found() {
        let backend = MemoryBackend::new("memory");
        let err = backend
            .destroy(SubResourceKind::Secret, "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_async_operation_settles_after_polls() {
        let backend = MemoryBackend::new("memory")
            .with_async(&[SubResourceKind::ComputeInstance])
            .with_polls_until_done(2);

        let applied = backend
            .apply(SubResourceKind::ComputeInstance, &inputs(None))
            .await
            .unwrap();
        let handle = applied.pending.unwrap();
        assert_eq!(handle.status().await.unwrap(), OperationStatus::Pending);
        assert_eq!(handle.status().await.unwrap(), OperationStatus::Done);
    }

    #[tokio::test]
    async fn test_unsupported_kind() {
        let backend = MemoryBackend::new("memory")
            .with_capability(BackendCapability::new().sync(SubResourceKind::ObjectBucket));
        let err = backend
            .apply(SubResourceKind::DnsZone, &inputs(None))
            .await
            .unwrap_err();
        assert_eq!(err, AdapterError::NotSupported(SubResourceKind::DnsZone));
    }
}
