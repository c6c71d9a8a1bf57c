//! Resource dispatcher
//!
//! Routes lifecycle calls to the adapter registered for the declared
//! backend, runs the naming pass and hands over to a [`Reconciler`].
//! Backend identity is only ever branched on here and in the chain table.

use crate::adapter::BackendAdapter;
use crate::attrs::{ResourceRecord, ResourceSpec};
use crate::backend::{Backend, ResourceKind};
use crate::chain::Chain;
use crate::diagnostics::Reconciled;
use crate::error::{EngineError, Result};
use crate::naming::normalize;
use crate::poller::{PollConfig, Poller};
use crate::reconciler::Reconciler;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A lifecycle request from the host
#[derive(Debug, Clone)]
pub enum Request {
    Create {
        kind: ResourceKind,
        spec: ResourceSpec,
    },
    Read {
        kind: ResourceKind,
        record: ResourceRecord,
    },
    Update {
        kind: ResourceKind,
        record: ResourceRecord,
        spec: ResourceSpec,
    },
    Delete {
        kind: ResourceKind,
        record: ResourceRecord,
    },
    Import {
        kind: ResourceKind,
        backend: String,
        id: String,
    },
}

/// Outcome of a lifecycle request
#[derive(Debug, Clone)]
pub enum Response {
    Created(Reconciled<ResourceRecord>),
    Read(Reconciled<Option<ResourceRecord>>),
    Updated(Reconciled<ResourceRecord>),
    Deleted(Reconciled<()>),
    Imported(Reconciled<ResourceRecord>),
}

/// Builder for [`Dispatcher`]
#[derive(Default)]
pub struct DispatcherBuilder {
    adapters: BTreeMap<Backend, Arc<dyn BackendAdapter>>,
    poll: PollConfig,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the adapter instance for a backend
    pub fn register(mut self, backend: Backend, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.adapters.insert(backend, adapter);
        self
    }

    pub fn poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            adapters: self.adapters,
            poller: Poller::new(self.poll),
        }
    }
}

/// Routes lifecycle calls by backend tag
pub struct Dispatcher {
    adapters: BTreeMap<Backend, Arc<dyn BackendAdapter>>,
    poller: Poller,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Backends with a registered adapter
    pub fn backends(&self) -> impl Iterator<Item = Backend> + '_ {
        self.adapters.keys().copied()
    }

    fn reconciler(&self, backend: Backend) -> Result<Reconciler> {
        let adapter = self
            .adapters
            .get(&backend)
            .cloned()
            .ok_or(EngineError::BackendNotConfigured(backend))?;
        Ok(Reconciler::new(backend, adapter, self.poller.clone()))
    }

    /// Parse the declared tag and apply the naming pass
    fn route_spec(&self, kind: ResourceKind, spec: &ResourceSpec) -> Result<(Reconciler, ResourceSpec)> {
        let backend = Backend::parse(&spec.backend)?;
        let reconciler = self.reconciler(backend)?;
        let normalized = ResourceSpec {
            backend: backend.tag().to_string(),
            attributes: normalize(backend, kind, &spec.attributes),
        };
        Ok((reconciler, normalized))
    }

    fn route_record(&self, record: &ResourceRecord) -> Result<Reconciler> {
        let tag = record
            .backend_tag()
            .ok_or_else(|| EngineError::InvalidRecord("record has no backend tag".into()))?;
        self.reconciler(Backend::parse(tag)?)
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::Create { kind, spec } => self.create(kind, &spec).await.map(Response::Created),
            Request::Read { kind, record } => self.read(kind, &record).await.map(Response::Read),
            Request::Update { kind, record, spec } => self
                .update(kind, &record, &spec)
                .await
                .map(Response::Updated),
            Request::Delete { kind, record } => {
                self.delete(kind, &record).await.map(Response::Deleted)
            }
            Request::Import { kind, backend, id } => self
                .import(kind, &backend, &id)
                .await
                .map(Response::Imported),
        }
    }

    /// Normalized declaration and chain, without touching the backend
    pub fn plan(&self, kind: ResourceKind, spec: &ResourceSpec) -> Result<(ResourceSpec, Chain)> {
        let (reconciler, normalized) = self.route_spec(kind, spec)?;
        let chain = reconciler.plan(kind, &normalized)?;
        Ok((normalized, chain))
    }

    pub async fn create(
        &self,
        kind: ResourceKind,
        spec: &ResourceSpec,
    ) -> Result<Reconciled<ResourceRecord>> {
        let (reconciler, normalized) = self.route_spec(kind, spec)?;
        reconciler.create(kind, &normalized).await
    }

    pub async fn read(
        &self,
        kind: ResourceKind,
        record: &ResourceRecord,
    ) -> Result<Reconciled<Option<ResourceRecord>>> {
        self.route_record(record)?.read(kind, record).await
    }

    /// Replace a resource, possibly moving it to another backend
    pub async fn update(
        &self,
        kind: ResourceKind,
        record: &ResourceRecord,
        spec: &ResourceSpec,
    ) -> Result<Reconciled<ResourceRecord>> {
        let current = self.route_record(record)?;
        let (target, normalized) = self.route_spec(kind, spec)?;

        if current.backend() == target.backend() {
            return target.update(kind, record, &normalized).await;
        }

        let deleted = current.delete(kind, record).await?;
        let created = target.create(kind, &normalized).await?;
        let mut diagnostics = deleted.diagnostics;
        diagnostics.extend(created.diagnostics);
        Ok(Reconciled::with_diagnostics(created.value, diagnostics))
    }

    pub async fn delete(&self, kind: ResourceKind, record: &ResourceRecord) -> Result<Reconciled<()>> {
        self.route_record(record)?.delete(kind, record).await
    }

    pub async fn import(
        &self,
        kind: ResourceKind,
        backend: &str,
        external_id: &str,
    ) -> Result<Reconciled<ResourceRecord>> {
        let backend = Backend::parse(backend)?;
        self.reconciler(backend)?.import(kind, external_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SubResourceKind;
    use crate::error::ErrorClass;
    use crate::memory::MemoryBackend;

    fn dispatcher(memory: &MemoryBackend) -> Dispatcher {
        Dispatcher::builder()
            .register(Backend::Aws, Arc::new(memory.clone()))
            .register(Backend::Azure, Arc::new(memory.clone()))
            .build()
    }

    #[tokio::test]
    async fn test_unknown_backend_fails_before_any_call() {
        let memory = MemoryBackend::new("memory");
        let d = dispatcher(&memory);
        let spec = ResourceSpec::new("Z").with("name", "x");

        let err = d.create(ResourceKind::Bucket, &spec).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::UnsupportedBackend);
        assert!(memory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_backend() {
        let memory = MemoryBackend::new("memory");
        let d = dispatcher(&memory);
        let spec = ResourceSpec::new("gcp").with("name", "x");

        let err = d.create(ResourceKind::Bucket, &spec).await.unwrap_err();
        assert!(matches!(err, EngineError::BackendNotConfigured(Backend::Gcp)));
        assert!(memory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_alias_tag_routes_and_normalizes() {
        let memory = MemoryBackend::new("memory");
        let d = dispatcher(&memory);
        let spec = ResourceSpec::new("A").with("name", "my-bucket-1");

        let response = d
            .dispatch(Request::Create {
                kind: ResourceKind::Bucket,
                spec,
            })
            .await
            .unwrap();
        let Response::Created(created) = response else {
            panic!("unexpected response");
        };
        assert_eq!(created.value.id(), Some("my-bucket-1"));
        assert_eq!(created.value.backend_tag(), Some("aws"));
    }

    #[tokio::test]
    async fn test_read_routes_by_record_tag() {
        let memory = MemoryBackend::new("memory");
        let d = dispatcher(&memory);
        let spec = ResourceSpec::new("b")
            .with("name", "Assets")
            .with("location", "westeurope");
        let record = d.create(ResourceKind::Bucket, &spec).await.unwrap().value;
        assert_eq!(record.get("account"), Some(&"assets".into()));

        let read = d.read(ResourceKind::Bucket, &record).await.unwrap();
        assert_eq!(read.value.as_ref(), Some(&record));

        memory.remove(SubResourceKind::BlobContainer, record.id().unwrap());
        let read = d
            .dispatch(Request::Read {
                kind: ResourceKind::Bucket,
                record,
            })
            .await
            .unwrap();
        assert!(matches!(read, Response::Read(r) if r.value.is_none()));
    }

    #[tokio::test]
    async fn test_update_across_backends() {
        let aws = MemoryBackend::new("aws");
        let azure = MemoryBackend::new("azure");
        let d = Dispatcher::builder()
            .register(Backend::Aws, Arc::new(aws.clone()))
            .register(Backend::Azure, Arc::new(azure.clone()))
            .build();

        let spec = ResourceSpec::new("aws").with("name", "reg");
        let record = d.create(ResourceKind::Registry, &spec).await.unwrap().value;

        let moved = ResourceSpec::new("azure").with("name", "reg");
        let updated = d
            .update(ResourceKind::Registry, &record, &moved)
            .await
            .unwrap();

        assert_eq!(updated.value.backend_tag(), Some("azure"));
        assert!(aws.is_empty());
        assert!(azure.contains(SubResourceKind::ContainerRegistry, "stratus-rg/reg"));
    }

    #[tokio::test]
    async fn test_record_without_tag_is_invalid() {
        let memory = MemoryBackend::new("memory");
        let d = dispatcher(&memory);
        let mut record = ResourceRecord::new();
        record.set("id", "x");
        let err = d.delete(ResourceKind::Bucket, &record).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidRecord(_)));
    }
}
