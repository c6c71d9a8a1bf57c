//! Reconciler
//!
//! Drives one resource through a lifecycle call against one adapter:
//! `Planning → Executing → Verifying → Converged | Failed`. Steps run
//! strictly in chain order; the only suspension points are adapter calls
//! and the poller.

use crate::adapter::{BackendAdapter, OperationHandle};
use crate::attrs::{Attributes, BACKEND_KEY, ID_KEY, ResourceRecord, ResourceSpec};
use crate::backend::{Backend, ResourceKind, SubResourceKind};
use crate::chain::{Chain, ChainBuilder, ChainStep, ReusePolicy, Teardown, validate_spec};
use crate::diagnostics::{Diagnostic, Reconciled};
use crate::error::{AdapterError, EngineError, Result, StepCause, StepFailure};
use crate::poller::{PollOutcome, Poller};
use std::fmt;
use std::sync::Arc;

/// Lifecycle phase of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Executing,
    Verifying,
    Converged,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Planning => write!(f, "planning"),
            Phase::Executing => write!(f, "executing"),
            Phase::Verifying => write!(f, "verifying"),
            Phase::Converged => write!(f, "converged"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// A step applied during the current call
#[derive(Debug, Clone)]
struct AppliedStep {
    index: usize,
    kind: SubResourceKind,
    id: String,
    /// False when an existing sub-resource was adopted
    created: bool,
}

/// Lifecycle driver bound to one backend adapter
pub struct Reconciler {
    backend: Backend,
    adapter: Arc<dyn BackendAdapter>,
    poller: Poller,
}

impl Reconciler {
    pub fn new(backend: Backend, adapter: Arc<dyn BackendAdapter>, poller: Poller) -> Self {
        Self {
            backend,
            adapter,
            poller,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    fn enter(&self, op: &str, kind: ResourceKind, phase: Phase) {
        tracing::info!("{} {} on {}: {}", op, kind, self.backend, phase);
    }

    /// Validate a normalized declaration and build its chain
    pub fn plan(&self, kind: ResourceKind, spec: &ResourceSpec) -> Result<Chain> {
        validate_spec(kind, self.backend, &spec.attributes)?;
        ChainBuilder::build(
            kind,
            self.backend,
            &self.adapter.capability(),
            &spec.attributes,
        )
    }

    fn chain_for_record(&self, kind: ResourceKind, record: &ResourceRecord) -> Result<Chain> {
        ChainBuilder::build(
            kind,
            self.backend,
            &self.adapter.capability(),
            &record.attributes,
        )
    }

    fn failure(&self, kind: ResourceKind, step: &ChainStep, cause: StepCause) -> StepFailure {
        StepFailure {
            kind,
            backend: self.backend,
            step: step.index,
            sub_resource: step.kind,
            cause,
            rollback: Vec::new(),
            orphan: None,
        }
    }

    /// Wait for an operation, mapping a non-converged outcome to a cause
    async fn settle(&self, handle: &OperationHandle) -> std::result::Result<(), StepCause> {
        match self.poller.wait(handle).await {
            PollOutcome::Converged => Ok(()),
            PollOutcome::Failed(msg) => Err(StepCause::OperationFailed(msg)),
            PollOutcome::TimedOut => Err(StepCause::TimedOut),
        }
    }

    /// Provision a resource from a normalized declaration
    pub async fn create(
        &self,
        kind: ResourceKind,
        spec: &ResourceSpec,
    ) -> Result<Reconciled<ResourceRecord>> {
        self.enter("create", kind, Phase::Planning);
        let chain = match self.plan(kind, spec) {
            Ok(chain) => chain,
            Err(err) => {
                self.enter("create", kind, Phase::Failed);
                return Err(err);
            }
        };
        tracing::debug!(
            "create {} on {}: {} step(s): {:?}",
            kind,
            self.backend,
            chain.len(),
            chain.sub_resources()
        );

        self.enter("create", kind, Phase::Executing);
        let mut applied: Vec<AppliedStep> = Vec::with_capacity(chain.len());
        let mut outputs: Vec<Attributes> = Vec::with_capacity(chain.len());

        for step in chain.steps() {
            if let Err(failure) = self.execute_step(kind, step, &mut applied, &mut outputs).await {
                return Err(self.fail(kind, failure, &applied).await);
            }
        }

        self.enter("create", kind, Phase::Verifying);
        let terminal = chain.terminal();
        let terminal_id = applied
            .last()
            .map(|a| a.id.clone())
            .unwrap_or_default();
        let verified = match self.adapter.exists(terminal.kind, &terminal_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(StepCause::Verification(format!(
                "{} not found after apply",
                terminal_id
            ))),
            Err(err) => Err(StepCause::Adapter(err)),
        };
        if let Err(cause) = verified {
            let mut failure = self.failure(kind, terminal, cause);
            // The terminal step is not rolled back; it may still be there
            if matches!(failure.cause, StepCause::Adapter(_))
                && applied.last().is_some_and(|a| a.created)
            {
                failure.orphan = Some(terminal_id);
            }
            let earlier = &applied[..applied.len().saturating_sub(1)];
            return Err(self.fail(kind, failure, earlier).await);
        }

        let record = assemble(self.backend, &chain, spec, &outputs);
        self.enter("create", kind, Phase::Converged);
        Ok(Reconciled::new(record))
    }

    async fn execute_step(
        &self,
        kind: ResourceKind,
        step: &ChainStep,
        applied: &mut Vec<AppliedStep>,
        outputs: &mut Vec<Attributes>,
    ) -> std::result::Result<(), StepFailure> {
        if let (ReusePolicy::ReuseIfPresent, Some(target)) = (step.reuse, &step.target) {
            match self.adapter.exists(step.kind, target).await {
                Ok(true) => {
                    tracing::info!("Reusing existing {} {}", step.kind, target);
                    let mut out = Attributes::new();
                    out.insert(ID_KEY.to_string(), target.clone().into());
                    outputs.push(out);
                    applied.push(AppliedStep {
                        index: step.index,
                        kind: step.kind,
                        id: target.clone(),
                        created: false,
                    });
                    return Ok(());
                }
                Ok(false) => {}
                Err(err) => return Err(self.failure(kind, step, StepCause::Adapter(err))),
            }
        }

        let inputs = step.resolve(outputs).map_err(|err| {
            self.failure(
                kind,
                step,
                StepCause::Adapter(AdapterError::Permanent(err.to_string())),
            )
        })?;

        let result = self
            .adapter
            .apply(step.kind, &inputs)
            .await
            .map_err(|err| self.failure(kind, step, StepCause::Adapter(err)))?;

        let Some(id) = result.id().map(str::to_string) else {
            return Err(self.failure(
                kind,
                step,
                StepCause::Adapter(AdapterError::Permanent(format!(
                    "{} returned no identifier",
                    step.kind
                ))),
            ));
        };
        tracing::info!("Created {} {} (step {})", step.kind, id, step.index);

        if let Some(handle) = &result.pending {
            if let Err(cause) = self.settle(handle).await {
                let mut failure = self.failure(kind, step, cause);
                failure.orphan = Some(id);
                return Err(failure);
            }
        }

        outputs.push(result.outputs);
        applied.push(AppliedStep {
            index: step.index,
            kind: step.kind,
            id,
            created: true,
        });
        Ok(())
    }

    /// Roll back and produce the error for a failed create
    async fn fail(
        &self,
        kind: ResourceKind,
        mut failure: StepFailure,
        applied: &[AppliedStep],
    ) -> EngineError {
        self.enter("create", kind, Phase::Failed);
        tracing::warn!("{}", failure);
        failure.rollback = self.rollback(applied).await;
        failure.into()
    }

    /// Destroy steps created in this call, newest first
    ///
    /// Adopted steps are left alone. Failures do not stop the walk; each one
    /// becomes a diagnostic.
    async fn rollback(&self, applied: &[AppliedStep]) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for step in applied.iter().rev() {
            if !step.created {
                tracing::debug!("Keeping adopted {} {}", step.kind, step.id);
                continue;
            }

            tracing::warn!("Rolling back {} {} (step {})", step.kind, step.id, step.index);
            let outcome = match self.adapter.destroy(step.kind, &step.id).await {
                Ok(None) | Err(AdapterError::NotFound(_)) => Ok(()),
                Ok(Some(handle)) => self.settle(&handle).await,
                Err(err) => Err(StepCause::Adapter(err)),
            };

            if let Err(cause) = outcome {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "rollback of step {} ({}) failed: {}",
                        step.index, step.kind, cause
                    ))
                    .with_detail(step.id.clone()),
                );
            }
        }

        diagnostics
    }

    /// Look up the terminal sub-resource of a stored record
    ///
    /// Returns `None` when it no longer exists.
    pub async fn read(
        &self,
        kind: ResourceKind,
        record: &ResourceRecord,
    ) -> Result<Reconciled<Option<ResourceRecord>>> {
        let chain = self.chain_for_record(kind, record)?;
        let (step, id) = recorded_terminal(&chain, record).ok_or_else(|| {
            EngineError::InvalidRecord(format!("{} record holds no identifiers", kind))
        })?;

        match self.adapter.exists(step.kind, id).await {
            Ok(true) => Ok(Reconciled::new(Some(record.clone()))),
            Ok(false) | Err(AdapterError::NotFound(_)) => {
                tracing::warn!("{} {} was deleted outside of stratus", kind, id);
                Ok(Reconciled::with_diagnostics(
                    None,
                    vec![
                        Diagnostic::warning(format!("{} no longer exists", kind))
                            .with_detail(id.to_string()),
                    ],
                ))
            }
            Err(err) => Err(self.failure(kind, step, StepCause::Adapter(err)).into()),
        }
    }

    /// Tear a resource down in reverse chain order
    pub async fn delete(&self, kind: ResourceKind, record: &ResourceRecord) -> Result<Reconciled<()>> {
        self.enter("delete", kind, Phase::Planning);
        let chain = self.chain_for_record(kind, record)?;
        let Some((terminal, terminal_id)) = recorded_terminal(&chain, record) else {
            self.enter("delete", kind, Phase::Converged);
            return Ok(Reconciled::new(()));
        };

        self.enter("delete", kind, Phase::Executing);
        let present = match self.adapter.exists(terminal.kind, terminal_id).await {
            Ok(present) => present,
            Err(AdapterError::NotFound(_)) => false,
            Err(err) => {
                self.enter("delete", kind, Phase::Failed);
                return Err(self.failure(kind, terminal, StepCause::Adapter(err)).into());
            }
        };

        if !present {
            let diagnostics = self.probe_orphans(&chain, record, terminal.index).await;
            self.enter("delete", kind, Phase::Converged);
            return Ok(Reconciled::with_diagnostics((), diagnostics));
        }

        for step in chain.teardown_order() {
            if step.teardown == Teardown::Retain {
                tracing::debug!("Retaining shared {}", step.kind);
                continue;
            }
            let Some(id) = step.recorded_id(&record.attributes) else {
                continue;
            };
            if let Err(cause) = self.destroy_step(step, id, step.index == terminal.index).await {
                self.enter("delete", kind, Phase::Failed);
                return Err(self.failure(kind, step, cause).into());
            }
        }

        self.enter("delete", kind, Phase::Converged);
        Ok(Reconciled::new(()))
    }

    async fn destroy_step(
        &self,
        step: &ChainStep,
        id: &str,
        known_present: bool,
    ) -> std::result::Result<(), StepCause> {
        if !known_present {
            match self.adapter.exists(step.kind, id).await {
                Ok(true) => {}
                Ok(false) | Err(AdapterError::NotFound(_)) => {
                    tracing::debug!("{} {} already gone", step.kind, id);
                    return Ok(());
                }
                Err(err) => return Err(StepCause::Adapter(err)),
            }
        }

        match self.adapter.destroy(step.kind, id).await {
            Ok(None) => {}
            Ok(Some(handle)) => self.settle(&handle).await?,
            Err(AdapterError::NotFound(_)) => {}
            Err(err) => return Err(StepCause::Adapter(err)),
        }
        tracing::info!("Destroyed {} {} (step {})", step.kind, id, step.index);
        Ok(())
    }

    /// Existence checks only, for a resource whose terminal is already gone
    async fn probe_orphans(
        &self,
        chain: &Chain,
        record: &ResourceRecord,
        terminal: usize,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for step in chain.teardown_order() {
            if step.index == terminal || step.teardown == Teardown::Retain {
                continue;
            }
            let Some(id) = step.recorded_id(&record.attributes) else {
                continue;
            };
            match self.adapter.exists(step.kind, id).await {
                Ok(false) | Err(AdapterError::NotFound(_)) => {}
                Ok(true) => {
                    tracing::warn!("Orphaned {} {} left in place", step.kind, id);
                    diagnostics.push(
                        Diagnostic::warning(format!("orphaned {} left in place", step.kind))
                            .with_detail(id.to_string()),
                    );
                }
                Err(err) => diagnostics.push(
                    Diagnostic::warning(format!("could not check {}: {}", step.kind, err))
                        .with_detail(id.to_string()),
                ),
            }
        }
        diagnostics
    }

    /// Replace a resource: delete the stored one, then create from the spec
    ///
    /// A failed delete returns before anything is created, so the stored
    /// record stays valid.
    pub async fn update(
        &self,
        kind: ResourceKind,
        record: &ResourceRecord,
        spec: &ResourceSpec,
    ) -> Result<Reconciled<ResourceRecord>> {
        let deleted = self.delete(kind, record).await?;
        let created = self.create(kind, spec).await?;
        let mut diagnostics = deleted.diagnostics;
        diagnostics.extend(created.diagnostics);
        Ok(Reconciled::with_diagnostics(created.value, diagnostics))
    }

    /// Adopt an existing resource by its primary identifier
    pub async fn import(
        &self,
        kind: ResourceKind,
        external_id: &str,
    ) -> Result<Reconciled<ResourceRecord>> {
        let chain = self.chain_for_record(kind, &ResourceRecord::new())?;
        let primary = chain.primary().ok_or_else(|| {
            EngineError::InvalidChain(format!("{} has no primary step", kind))
        })?;

        let not_found = || EngineError::NotFound {
            kind,
            backend: self.backend,
            id: external_id.to_string(),
        };
        match self.adapter.exists(primary.kind, external_id).await {
            Ok(true) => {}
            Ok(false) | Err(AdapterError::NotFound(_)) => return Err(not_found()),
            Err(err) => return Err(self.failure(kind, primary, StepCause::Adapter(err)).into()),
        }

        let mut record = ResourceRecord::new();
        record.set(ID_KEY, external_id);
        record.set(BACKEND_KEY, self.backend.tag());
        tracing::info!("Imported {} {} from {}", kind, external_id, self.backend);
        Ok(Reconciled::new(record))
    }
}

/// Last chain step whose identifier is present in the record
fn recorded_terminal<'a>(
    chain: &'a Chain,
    record: &'a ResourceRecord,
) -> Option<(&'a ChainStep, &'a str)> {
    chain
        .teardown_order()
        .find_map(|step| step.recorded_id(&record.attributes).map(|id| (step, id)))
}

/// Normalized spec attributes, extra step outputs and every step identifier
fn assemble(
    backend: Backend,
    chain: &Chain,
    spec: &ResourceSpec,
    outputs: &[Attributes],
) -> ResourceRecord {
    let mut record = ResourceRecord::from_attributes(spec.attributes.clone());
    for out in outputs {
        for (key, value) in out {
            if key != ID_KEY {
                record.set(key.clone(), value.clone());
            }
        }
    }
    for (step, out) in chain.steps().iter().zip(outputs) {
        if let Some(id) = out.get(ID_KEY) {
            record.set(step.output_key.clone(), id.clone());
        }
    }
    record.set(BACKEND_KEY, backend.tag());
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributesExt;
    use crate::memory::{Call, MemoryBackend};
    use crate::naming::normalize;
    use crate::poller::PollConfig;
    use std::time::Duration;

    fn reconciler(backend: Backend, memory: &MemoryBackend) -> Reconciler {
        Reconciler::new(
            backend,
            Arc::new(memory.clone()),
            Poller::new(PollConfig::new(
                Duration::from_secs(5),
                Duration::from_secs(60),
            )),
        )
    }

    fn spec(backend: Backend, kind: ResourceKind, pairs: &[(&str, &str)]) -> ResourceSpec {
        let mut raw = Attributes::new();
        for (k, v) in pairs {
            raw.insert(k.to_string(), (*v).into());
        }
        ResourceSpec {
            backend: backend.tag().to_string(),
            attributes: normalize(backend, kind, &raw),
        }
    }

    fn destroys(calls: &[Call]) -> Vec<(SubResourceKind, String)> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Destroy(kind, id) => Some((*kind, id.clone())),
                _ => None,
            })
            .collect()
    }

    fn function_spec() -> ResourceSpec {
        spec(
            Backend::Azure,
            ResourceKind::Function,
            &[
                ("name", "thumbs"),
                ("runtime", "node"),
                ("handler", "index.handler"),
                ("code", "UEsDBA=="),
            ],
        )
    }

    #[tokio::test]
    async fn test_single_step_bucket() {
        let memory = MemoryBackend::new("aws");
        let r = reconciler(Backend::Aws, &memory);
        let spec = spec(Backend::Aws, ResourceKind::Bucket, &[("name", "my-bucket-1")]);

        let created = r.create(ResourceKind::Bucket, &spec).await.unwrap();
        let record = created.value;
        assert_eq!(record.id(), Some("my-bucket-1"));
        assert_eq!(record.backend_tag(), Some("aws"));
        assert_eq!(
            memory
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::Apply(..)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_azure_instance_six_steps_with_mapped_size() {
        let memory = MemoryBackend::new("azure");
        let r = reconciler(Backend::Azure, &memory);
        let spec = spec(
            Backend::Azure,
            ResourceKind::Instance,
            &[("name", "web"), ("size", "small")],
        );

        let record = r.create(ResourceKind::Instance, &spec).await.unwrap().value;

        let applies: Vec<SubResourceKind> = memory
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::Apply(kind, _) => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            applies,
            vec![
                SubResourceKind::ResourceGroup,
                SubResourceKind::VirtualNetwork,
                SubResourceKind::Subnet,
                SubResourceKind::PublicAddress,
                SubResourceKind::NetworkInterface,
                SubResourceKind::ComputeInstance,
            ]
        );

        let vm = memory
            .get(SubResourceKind::ComputeInstance, "stratus-rg/web")
            .unwrap();
        assert_eq!(vm.str_attr("size"), Some("Standard_B1s"));
        assert_eq!(vm.str_attr("network_interface"), Some("stratus-rg/web-nic"));

        assert_eq!(record.id(), Some("stratus-rg/web"));
        assert_eq!(record.get("interface_id"), Some(&"stratus-rg/web-nic".into()));
        assert_eq!(record.get("resource_group"), Some(&"stratus-rg".into()));
    }

    #[tokio::test]
    async fn test_shared_prerequisites_are_adopted() {
        let memory = MemoryBackend::new("azure");
        memory.insert(SubResourceKind::ResourceGroup, "stratus-rg");
        memory.insert(SubResourceKind::VirtualNetwork, "stratus-rg/stratus-vnet");
        memory.insert(SubResourceKind::Subnet, "stratus-rg/stratus-vnet/default");
        let r = reconciler(Backend::Azure, &memory);

        let spec = spec(Backend::Azure, ResourceKind::Instance, &[("name", "api")]);
        r.create(ResourceKind::Instance, &spec).await.unwrap();

        let applies = memory
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Apply(..)))
            .count();
        assert_eq!(applies, 3);
    }

    #[tokio::test]
    async fn test_leftover_prerequisites_are_adopted() {
        let memory = MemoryBackend::new("azure");
        memory.insert(SubResourceKind::PublicAddress, "stratus-rg/web-pip");
        let r = reconciler(Backend::Azure, &memory);

        let spec = spec(Backend::Azure, ResourceKind::Instance, &[("name", "web")]);
        let record = r.create(ResourceKind::Instance, &spec).await.unwrap().value;

        assert!(
            !memory
                .calls()
                .contains(&Call::Apply(SubResourceKind::PublicAddress, "stratus-rg/web-pip".into()))
        );
        assert_eq!(record.get("address_id"), Some(&"stratus-rg/web-pip".into()));
        assert_eq!(record.id(), Some("stratus-rg/web"));

        // adopted, but still torn down with the instance
        memory.clear_calls();
        r.delete(ResourceKind::Instance, &record).await.unwrap();
        assert!(!memory.contains(SubResourceKind::PublicAddress, "stratus-rg/web-pip"));
    }

    #[tokio::test]
    async fn test_reapply_after_failed_rollback_succeeds() {
        let memory = MemoryBackend::new("azure");
        memory.fail_apply(
            SubResourceKind::FunctionApp,
            AdapterError::Permanent("runtime not allowed".into()),
        );
        memory.fail_destroy(
            SubResourceKind::StorageAccount,
            AdapterError::Transient("account busy".into()),
        );
        let r = reconciler(Backend::Azure, &memory);

        let err = r
            .create(ResourceKind::Function, &function_spec())
            .await
            .unwrap_err();
        assert_eq!(err.step_failure().unwrap().rollback.len(), 1);
        assert!(memory.contains(SubResourceKind::StorageAccount, "stratus-rg/thumbs"));

        memory.clear_failures();
        let record = r
            .create(ResourceKind::Function, &function_spec())
            .await
            .unwrap()
            .value;
        assert_eq!(record.get("account_id"), Some(&"stratus-rg/thumbs".into()));
    }

    #[tokio::test]
    async fn test_verification_error_reports_terminal_orphan() {
        let memory = MemoryBackend::new("aws");
        memory.fail_exists(
            SubResourceKind::ObjectBucket,
            AdapterError::Transient("throttled".into()),
        );
        let r = reconciler(Backend::Aws, &memory);
        let spec = spec(Backend::Aws, ResourceKind::Bucket, &[("name", "logs")]);

        let err = r.create(ResourceKind::Bucket, &spec).await.unwrap_err();
        let failure = err.step_failure().unwrap();
        assert_eq!(failure.sub_resource, SubResourceKind::ObjectBucket);
        assert_eq!(failure.orphan.as_deref(), Some("logs"));
        assert!(memory.contains(SubResourceKind::ObjectBucket, "logs"));
    }

    #[tokio::test]
    async fn test_failed_secret_version_rolls_back_secret() {
        let memory = MemoryBackend::new("gcp");
        memory.fail_apply(
            SubResourceKind::SecretVersion,
            AdapterError::Permanent("payload too large".into()),
        );
        let r = reconciler(Backend::Gcp, &memory);
        let spec = spec(
            Backend::Gcp,
            ResourceKind::Secret,
            &[("name", "db-pass"), ("value", "hunter2")],
        );

        let err = r.create(ResourceKind::Secret, &spec).await.unwrap_err();
        let failure = err.step_failure().unwrap();
        assert_eq!(failure.sub_resource, SubResourceKind::SecretVersion);
        assert!(failure.rollback.is_empty());
        assert_eq!(
            destroys(&memory.calls()),
            vec![(SubResourceKind::Secret, "db-pass".to_string())]
        );
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_failed_gateway_attachment_rolls_back_network() {
        let memory = MemoryBackend::new("aws");
        memory.fail_apply(
            SubResourceKind::GatewayAttachment,
            AdapterError::Permanent("gateway already attached".into()),
        );
        let r = reconciler(Backend::Aws, &memory);
        let spec = spec(Backend::Aws, ResourceKind::Network, &[("name", "core")]);

        let err = r.create(ResourceKind::Network, &spec).await.unwrap_err();
        assert_eq!(err.step_failure().unwrap().step, 3);
        assert_eq!(
            destroys(&memory.calls())
                .into_iter()
                .map(|(kind, _)| kind)
                .collect::<Vec<_>>(),
            vec![
                SubResourceKind::InternetGateway,
                SubResourceKind::Subnet,
                SubResourceKind::VirtualNetwork,
            ]
        );
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_in_reverse_on_transient_failure() {
        let memory = MemoryBackend::new("azure");
        memory.fail_apply(
            SubResourceKind::FunctionPlan,
            AdapterError::Transient("throttled".into()),
        );
        let r = reconciler(Backend::Azure, &memory);

        let err = r
            .create(ResourceKind::Function, &function_spec())
            .await
            .unwrap_err();

        assert_eq!(
            destroys(&memory.calls()),
            vec![
                (SubResourceKind::StorageAccount, "stratus-rg/thumbs".to_string()),
                (SubResourceKind::ResourceGroup, "stratus-rg".to_string()),
            ]
        );

        let failure = err.step_failure().unwrap();
        assert_eq!(failure.step, 2);
        assert_eq!(failure.sub_resource, SubResourceKind::FunctionPlan);
        assert!(failure.rollback.is_empty());
        assert!(err.is_retryable());
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_skips_adopted_steps_and_reports_failures() {
        let memory = MemoryBackend::new("azure");
        memory.insert(SubResourceKind::ResourceGroup, "stratus-rg");
        memory.fail_apply(
            SubResourceKind::FunctionApp,
            AdapterError::Permanent("runtime not allowed".into()),
        );
        memory.fail_destroy(
            SubResourceKind::FunctionPlan,
            AdapterError::Permanent("plan locked".into()),
        );
        let r = reconciler(Backend::Azure, &memory);

        let err = r
            .create(ResourceKind::Function, &function_spec())
            .await
            .unwrap_err();

        let destroyed = destroys(&memory.calls());
        assert_eq!(
            destroyed.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            vec![SubResourceKind::FunctionPlan, SubResourceKind::StorageAccount]
        );
        assert!(memory.contains(SubResourceKind::ResourceGroup, "stratus-rg"));

        let failure = err.step_failure().unwrap();
        assert_eq!(failure.rollback.len(), 1);
        assert!(failure.rollback[0].summary.contains("function-plan"));
        assert!(!err.is_retryable());
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_step_timeout_reports_orphan() {
        let memory = MemoryBackend::new("azure").with_async(&[SubResourceKind::ComputeInstance]);
        memory.stall(SubResourceKind::ComputeInstance);
        let r = reconciler(Backend::Azure, &memory);
        let spec = spec(Backend::Azure, ResourceKind::Instance, &[("name", "slow")]);

        let err = r.create(ResourceKind::Instance, &spec).await.unwrap_err();
        let failure = err.step_failure().unwrap();
        assert_eq!(failure.cause, StepCause::TimedOut);
        assert_eq!(failure.orphan.as_deref(), Some("stratus-rg/slow"));

        let destroyed: Vec<_> = destroys(&memory.calls()).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            destroyed,
            vec![
                SubResourceKind::NetworkInterface,
                SubResourceKind::PublicAddress,
                SubResourceKind::Subnet,
                SubResourceKind::VirtualNetwork,
                SubResourceKind::ResourceGroup,
            ]
        );
    }

    #[tokio::test]
    async fn test_create_then_read_round_trip() {
        let memory = MemoryBackend::new("gcp").with_async(&[SubResourceKind::ComputeInstance]);
        let r = reconciler(Backend::Gcp, &memory);
        let spec = spec(
            Backend::Gcp,
            ResourceKind::Instance,
            &[("name", "Worker_1"), ("size", "medium")],
        );

        let record = r.create(ResourceKind::Instance, &spec).await.unwrap().value;
        assert_eq!(record.id(), Some("us-central1-a/worker-1"));

        let read = r.read(ResourceKind::Instance, &record).await.unwrap();
        assert_eq!(read.value, Some(record));
        assert!(read.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_read_after_out_of_band_delete_is_absent() {
        let memory = MemoryBackend::new("aws");
        let r = reconciler(Backend::Aws, &memory);
        let spec = spec(Backend::Aws, ResourceKind::Bucket, &[("name", "logs")]);
        let record = r.create(ResourceKind::Bucket, &spec).await.unwrap().value;

        memory.remove(SubResourceKind::ObjectBucket, "logs");

        let read = r.read(ResourceKind::Bucket, &record).await.unwrap();
        assert!(read.value.is_none());
        assert_eq!(read.warnings().count(), 1);
    }

    #[tokio::test]
    async fn test_delete_walks_reverse_and_retains_shared() {
        let memory = MemoryBackend::new("azure");
        let r = reconciler(Backend::Azure, &memory);
        let spec = spec(Backend::Azure, ResourceKind::Instance, &[("name", "web")]);
        let record = r.create(ResourceKind::Instance, &spec).await.unwrap().value;
        memory.clear_calls();

        r.delete(ResourceKind::Instance, &record).await.unwrap();

        let destroyed: Vec<_> = destroys(&memory.calls()).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            destroyed,
            vec![
                SubResourceKind::ComputeInstance,
                SubResourceKind::NetworkInterface,
                SubResourceKind::PublicAddress,
            ]
        );
        assert!(memory.contains(SubResourceKind::ResourceGroup, "stratus-rg"));
        assert!(memory.contains(SubResourceKind::Subnet, "stratus-rg/stratus-vnet/default"));
    }

    #[tokio::test]
    async fn test_delete_of_absent_resource_only_checks_existence() {
        let memory = MemoryBackend::new("azure");
        let r = reconciler(Backend::Azure, &memory);
        let spec = spec(Backend::Azure, ResourceKind::Instance, &[("name", "web")]);
        let record = r.create(ResourceKind::Instance, &spec).await.unwrap().value;

        memory.remove(SubResourceKind::ComputeInstance, "stratus-rg/web");
        memory.clear_calls();

        let deleted = r.delete(ResourceKind::Instance, &record).await.unwrap();

        assert!(
            memory
                .calls()
                .iter()
                .all(|c| matches!(c, Call::Exists(..)))
        );
        // interface and address are still there
        assert_eq!(deleted.warnings().count(), 2);
    }

    #[tokio::test]
    async fn test_delete_twice_is_idempotent() {
        let memory = MemoryBackend::new("aws");
        let r = reconciler(Backend::Aws, &memory);
        let spec = spec(Backend::Aws, ResourceKind::Network, &[("name", "core")]);
        let record = r.create(ResourceKind::Network, &spec).await.unwrap().value;
        assert_eq!(record.get("gateway_id"), Some(&"internet-gateway-3".into()));

        r.delete(ResourceKind::Network, &record).await.unwrap();
        assert!(memory.is_empty());

        memory.clear_calls();
        let again = r.delete(ResourceKind::Network, &record).await.unwrap();
        assert!(again.diagnostics.is_empty());
        assert!(
            memory
                .calls()
                .iter()
                .all(|c| matches!(c, Call::Exists(..)))
        );
    }

    #[tokio::test]
    async fn test_update_replaces_resource() {
        let memory = MemoryBackend::new("aws");
        let r = reconciler(Backend::Aws, &memory);
        let old = spec(Backend::Aws, ResourceKind::Registry, &[("name", "jobs")]);
        let record = r.create(ResourceKind::Registry, &old).await.unwrap().value;

        let new = spec(Backend::Aws, ResourceKind::Registry, &[("name", "jobs-v2")]);
        let updated = r.update(ResourceKind::Registry, &record, &new).await.unwrap();

        assert_eq!(updated.value.id(), Some("jobs-v2"));
        assert!(!memory.contains(SubResourceKind::ContainerRegistry, "jobs"));
        assert!(memory.contains(SubResourceKind::ContainerRegistry, "jobs-v2"));
    }

    #[tokio::test]
    async fn test_failed_delete_aborts_update() {
        let memory = MemoryBackend::new("aws");
        let r = reconciler(Backend::Aws, &memory);
        let old = spec(Backend::Aws, ResourceKind::Secret, &[("name", "token"), ("value", "a")]);
        let record = r.create(ResourceKind::Secret, &old).await.unwrap().value;

        memory.fail_destroy(SubResourceKind::Secret, AdapterError::Permanent("denied".into()));
        let new = spec(Backend::Aws, ResourceKind::Secret, &[("name", "token2"), ("value", "b")]);
        assert!(r.update(ResourceKind::Secret, &record, &new).await.is_err());
        assert!(!memory.contains(SubResourceKind::Secret, "token2"));
        assert!(memory.contains(SubResourceKind::Secret, "token"));
    }

    #[tokio::test]
    async fn test_import() {
        let memory = MemoryBackend::new("aws");
        memory.insert(SubResourceKind::ObjectBucket, "legacy-assets");
        let r = reconciler(Backend::Aws, &memory);

        let record = r
            .import(ResourceKind::Bucket, "legacy-assets")
            .await
            .unwrap()
            .value;
        assert_eq!(record.id(), Some("legacy-assets"));
        assert_eq!(record.backend_tag(), Some("aws"));

        let err = r.import(ResourceKind::Bucket, "missing").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_spec_makes_no_calls() {
        let memory = MemoryBackend::new("gcp");
        let r = reconciler(Backend::Gcp, &memory);
        let spec = spec(Backend::Gcp, ResourceKind::Database, &[("name", "orders")]);

        let err = r.create(ResourceKind::Database, &spec).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSpec { .. }));
        assert!(memory.calls().is_empty());
    }
}
