//! Dependency chains
//!
//! A chain is the ordered list of sub-resource steps that realize one
//! logical resource on one backend. Chains are built from the declarative
//! table in [`crate::catalog`] and are pure data: building one never talks
//! to a backend.

use crate::adapter::{BackendCapability, Completion};
use crate::attrs::{AttrValue, Attributes, AttributesExt, ID_KEY};
use crate::backend::{Backend, ResourceKind, SubResourceKind};
use crate::catalog;
use crate::error::{EngineError, Result};
use std::collections::BTreeSet;

/// Whether an existing sub-resource may be adopted instead of created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReusePolicy {
    AlwaysCreate,
    ReuseIfPresent,
}

/// What happens to the sub-resource on teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    Destroy,
    /// Shared prerequisites outlive the resource
    Retain,
}

/// Where a step input comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Literal(AttrValue),
    /// Output `key` of an earlier step
    Output { step: usize, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInput {
    pub name: String,
    pub source: InputSource,
}

/// One sub-resource provisioning step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStep {
    pub index: usize,
    pub kind: SubResourceKind,

    /// Record key the step's identifier is stored under
    pub output_key: String,

    /// Deterministic identifier, when the backend lets the caller choose it
    pub target: Option<String>,
    pub inputs: Vec<StepInput>,
    pub completion: Completion,
    pub reuse: ReusePolicy,
    pub teardown: Teardown,
}

impl ChainStep {
    /// Resolve the step inputs against outputs of the steps applied so far
    pub fn resolve(&self, outputs: &[Attributes]) -> Result<Attributes> {
        let mut resolved = Attributes::new();
        for input in &self.inputs {
            let value = match &input.source {
                InputSource::Literal(value) => value.clone(),
                InputSource::Output { step, key } => outputs
                    .get(*step)
                    .and_then(|out| out.get(key))
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::InvalidChain(format!(
                            "step {} input '{}' needs output '{}' of step {}",
                            self.index, input.name, key, step
                        ))
                    })?,
            };
            resolved.insert(input.name.clone(), value);
        }
        if let Some(target) = &self.target {
            resolved.insert(ID_KEY.to_string(), target.clone().into());
        }
        Ok(resolved)
    }

    /// Identifier recorded for this step, if any
    pub fn recorded_id<'a>(&self, record: &'a Attributes) -> Option<&'a str> {
        record.str_attr(&self.output_key).filter(|id| !id.is_empty())
    }
}

/// Ordered, validated list of steps for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub resource: ResourceKind,
    pub backend: Backend,
    steps: Vec<ChainStep>,
}

impl Chain {
    /// Validate and wrap a list of steps
    ///
    /// Step `i` may only reference outputs of steps `0..i`, output keys are
    /// unique, exactly one step records the primary `id`, and reusable steps
    /// carry a target to probe.
    pub fn new(resource: ResourceKind, backend: Backend, steps: Vec<ChainStep>) -> Result<Self> {
        if steps.is_empty() {
            return Err(EngineError::InvalidChain(format!(
                "{} on {} has no steps",
                resource, backend
            )));
        }

        let mut keys = BTreeSet::new();
        for (position, step) in steps.iter().enumerate() {
            if step.index != position {
                return Err(EngineError::InvalidChain(format!(
                    "step at position {} has index {}",
                    position, step.index
                )));
            }
            if !keys.insert(step.output_key.as_str()) {
                return Err(EngineError::InvalidChain(format!(
                    "duplicate output key '{}'",
                    step.output_key
                )));
            }
            for input in &step.inputs {
                if let InputSource::Output { step: source, .. } = input.source {
                    if source >= position {
                        return Err(EngineError::InvalidChain(format!(
                            "step {} ({}) references step {}",
                            position, step.kind, source
                        )));
                    }
                }
            }
            if step.reuse == ReusePolicy::ReuseIfPresent && step.target.is_none() {
                return Err(EngineError::InvalidChain(format!(
                    "reusable step {} ({}) has no target",
                    position, step.kind
                )));
            }
        }

        if !keys.contains(ID_KEY) {
            return Err(EngineError::InvalidChain(format!(
                "no step of {} on {} records '{}'",
                resource, backend, ID_KEY
            )));
        }

        Ok(Self {
            resource,
            backend,
            steps,
        })
    }

    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Last step in creation order
    pub fn terminal(&self) -> &ChainStep {
        // Chain::new rejects empty chains
        &self.steps[self.steps.len() - 1]
    }

    /// Step whose identifier is the resource's primary `id`
    pub fn primary(&self) -> Option<&ChainStep> {
        self.steps.iter().find(|s| s.output_key == ID_KEY)
    }

    /// Steps in teardown order
    pub fn teardown_order(&self) -> impl Iterator<Item = &ChainStep> {
        self.steps.iter().rev()
    }

    pub fn sub_resources(&self) -> Vec<SubResourceKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }
}

/// Builds chains from the declarative table
pub struct ChainBuilder;

impl ChainBuilder {
    /// Build the chain for one resource
    ///
    /// Missing optional attributes fall back to defaults; required ones are
    /// checked separately by [`validate_spec`].
    pub fn build(
        kind: ResourceKind,
        backend: Backend,
        capability: &BackendCapability,
        attrs: &Attributes,
    ) -> Result<Chain> {
        let plans = catalog::steps(kind, backend, attrs);

        let mut steps = Vec::with_capacity(plans.len());
        for (index, plan) in plans.into_iter().enumerate() {
            let completion = capability.completion(plan.kind).ok_or(
                EngineError::UnsupportedSubResource {
                    kind,
                    backend,
                    sub_resource: plan.kind,
                },
            )?;
            steps.push(ChainStep {
                index,
                kind: plan.kind,
                output_key: plan.output_key.to_string(),
                target: plan.target,
                inputs: plan.inputs,
                completion,
                reuse: plan.reuse,
                teardown: plan.teardown,
            });
        }

        Chain::new(kind, backend, steps)
    }
}

/// Attributes a declaration must carry, beyond `name`
fn required_attributes(kind: ResourceKind, backend: Backend) -> &'static [&'static str] {
    match (kind, backend) {
        (ResourceKind::Instance, Backend::Aws) => &["image"],
        (ResourceKind::Function, _) => &["runtime", "handler", "code"],
        (ResourceKind::Database, _) => &["engine"],
        (ResourceKind::ServerlessContainer, _) => &["image"],
        (ResourceKind::DnsRecord, Backend::Aws) => &["zone", "value", "hosted_zone_id"],
        (ResourceKind::DnsRecord, _) => &["zone", "value"],
        (ResourceKind::Secret, _) => &["value"],
        _ => &[],
    }
}

/// Check that a declaration carries every required attribute
pub fn validate_spec(kind: ResourceKind, backend: Backend, attrs: &Attributes) -> Result<()> {
    let missing: Vec<&str> = std::iter::once("name")
        .chain(required_attributes(kind, backend).iter().copied())
        .filter(|key| match attrs.get(*key) {
            None => true,
            Some(AttrValue::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::InvalidSpec {
            kind,
            message: format!("missing required attribute(s): {}", missing.join(", ")),
        })
    }
}
