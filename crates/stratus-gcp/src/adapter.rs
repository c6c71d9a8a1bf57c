//! Google Cloud backend adapter
//!
//! Compute Engine calls answer with a long-running operation which is
//! handed to the engine's poller; Storage, Cloud DNS and Secret Manager
//! calls complete synchronously. Every invocation is a single REST call: a
//! secret and its payload version are separate chain steps.

use crate::api::GcpApi;
use crate::error::{GcpError, Result};
use crate::requests::{self, ApiCall};
use async_trait::async_trait;
use serde_json::Value;
use stratus_engine::{
    AdapterResult, Applied, Attributes, AttributesExt, BackendAdapter, BackendCapability,
    OperationHandle, OperationProbe, OperationStatus, SubResourceKind,
};
use std::sync::Arc;

/// Google Cloud adapter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpSettings {
    pub project: String,
    pub access_token: String,
}

impl GcpSettings {
    /// Read `GOOGLE_CLOUD_PROJECT` and `GOOGLE_OAUTH_ACCESS_TOKEN`
    pub fn from_env() -> Result<Self> {
        let project = std::env::var("GOOGLE_CLOUD_PROJECT")
            .or_else(|_| std::env::var("CLOUDSDK_CORE_PROJECT"))
            .map_err(|_| GcpError::MissingEnvVar("GOOGLE_CLOUD_PROJECT".to_string()))?;
        let access_token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .map_err(|_| GcpError::MissingEnvVar("GOOGLE_OAUTH_ACCESS_TOKEN".to_string()))?;
        Ok(Self {
            project,
            access_token,
        })
    }
}

/// Capability of the REST adapter
pub fn capability() -> BackendCapability {
    BackendCapability::new()
        .sync(SubResourceKind::ObjectBucket)
        .poll(SubResourceKind::VirtualNetwork)
        .poll(SubResourceKind::Subnet)
        .poll(SubResourceKind::ComputeInstance)
        .poll(SubResourceKind::PublicAddress)
        .sync(SubResourceKind::DnsZone)
        .sync(SubResourceKind::DnsRecord)
        .sync(SubResourceKind::Secret)
        .sync(SubResourceKind::SecretVersion)
}

/// Identifier of a created sub-resource, matching the chain's scoping
fn created_id(kind: SubResourceKind, inputs: &Attributes) -> Result<String> {
    if let Some(id) = inputs.str_attr("id") {
        return Ok(id.to_string());
    }
    let name = inputs
        .str_attr("name")
        .ok_or_else(|| GcpError::MissingInput("name".into()))?;
    Ok(match kind {
        SubResourceKind::ComputeInstance => format!("{}/{}", inputs.str_or("zone", ""), name),
        SubResourceKind::Subnet | SubResourceKind::PublicAddress => {
            format!("{}/{}", inputs.str_or("region", ""), name)
        }
        _ => name.to_string(),
    })
}

/// Destroyed secret versions stay listed with state `DESTROYED`
fn version_is_live(body: &Value) -> bool {
    body.get("state").and_then(|v| v.as_str()) != Some("DESTROYED")
}

fn operation_status(op: &crate::api::Operation) -> OperationStatus {
    if !op.is_done() {
        return OperationStatus::Pending;
    }
    match op.failure() {
        Some(message) => OperationStatus::Failed(message),
        None => OperationStatus::Done,
    }
}

/// Polls a Compute Engine operation
struct OperationPoll {
    api: GcpApi,
    self_link: String,
}

#[async_trait]
impl OperationProbe for OperationPoll {
    async fn status(&self) -> AdapterResult<OperationStatus> {
        let op = self.api.operation(&self.self_link).await?;
        tracing::debug!("Operation {}: {}", op.name, op.status);
        Ok(operation_status(&op))
    }
}

/// Google Cloud backend adapter
pub struct GcpAdapter {
    api: GcpApi,
    project: String,
}

impl GcpAdapter {
    pub fn new(settings: GcpSettings) -> Self {
        Self {
            api: GcpApi::new(settings.access_token),
            project: settings.project,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(GcpSettings::from_env()?))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Wrap a Compute Engine operation response in a handle
    fn operation_handle(&self, response: &Value) -> Result<OperationHandle> {
        let self_link = response
            .get("selfLink")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GcpError::OperationFailed("response carried no operation".into()))?;
        let probe = Arc::new(OperationPoll {
            api: self.api.clone(),
            self_link: self_link.to_string(),
        });
        Ok(OperationHandle::new(self_link, self.label(), probe))
    }

    async fn apply_inner(&self, kind: SubResourceKind, inputs: &Attributes) -> Result<Applied> {
        let call = requests::create_call(&self.project, kind, inputs)?;

        // Version numbers are assigned by Secret Manager
        if kind == SubResourceKind::SecretVersion {
            let response = self.api.send(&call).await?;
            let id = response
                .get("name")
                .and_then(|v| v.as_str())
                .and_then(requests::secret_version_id)
                .ok_or_else(|| GcpError::OperationFailed("version response carried no name".into()))?;
            return Ok(Applied::done(id));
        }

        let id = created_id(kind, inputs)?;
        let response = self.api.send(&call).await?;

        if requests::is_compute(kind) {
            let handle = self.operation_handle(&response)?;
            return Ok(Applied::pending(id, handle));
        }

        let mut applied = Applied::done(id);
        if kind == SubResourceKind::DnsZone {
            if let Some(servers) = response.get("nameServers").and_then(|v| v.as_array()) {
                let servers: Vec<&str> = servers.iter().filter_map(|s| s.as_str()).collect();
                applied = applied.with_output("name_servers", servers.join(","));
            }
        }
        Ok(applied)
    }

    async fn destroy_inner(&self, kind: SubResourceKind, id: &str) -> Result<Option<OperationHandle>> {
        let call = requests::delete_call(&self.project, kind, id)?;
        let response = self.api.send(&call).await?;
        if requests::is_compute(kind) {
            return Ok(Some(self.operation_handle(&response)?));
        }
        Ok(None)
    }

    async fn exists_inner(&self, kind: SubResourceKind, id: &str) -> Result<bool> {
        let call: ApiCall = requests::get_call(&self.project, kind, id)?;
        Ok(match self.api.get(&call).await? {
            Some(body) if kind == SubResourceKind::SecretVersion => version_is_live(&body),
            found => found.is_some(),
        })
    }
}

#[async_trait]
impl BackendAdapter for GcpAdapter {
    fn label(&self) -> &str {
        "gcp"
    }

    fn capability(&self) -> BackendCapability {
        capability()
    }

    async fn apply(&self, kind: SubResourceKind, inputs: &Attributes) -> AdapterResult<Applied> {
        tracing::info!("Creating {} in project {}", kind, self.project);
        Ok(self.apply_inner(kind, inputs).await?)
    }

    async fn exists(&self, kind: SubResourceKind, id: &str) -> AdapterResult<bool> {
        Ok(self.exists_inner(kind, id).await?)
    }

    async fn destroy(
        &self,
        kind: SubResourceKind,
        id: &str,
    ) -> AdapterResult<Option<OperationHandle>> {
        tracing::info!("Deleting {} {}", kind, id);
        Ok(self.destroy_inner(kind, id).await?)
    }
}
