//! Azure backend adapter
//!
//! Implements [`BackendAdapter`] on top of the az CLI. Compute instances,
//! AKS clusters and container groups are created with `--no-wait` and
//! polled through their `provisioningState`.

use crate::az::Az;
use crate::commands;
use crate::error::AzureError;
use async_trait::async_trait;
use stratus_engine::{
    AdapterResult, Applied, Attributes, AttributesExt, BackendAdapter, BackendCapability,
    OperationHandle, OperationProbe, OperationStatus, SubResourceKind,
};
use std::sync::Arc;

const DEFAULT_LOCATION: &str = "eastus";

/// Sub-resource kinds the az CLI adapter handles synchronously
const SYNC_KINDS: &[SubResourceKind] = &[
    SubResourceKind::ResourceGroup,
    SubResourceKind::VirtualNetwork,
    SubResourceKind::Subnet,
    SubResourceKind::PublicAddress,
    SubResourceKind::NetworkInterface,
    SubResourceKind::StorageAccount,
    SubResourceKind::BlobContainer,
    SubResourceKind::MessageQueue,
    SubResourceKind::ContainerRegistry,
    SubResourceKind::LoadBalancer,
    SubResourceKind::DnsZone,
    SubResourceKind::DnsRecord,
];

/// Azure adapter settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureSettings {
    /// Subscription passed to every az call; az's default when unset
    pub subscription: Option<String>,

    /// Location used when a declaration does not name one
    pub location: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            subscription: None,
            location: DEFAULT_LOCATION.to_string(),
        }
    }
}

impl AzureSettings {
    /// Read `AZURE_SUBSCRIPTION_ID` and `AZURE_LOCATION`
    pub fn from_env() -> Self {
        let subscription = std::env::var("AZURE_SUBSCRIPTION_ID")
            .ok()
            .filter(|s| !s.is_empty());
        let location = std::env::var("AZURE_LOCATION")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        Self {
            subscription,
            location,
        }
    }
}

/// Capability of the az CLI adapter
pub fn capability() -> BackendCapability {
    let mut capability = BackendCapability::new();
    for kind in SYNC_KINDS {
        capability = capability.sync(*kind);
    }
    capability
        .poll(SubResourceKind::ComputeInstance)
        .poll(SubResourceKind::KubernetesCluster)
        .poll(SubResourceKind::ContainerGroup)
}

/// Map `provisioningState` to an operation status
fn provisioning_status(value: &serde_json::Value) -> OperationStatus {
    match value.get("provisioningState").and_then(|v| v.as_str()) {
        Some("Succeeded") => OperationStatus::Done,
        Some(state @ ("Failed" | "Canceled")) => {
            OperationStatus::Failed(format!("provisioning state {}", state))
        }
        // Data-plane and record-set responses carry no provisioning state
        None => OperationStatus::Done,
        Some(_) => OperationStatus::Pending,
    }
}

/// Polls a `--no-wait` create until provisioning settles
struct CreateProbe {
    az: Az,
    kind: SubResourceKind,
    id: String,
}

#[async_trait]
impl OperationProbe for CreateProbe {
    async fn status(&self) -> AdapterResult<OperationStatus> {
        match self.az.show(self.kind, &self.id).await? {
            Some(value) => Ok(provisioning_status(&value)),
            // Not visible yet
            None => Ok(OperationStatus::Pending),
        }
    }
}

/// Polls a `--no-wait` delete until the sub-resource is gone
struct DeleteProbe {
    az: Az,
    kind: SubResourceKind,
    id: String,
}

#[async_trait]
impl OperationProbe for DeleteProbe {
    async fn status(&self) -> AdapterResult<OperationStatus> {
        match self.az.show(self.kind, &self.id).await? {
            None => Ok(OperationStatus::Done),
            Some(value) => match value.get("provisioningState").and_then(|v| v.as_str()) {
                Some("Failed") => Ok(OperationStatus::Failed("delete failed".into())),
                _ => Ok(OperationStatus::Pending),
            },
        }
    }
}

/// Azure backend adapter
pub struct AzureAdapter {
    az: Az,
    settings: AzureSettings,
}

impl AzureAdapter {
    pub fn new(settings: AzureSettings) -> Self {
        Self {
            az: Az::new(settings.subscription.clone()),
            settings,
        }
    }

    pub fn from_env() -> Self {
        Self::new(AzureSettings::from_env())
    }

    pub fn settings(&self) -> &AzureSettings {
        &self.settings
    }

    /// Check that az is usable before provisioning
    pub async fn check_auth(&self) -> crate::Result<serde_json::Value> {
        self.az.check_auth().await
    }

    fn handle(&self, id: &str, probe: Arc<dyn OperationProbe>) -> OperationHandle {
        OperationHandle::new(id, self.label(), probe)
    }
}

/// Outputs beyond `id` taken from az's create response
fn extra_outputs(kind: SubResourceKind, response: &serde_json::Value, applied: Applied) -> Applied {
    let pick = |key: &str| {
        response
            .get(key)
            .or_else(|| response.get("publicIp").and_then(|ip| ip.get(key)))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };
    match kind {
        SubResourceKind::PublicAddress => match pick("ipAddress") {
            Some(ip) => applied.with_output("ip_address", ip),
            None => applied,
        },
        SubResourceKind::ContainerRegistry => match pick("loginServer") {
            Some(server) => applied.with_output("login_server", server),
            None => applied,
        },
        _ => applied,
    }
}

#[async_trait]
impl BackendAdapter for AzureAdapter {
    fn label(&self) -> &str {
        "azure"
    }

    fn capability(&self) -> BackendCapability {
        capability()
    }

    async fn apply(&self, kind: SubResourceKind, inputs: &Attributes) -> AdapterResult<Applied> {
        let args = commands::create_args(kind, inputs, &self.settings.location)?;
        let id = inputs
            .str_attr("id")
            .ok_or_else(|| AzureError::MissingInput("id".into()))?
            .to_string();

        tracing::info!("Creating {} {}", kind, id);
        let response = self.az.create(&args).await?;

        if commands::creates_async(kind) {
            let probe = Arc::new(CreateProbe {
                az: self.az.clone(),
                kind,
                id: id.clone(),
            });
            return Ok(Applied::pending(id.clone(), self.handle(&id, probe)));
        }

        Ok(extra_outputs(kind, &response, Applied::done(id)))
    }

    async fn exists(&self, kind: SubResourceKind, id: &str) -> AdapterResult<bool> {
        Ok(self.az.show(kind, id).await?.is_some())
    }

    async fn destroy(
        &self,
        kind: SubResourceKind,
        id: &str,
    ) -> AdapterResult<Option<OperationHandle>> {
        tracing::info!("Deleting {} {}", kind, id);
        self.az.delete(kind, id).await?;

        if commands::deletes_async(kind) {
            let probe = Arc::new(DeleteProbe {
                az: self.az.clone(),
                kind,
                id: id.to_string(),
            });
            return Ok(Some(self.handle(id, probe)));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use stratus_engine::Completion;

    #[test]
    fn test_capability() {
        let cap = capability();
        assert_eq!(
            cap.completion(SubResourceKind::ComputeInstance),
            Some(Completion::Poll)
        );
        assert_eq!(
            cap.completion(SubResourceKind::BlobContainer),
            Some(Completion::Sync)
        );
        assert!(!cap.supports(SubResourceKind::Secret));
        assert!(!cap.supports(SubResourceKind::FunctionApp));
    }

    #[test]
    fn test_provisioning_status() {
        assert_eq!(
            provisioning_status(&json!({"provisioningState": "Succeeded"})),
            OperationStatus::Done
        );
        assert_eq!(
            provisioning_status(&json!({"provisioningState": "Creating"})),
            OperationStatus::Pending
        );
        assert!(matches!(
            provisioning_status(&json!({"provisioningState": "Failed"})),
            OperationStatus::Failed(_)
        ));
    }

    #[test]
    fn test_extra_outputs() {
        let response = json!({"publicIp": {"ipAddress": "20.1.2.3"}});
        let applied = extra_outputs(
            SubResourceKind::PublicAddress,
            &response,
            Applied::done("rg/web-pip"),
        );
        assert_eq!(
            applied.outputs.get("ip_address").and_then(|v| v.as_str()),
            Some("20.1.2.3")
        );

        let response = json!({"loginServer": "reg.azurecr.io"});
        let applied = extra_outputs(
            SubResourceKind::ContainerRegistry,
            &response,
            Applied::done("rg/reg"),
        );
        assert_eq!(
            applied.outputs.get("login_server").and_then(|v| v.as_str()),
            Some("reg.azurecr.io")
        );
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        temp_env::with_vars(
            [
                ("AZURE_SUBSCRIPTION_ID", Some("sub-123")),
                ("AZURE_LOCATION", Some("japaneast")),
            ],
            || {
                let settings = AzureSettings::from_env();
                assert_eq!(settings.subscription.as_deref(), Some("sub-123"));
                assert_eq!(settings.location, "japaneast");
            },
        );
    }

    #[test]
    #[serial]
    fn test_settings_defaults() {
        temp_env::with_vars_unset(["AZURE_SUBSCRIPTION_ID", "AZURE_LOCATION"], || {
            assert_eq!(AzureSettings::from_env(), AzureSettings::default());
        });
    }
}
