//! Backend tags, resource kinds and sub-resource kinds
//!
//! These three closed enumerations are the only place where backend identity
//! and resource identity are spelled out. Everything else in the engine is
//! keyed by them.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud backend a resource is provisioned on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Aws,
    Azure,
    Gcp,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Aws, Backend::Azure, Backend::Gcp];

    /// Canonical tag stored in records (`type` attribute)
    pub fn tag(&self) -> &'static str {
        match self {
            Backend::Aws => "aws",
            Backend::Azure => "azure",
            Backend::Gcp => "gcp",
        }
    }

    /// Display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Aws => "Amazon Web Services",
            Backend::Azure => "Microsoft Azure",
            Backend::Gcp => "Google Cloud",
        }
    }

    /// Parse a declared backend tag
    ///
    /// Accepts the canonical tags case-insensitively, plus the positional
    /// aliases `a`, `b` and `c`.
    pub fn parse(tag: &str) -> Result<Self, EngineError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "aws" | "a" => Ok(Backend::Aws),
            "azure" | "b" => Ok(Backend::Azure),
            "gcp" | "google" | "c" => Ok(Backend::Gcp),
            _ => Err(EngineError::UnsupportedBackend(tag.to_string())),
        }
    }
}

impl FromStr for Backend {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::parse(s)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Logical resource kind a user declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Bucket,
    Network,
    Instance,
    Cluster,
    Function,
    Database,
    Queue,
    Registry,
    LoadBalancer,
    ServerlessContainer,
    DnsRecord,
    Secret,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 12] = [
        ResourceKind::Bucket,
        ResourceKind::Network,
        ResourceKind::Instance,
        ResourceKind::Cluster,
        ResourceKind::Function,
        ResourceKind::Database,
        ResourceKind::Queue,
        ResourceKind::Registry,
        ResourceKind::LoadBalancer,
        ResourceKind::ServerlessContainer,
        ResourceKind::DnsRecord,
        ResourceKind::Secret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Bucket => "bucket",
            ResourceKind::Network => "network",
            ResourceKind::Instance => "instance",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Function => "function",
            ResourceKind::Database => "database",
            ResourceKind::Queue => "queue",
            ResourceKind::Registry => "registry",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::ServerlessContainer => "serverless-container",
            ResourceKind::DnsRecord => "dns-record",
            ResourceKind::Secret => "secret",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| EngineError::UnknownResourceKind(s.to_string()))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive provisionable unit composed into a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubResourceKind {
    ResourceGroup,
    VirtualNetwork,
    Subnet,
    InternetGateway,
    GatewayAttachment,
    PublicAddress,
    NetworkInterface,
    ComputeInstance,
    ObjectBucket,
    BucketVersioning,
    StorageAccount,
    BlobContainer,
    KubernetesCluster,
    NodePool,
    FunctionPlan,
    FunctionApp,
    DatabaseServer,
    MessageQueue,
    ContainerRegistry,
    LoadBalancer,
    ContainerGroup,
    DnsZone,
    DnsRecord,
    Secret,
    SecretVersion,
}

impl SubResourceKind {
    pub const ALL: [SubResourceKind; 25] = [
        SubResourceKind::ResourceGroup,
        SubResourceKind::VirtualNetwork,
        SubResourceKind::Subnet,
        SubResourceKind::InternetGateway,
        SubResourceKind::GatewayAttachment,
        SubResourceKind::PublicAddress,
        SubResourceKind::NetworkInterface,
        SubResourceKind::ComputeInstance,
        SubResourceKind::ObjectBucket,
        SubResourceKind::BucketVersioning,
        SubResourceKind::StorageAccount,
        SubResourceKind::BlobContainer,
        SubResourceKind::KubernetesCluster,
        SubResourceKind::NodePool,
        SubResourceKind::FunctionPlan,
        SubResourceKind::FunctionApp,
        SubResourceKind::DatabaseServer,
        SubResourceKind::MessageQueue,
        SubResourceKind::ContainerRegistry,
        SubResourceKind::LoadBalancer,
        SubResourceKind::ContainerGroup,
        SubResourceKind::DnsZone,
        SubResourceKind::DnsRecord,
        SubResourceKind::Secret,
        SubResourceKind::SecretVersion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubResourceKind::ResourceGroup => "resource-group",
            SubResourceKind::VirtualNetwork => "virtual-network",
            SubResourceKind::Subnet => "subnet",
            SubResourceKind::InternetGateway => "internet-gateway",
            SubResourceKind::GatewayAttachment => "gateway-attachment",
            SubResourceKind::PublicAddress => "public-address",
            SubResourceKind::NetworkInterface => "network-interface",
            SubResourceKind::ComputeInstance => "compute-instance",
            SubResourceKind::ObjectBucket => "object-bucket",
            SubResourceKind::BucketVersioning => "bucket-versioning",
            SubResourceKind::StorageAccount => "storage-account",
            SubResourceKind::BlobContainer => "blob-container",
            SubResourceKind::KubernetesCluster => "kubernetes-cluster",
            SubResourceKind::NodePool => "node-pool",
            SubResourceKind::FunctionPlan => "function-plan",
            SubResourceKind::FunctionApp => "function-app",
            SubResourceKind::DatabaseServer => "database-server",
            SubResourceKind::MessageQueue => "message-queue",
            SubResourceKind::ContainerRegistry => "container-registry",
            SubResourceKind::LoadBalancer => "load-balancer",
            SubResourceKind::ContainerGroup => "container-group",
            SubResourceKind::DnsZone => "dns-zone",
            SubResourceKind::DnsRecord => "dns-record",
            SubResourceKind::Secret => "secret",
            SubResourceKind::SecretVersion => "secret-version",
        }
    }
}

impl fmt::Display for SubResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(Backend::parse("aws").unwrap(), Backend::Aws);
        assert_eq!(Backend::parse("Azure").unwrap(), Backend::Azure);
        assert_eq!(Backend::parse(" gcp ").unwrap(), Backend::Gcp);
        assert_eq!(Backend::parse("A").unwrap(), Backend::Aws);
        assert_eq!(Backend::parse("B").unwrap(), Backend::Azure);
        assert_eq!(Backend::parse("C").unwrap(), Backend::Gcp);
    }

    #[test]
    fn test_backend_parse_unknown() {
        let err = Backend::parse("digitalocean").unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedBackend(ref tag) if tag == "digitalocean"));
    }

    #[test]
    fn test_resource_kind_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert_eq!(
            "load_balancer".parse::<ResourceKind>().unwrap(),
            ResourceKind::LoadBalancer
        );
        assert!("teapot".parse::<ResourceKind>().is_err());
    }
}
