//! Declarative chain table
//!
//! One entry per (resource kind, backend): the sub-resource steps in
//! creation order, their deterministic targets and the inputs each step
//! takes from the declaration or from earlier steps. Entries never fail;
//! absent optional attributes fall back to the defaults below.

use crate::attrs::{AttrValue, Attributes, AttributesExt, ID_KEY};
use crate::backend::{Backend, ResourceKind, SubResourceKind};
use crate::chain::{InputSource, ReusePolicy, StepInput, Teardown};

pub const DEFAULT_RESOURCE_GROUP: &str = "stratus-rg";
pub const DEFAULT_DNS_RESOURCE_GROUP: &str = "stratus-dns-rg";
pub const DEFAULT_SHARED_NETWORK: &str = "stratus-vnet";
pub const DEFAULT_SUBNET: &str = "default";
pub const DEFAULT_NETWORK_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_SUBNET_CIDR: &str = "10.0.0.0/24";
pub const DEFAULT_GCP_REGION: &str = "us-central1";
pub const DEFAULT_GCP_ZONE: &str = "us-central1-a";
pub const DEFAULT_NODE_COUNT: i64 = 3;
pub const DEFAULT_DNS_TTL: i64 = 300;
pub const DEFAULT_AZURE_ADMIN: &str = "azureuser";
pub const DEFAULT_AZURE_IMAGE: &str = "Ubuntu2204";
pub const DEFAULT_GCP_IMAGE: &str = "debian-cloud/debian-12";
pub const DEFAULT_AZURE_VAULT: &str = "stratus-kv";

/// Undecorated step as listed in the table
#[derive(Debug, Clone)]
pub(crate) struct StepPlan {
    pub kind: SubResourceKind,
    pub output_key: &'static str,
    pub target: Option<String>,
    pub inputs: Vec<StepInput>,
    pub reuse: ReusePolicy,
    pub teardown: Teardown,
}

impl StepPlan {
    fn new(kind: SubResourceKind, output_key: &'static str) -> Self {
        Self {
            kind,
            output_key,
            target: None,
            inputs: Vec::new(),
            reuse: ReusePolicy::AlwaysCreate,
            teardown: Teardown::Destroy,
        }
    }

    fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    fn set(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.inputs.push(StepInput {
            name: name.to_string(),
            source: InputSource::Literal(value.into()),
        });
        self
    }

    /// Pass declared attributes through under the same name
    fn copy(mut self, attrs: &Attributes, keys: &[&str]) -> Self {
        for key in keys {
            if let Some(value) = attrs.get(*key) {
                self = self.set(key, value.clone());
            }
        }
        self
    }

    /// Pass a declared attribute through under another name
    fn copy_as(self, attrs: &Attributes, from: &str, to: &str) -> Self {
        match attrs.get(from) {
            Some(value) => self.set(to, value.clone()),
            None => self,
        }
    }

    /// Feed the identifier of an earlier step
    fn link(mut self, name: &str, step: usize) -> Self {
        self.inputs.push(StepInput {
            name: name.to_string(),
            source: InputSource::Output {
                step,
                key: ID_KEY.to_string(),
            },
        });
        self
    }

    /// Shared prerequisite: adopt when present, keep on teardown
    fn shared(mut self) -> Self {
        self.reuse = ReusePolicy::ReuseIfPresent;
        self.teardown = Teardown::Retain;
        self
    }
}

fn name_of(kind: ResourceKind, attrs: &Attributes) -> String {
    attrs.str_or("name", kind.as_str()).to_string()
}

fn int_or(attrs: &Attributes, key: &str, default: i64) -> i64 {
    attrs.int_attr(key).unwrap_or(default)
}

/// Steps for one resource, in creation order
///
/// Every prerequisite with a deterministic target is adopted when it already
/// exists, so re-applying after a partial failure does not trip over what
/// the failed attempt left behind. Only shared prerequisites are retained on
/// teardown.
pub(crate) fn steps(kind: ResourceKind, backend: Backend, attrs: &Attributes) -> Vec<StepPlan> {
    let name = name_of(kind, attrs);
    let mut plans = match backend {
        Backend::Aws => aws(kind, &name, attrs),
        Backend::Azure => azure(kind, &name, attrs),
        Backend::Gcp => gcp(kind, &name, attrs),
    };
    let prerequisites = plans.len().saturating_sub(1);
    for plan in plans.iter_mut().take(prerequisites) {
        if plan.target.is_some() {
            plan.reuse = ReusePolicy::ReuseIfPresent;
        }
    }
    plans
}

fn aws(kind: ResourceKind, name: &str, attrs: &Attributes) -> Vec<StepPlan> {
    use SubResourceKind as S;

    match kind {
        ResourceKind::Bucket => {
            // A declared region travels in the identifier; bare names live in
            // the adapter's region
            let bucket = match attrs.str_attr("region") {
                Some(region) => format!("{}/{}", region, name),
                None => name.to_string(),
            };
            let mut steps = vec![
                StepPlan::new(S::ObjectBucket, ID_KEY)
                    .target(bucket.clone())
                    .set("name", name)
                    .copy(attrs, &["region", "public_access"]),
            ];
            if attrs.bool_attr("versioning") == Some(true) {
                steps.push(
                    StepPlan::new(S::BucketVersioning, "versioning_id")
                        .target(bucket)
                        .link("bucket", 0),
                );
            }
            steps
        }
        ResourceKind::Network => vec![
            StepPlan::new(S::VirtualNetwork, ID_KEY)
                .set("name", name)
                .set("cidr_block", attrs.str_or("cidr", DEFAULT_NETWORK_CIDR)),
            StepPlan::new(S::Subnet, "subnet_id")
                .link("vpc_id", 0)
                .set("name", format!("{}-subnet", name))
                .set("cidr_block", attrs.str_or("subnet_cidr", DEFAULT_SUBNET_CIDR))
                .copy(attrs, &["availability_zone"]),
            StepPlan::new(S::InternetGateway, "gateway_id")
                .set("name", format!("{}-igw", name)),
            StepPlan::new(S::GatewayAttachment, "attachment_id")
                .link("vpc_id", 0)
                .link("gateway_id", 2),
        ],
        ResourceKind::Instance => vec![
            StepPlan::new(S::ComputeInstance, ID_KEY)
                .set("name", name)
                .copy_as(attrs, "image", "image_id")
                .copy_as(attrs, "size", "instance_type")
                .copy(attrs, &["subnet_id", "key_name", "user_data"]),
        ],
        ResourceKind::Cluster => vec![
            StepPlan::new(S::KubernetesCluster, ID_KEY)
                .target(name)
                .set("name", name)
                .copy(attrs, &["version", "role_arn", "subnet_ids"]),
            StepPlan::new(S::NodePool, "node_pool_id")
                .target(format!("{}/{}-nodes", name, name))
                .link("cluster", 0)
                .set("name", format!("{}-nodes", name))
                .copy_as(attrs, "node_size", "instance_type")
                .set("node_count", int_or(attrs, "node_count", DEFAULT_NODE_COUNT)),
        ],
        ResourceKind::Function => vec![
            StepPlan::new(S::FunctionApp, ID_KEY)
                .target(name)
                .set("name", name)
                .copy(attrs, &["runtime", "handler", "code", "role", "memory", "timeout"]),
        ],
        ResourceKind::Database => vec![
            StepPlan::new(S::DatabaseServer, ID_KEY)
                .target(name)
                .set("name", name)
                .copy_as(attrs, "size", "instance_class")
                .set("storage_gb", int_or(attrs, "storage_gb", 20))
                .copy(attrs, &["engine", "engine_version", "username", "password"]),
        ],
        // SQS identifies queues by the URL it assigns
        ResourceKind::Queue => vec![
            StepPlan::new(S::MessageQueue, ID_KEY)
                .set("name", name)
                .copy(attrs, &["fifo", "visibility_timeout"]),
        ],
        ResourceKind::Registry => vec![
            StepPlan::new(S::ContainerRegistry, ID_KEY)
                .target(name)
                .set("name", name)
                .copy(attrs, &["scan_on_push"]),
        ],
        ResourceKind::LoadBalancer => vec![
            StepPlan::new(S::LoadBalancer, ID_KEY)
                .set("name", name)
                .set("scheme", attrs.str_or("scheme", "internet-facing"))
                .copy(attrs, &["subnet_ids"]),
        ],
        ResourceKind::ServerlessContainer => vec![
            StepPlan::new(S::ContainerGroup, ID_KEY)
                .target(name)
                .set("name", name)
                .copy(attrs, &["image", "cpu", "memory", "port"]),
        ],
        ResourceKind::DnsRecord => {
            let zone = attrs.str_or("zone", "").trim_end_matches('.');
            let hosted_zone = attrs
                .str_or("hosted_zone_id", "")
                .trim_start_matches("/hostedzone/");
            let record_type = attrs.str_or("record_type", "A");
            let fqdn = format!("{}.{}.", name, zone);
            vec![
                StepPlan::new(S::DnsRecord, ID_KEY)
                    .target(format!("{}/{}/{}", hosted_zone, fqdn, record_type))
                    .set("hosted_zone_id", hosted_zone)
                    .set("name", fqdn)
                    .set("record_type", record_type)
                    .set("ttl", int_or(attrs, "ttl", DEFAULT_DNS_TTL))
                    .copy(attrs, &["value"]),
            ]
        }
        ResourceKind::Secret => vec![
            StepPlan::new(S::Secret, ID_KEY)
                .target(name)
                .set("name", name)
                .copy(attrs, &["value"]),
        ],
    }
}

fn azure_group(attrs: &Attributes, default: &str) -> (StepPlan, String) {
    let group = attrs.str_or("resource_group", default).to_string();
    let step = StepPlan::new(SubResourceKind::ResourceGroup, "resource_group")
        .target(group.clone())
        .set("name", group.clone())
        .copy(attrs, &["location"])
        .shared();
    (step, group)
}

fn azure_account(attrs: &Attributes, group: &str, name: &str, output_key: &'static str) -> StepPlan {
    let account = attrs.str_or("account", name).to_string();
    StepPlan::new(SubResourceKind::StorageAccount, output_key)
        .target(format!("{}/{}", group, account))
        .link("resource_group", 0)
        .set("name", account)
        .set("sku", attrs.str_or("storage_sku", "Standard_LRS"))
        .copy(attrs, &["location"])
}

fn azure(kind: ResourceKind, name: &str, attrs: &Attributes) -> Vec<StepPlan> {
    use SubResourceKind as S;

    if kind == ResourceKind::Secret {
        let vault = attrs.str_or("vault", DEFAULT_AZURE_VAULT);
        return vec![
            StepPlan::new(S::Secret, ID_KEY)
                .target(format!("{}/{}", vault, name))
                .set("vault", vault)
                .set("name", name)
                .copy(attrs, &["value"]),
        ];
    }

    let default_group = if kind == ResourceKind::DnsRecord {
        DEFAULT_DNS_RESOURCE_GROUP
    } else {
        DEFAULT_RESOURCE_GROUP
    };
    let (group_step, group) = azure_group(attrs, default_group);
    let mut steps = vec![group_step];

    match kind {
        ResourceKind::Bucket => {
            let account = attrs.str_or("account", name).to_string();
            steps.push(azure_account(attrs, &group, name, "account_id"));
            steps.push(
                StepPlan::new(S::BlobContainer, ID_KEY)
                    .target(format!("{}/{}/{}", group, account, name))
                    .link("account", 1)
                    .set("name", name)
                    .set("public_access", attrs.str_or("public_access", "off")),
            );
        }
        ResourceKind::Network => {
            let subnet = attrs.str_or("subnet_name", DEFAULT_SUBNET);
            steps.push(
                StepPlan::new(S::VirtualNetwork, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .set("name", name)
                    .set("address_prefix", attrs.str_or("cidr", DEFAULT_NETWORK_CIDR))
                    .copy(attrs, &["location"]),
            );
            steps.push(
                StepPlan::new(S::Subnet, "subnet_id")
                    .target(format!("{}/{}/{}", group, name, subnet))
                    .link("virtual_network", 1)
                    .set("name", subnet)
                    .set("address_prefix", attrs.str_or("subnet_cidr", DEFAULT_SUBNET_CIDR)),
            );
        }
        ResourceKind::Instance => {
            let network = attrs.str_or("network", DEFAULT_SHARED_NETWORK);
            steps.push(
                StepPlan::new(S::VirtualNetwork, "network_id")
                    .target(format!("{}/{}", group, network))
                    .link("resource_group", 0)
                    .set("name", network)
                    .set("address_prefix", DEFAULT_NETWORK_CIDR)
                    .copy(attrs, &["location"])
                    .shared(),
            );
            steps.push(
                StepPlan::new(S::Subnet, "subnet_id")
                    .target(format!("{}/{}/{}", group, network, DEFAULT_SUBNET))
                    .link("virtual_network", 1)
                    .set("name", DEFAULT_SUBNET)
                    .set("address_prefix", DEFAULT_SUBNET_CIDR)
                    .shared(),
            );
            steps.push(
                StepPlan::new(S::PublicAddress, "address_id")
                    .target(format!("{}/{}-pip", group, name))
                    .link("resource_group", 0)
                    .set("name", format!("{}-pip", name))
                    .set("allocation", "Static")
                    .copy(attrs, &["location"]),
            );
            steps.push(
                StepPlan::new(S::NetworkInterface, "interface_id")
                    .target(format!("{}/{}-nic", group, name))
                    .link("resource_group", 0)
                    .link("subnet", 2)
                    .link("public_address", 3)
                    .set("name", format!("{}-nic", name))
                    .copy(attrs, &["location"]),
            );
            steps.push(
                StepPlan::new(S::ComputeInstance, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .link("network_interface", 4)
                    .set("name", name)
                    .set("image", attrs.str_or("image", DEFAULT_AZURE_IMAGE))
                    .set("admin_username", attrs.str_or("admin_username", DEFAULT_AZURE_ADMIN))
                    .copy(attrs, &["size", "ssh_public_key", "location"]),
            );
        }
        ResourceKind::Cluster => {
            steps.push(
                StepPlan::new(S::KubernetesCluster, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .set("name", name)
                    .set("dns_prefix", name)
                    .set("node_count", int_or(attrs, "node_count", DEFAULT_NODE_COUNT))
                    .copy(attrs, &["node_size", "version", "location"]),
            );
        }
        ResourceKind::Function => {
            steps.push(azure_account(attrs, &group, name, "account_id"));
            steps.push(
                StepPlan::new(S::FunctionPlan, "plan_id")
                    .target(format!("{}/{}-plan", group, name))
                    .link("resource_group", 0)
                    .set("name", format!("{}-plan", name))
                    .set("sku", attrs.str_or("plan_sku", "Y1"))
                    .copy(attrs, &["location"]),
            );
            steps.push(
                StepPlan::new(S::FunctionApp, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .link("storage_account", 1)
                    .link("plan", 2)
                    .set("name", name)
                    .copy(attrs, &["runtime", "handler", "code"]),
            );
        }
        ResourceKind::Database => {
            steps.push(
                StepPlan::new(S::DatabaseServer, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .set("name", name)
                    .copy_as(attrs, "size", "sku")
                    .copy(attrs, &["engine", "engine_version", "username", "password", "location"]),
            );
        }
        ResourceKind::Queue => {
            let account = attrs.str_or("account", name).to_string();
            steps.push(azure_account(attrs, &group, name, "account_id"));
            steps.push(
                StepPlan::new(S::MessageQueue, ID_KEY)
                    .target(format!("{}/{}/{}", group, account, name))
                    .link("account", 1)
                    .set("name", name),
            );
        }
        ResourceKind::Registry => {
            steps.push(
                StepPlan::new(S::ContainerRegistry, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .set("name", name)
                    .set("sku", attrs.str_or("sku", "Basic"))
                    .copy(attrs, &["admin_enabled", "location"]),
            );
        }
        ResourceKind::LoadBalancer => {
            steps.push(
                StepPlan::new(S::PublicAddress, "address_id")
                    .target(format!("{}/{}-pip", group, name))
                    .link("resource_group", 0)
                    .set("name", format!("{}-pip", name))
                    .set("allocation", "Static")
                    .copy(attrs, &["location"]),
            );
            steps.push(
                StepPlan::new(S::LoadBalancer, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .link("public_address", 1)
                    .set("name", name)
                    .set("sku", attrs.str_or("sku", "Standard"))
                    .copy(attrs, &["location"]),
            );
        }
        ResourceKind::ServerlessContainer => {
            steps.push(
                StepPlan::new(S::ContainerGroup, ID_KEY)
                    .target(format!("{}/{}", group, name))
                    .link("resource_group", 0)
                    .set("name", name)
                    .set("cpu", int_or(attrs, "cpu", 1))
                    .set("port", int_or(attrs, "port", 80))
                    .copy(attrs, &["image", "memory", "location"]),
            );
        }
        ResourceKind::DnsRecord => {
            let zone = attrs.str_or("zone", "");
            let record_type = attrs.str_or("record_type", "A");
            steps.push(
                StepPlan::new(S::DnsZone, "zone_id")
                    .target(format!("{}/{}", group, zone))
                    .link("resource_group", 0)
                    .set("name", zone)
                    .shared(),
            );
            steps.push(
                StepPlan::new(S::DnsRecord, ID_KEY)
                    .target(format!("{}/{}/{}/{}", group, zone, record_type, name))
                    .link("zone", 1)
                    .set("name", name)
                    .set("record_type", record_type)
                    .set("ttl", int_or(attrs, "ttl", DEFAULT_DNS_TTL))
                    .copy(attrs, &["value"]),
            );
        }
        ResourceKind::Secret => {}
    }

    steps
}

fn gcp(kind: ResourceKind, name: &str, attrs: &Attributes) -> Vec<StepPlan> {
    use SubResourceKind as S;

    let region = attrs.str_or("region", DEFAULT_GCP_REGION);
    let zone = attrs.str_or("zone", DEFAULT_GCP_ZONE);

    match kind {
        ResourceKind::Bucket => vec![
            StepPlan::new(S::ObjectBucket, ID_KEY)
                .target(name)
                .set("name", name)
                .set("location", attrs.str_or("location", "US"))
                .copy(attrs, &["storage_class", "versioning"]),
        ],
        ResourceKind::Network => vec![
            StepPlan::new(S::VirtualNetwork, ID_KEY)
                .target(name)
                .set("name", name),
            StepPlan::new(S::Subnet, "subnet_id")
                .target(format!("{}/{}-subnet", region, name))
                .link("network", 0)
                .set("name", format!("{}-subnet", name))
                .set("region", region)
                .set("cidr_block", attrs.str_or("subnet_cidr", DEFAULT_SUBNET_CIDR)),
        ],
        ResourceKind::Instance => vec![
            StepPlan::new(S::ComputeInstance, ID_KEY)
                .target(format!("{}/{}", zone, name))
                .set("name", name)
                .set("zone", zone)
                .set("image", attrs.str_or("image", DEFAULT_GCP_IMAGE))
                .set("network", attrs.str_or("network", "default"))
                .copy_as(attrs, "size", "machine_type"),
        ],
        ResourceKind::Cluster => vec![
            StepPlan::new(S::KubernetesCluster, ID_KEY)
                .target(format!("{}/{}", zone, name))
                .set("name", name)
                .set("location", zone)
                .set("node_count", int_or(attrs, "node_count", DEFAULT_NODE_COUNT))
                .copy_as(attrs, "node_size", "machine_type"),
        ],
        ResourceKind::Function => vec![
            StepPlan::new(S::FunctionApp, ID_KEY)
                .target(format!("{}/{}", region, name))
                .set("name", name)
                .set("region", region)
                .copy(attrs, &["runtime", "code"])
                .copy_as(attrs, "handler", "entry_point"),
        ],
        ResourceKind::Database => vec![
            StepPlan::new(S::DatabaseServer, ID_KEY)
                .target(name)
                .set("name", name)
                .set("region", region)
                .copy_as(attrs, "size", "tier")
                .copy(attrs, &["engine", "engine_version"]),
        ],
        ResourceKind::Queue => vec![
            StepPlan::new(S::MessageQueue, ID_KEY)
                .target(name)
                .set("name", name),
        ],
        ResourceKind::Registry => vec![
            StepPlan::new(S::ContainerRegistry, ID_KEY)
                .target(format!("{}/{}", region, name))
                .set("name", name)
                .set("region", region)
                .set("format", "DOCKER"),
        ],
        ResourceKind::LoadBalancer => vec![
            StepPlan::new(S::PublicAddress, "address_id")
                .target(format!("{}/{}-ip", region, name))
                .set("name", format!("{}-ip", name))
                .set("region", region),
            StepPlan::new(S::LoadBalancer, ID_KEY)
                .target(format!("{}/{}", region, name))
                .link("address", 0)
                .set("name", name)
                .set("region", region)
                .set("port_range", attrs.str_or("port_range", "80")),
        ],
        ResourceKind::ServerlessContainer => vec![
            StepPlan::new(S::ContainerGroup, ID_KEY)
                .target(format!("{}/{}", region, name))
                .set("name", name)
                .set("region", region)
                .copy(attrs, &["image", "cpu", "memory", "port"]),
        ],
        ResourceKind::DnsRecord => {
            let zone = attrs.str_or("zone", "");
            let managed_zone = zone.trim_end_matches('.').replace('.', "-");
            let record_type = attrs.str_or("record_type", "A");
            let fqdn = format!("{}.{}.", name, zone.trim_end_matches('.'));
            vec![
                StepPlan::new(S::DnsZone, "zone_id")
                    .target(managed_zone.clone())
                    .set("name", managed_zone.clone())
                    .set("dns_name", format!("{}.", zone.trim_end_matches('.')))
                    .shared(),
                StepPlan::new(S::DnsRecord, ID_KEY)
                    .target(format!("{}/{}/{}", managed_zone, fqdn, record_type))
                    .link("zone", 0)
                    .set("name", fqdn)
                    .set("record_type", record_type)
                    .set("ttl", int_or(attrs, "ttl", DEFAULT_DNS_TTL))
                    .copy(attrs, &["value"]),
            ]
        }
        ResourceKind::Secret => vec![
            StepPlan::new(S::Secret, ID_KEY)
                .target(name)
                .set("name", name),
            StepPlan::new(S::SecretVersion, "version_id")
                .link("secret", 0)
                .copy(attrs, &["value"]),
        ],
    }
}
