//! AWS backend adapter
//!
//! VPC networking and EC2 instances go through aws-sdk-ec2, buckets through
//! aws-sdk-s3, queues through SQS, secrets through Secrets Manager,
//! registries through ECR and DNS records through Route53. Instances are
//! polled until they reach `running`; everything else completes when the
//! API call returns. Each `apply` is a single API call: gateway attachment
//! and bucket versioning are chain steps of their own.

use crate::error::{AwsError, Result};
use crate::requests::{
    DEFAULT_REGION, attachment_ref, bucket_ref, change_batch, dns_record_ref, location_constraint,
    queue_attributes, record_set, required, same_record_name, scan_configuration,
};
use async_trait::async_trait;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::types::{
    AttachmentStatus, InstanceStateName, InstanceType, ResourceType, Tag, TagSpecification,
};
use aws_sdk_route53::types::ChangeAction;
use aws_sdk_s3::types::{BucketVersioningStatus, VersioningConfiguration};
use aws_sdk_sqs::types::QueueAttributeName;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use stratus_engine::{
    AdapterResult, Applied, Attributes, AttributesExt, BackendAdapter, BackendCapability,
    OperationHandle, OperationProbe, OperationStatus, SubResourceKind,
};
use std::sync::Arc;

/// AWS adapter settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsSettings {
    /// Region override; the SDK's default chain applies when unset
    pub region: Option<String>,
}

impl AwsSettings {
    /// Read `AWS_REGION`, then `AWS_DEFAULT_REGION`
    pub fn from_env() -> Self {
        let region = ["AWS_REGION", "AWS_DEFAULT_REGION"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
        Self { region }
    }
}

/// Capability of the SDK adapter
pub fn capability() -> BackendCapability {
    BackendCapability::new()
        .sync(SubResourceKind::VirtualNetwork)
        .sync(SubResourceKind::Subnet)
        .sync(SubResourceKind::InternetGateway)
        .sync(SubResourceKind::GatewayAttachment)
        .poll(SubResourceKind::ComputeInstance)
        .sync(SubResourceKind::ObjectBucket)
        .sync(SubResourceKind::BucketVersioning)
        .sync(SubResourceKind::MessageQueue)
        .sync(SubResourceKind::Secret)
        .sync(SubResourceKind::ContainerRegistry)
        .sync(SubResourceKind::DnsRecord)
}

fn name_tag(resource: ResourceType, name: &str) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource)
        .tags(Tag::builder().key("Name").value(name).build())
        .build()
}

fn versioning(status: BucketVersioningStatus) -> VersioningConfiguration {
    VersioningConfiguration::builder().status(status).build()
}

/// Map an EC2 instance state to an operation status
fn instance_status(state: Option<&InstanceStateName>, deleting: bool) -> OperationStatus {
    match (state, deleting) {
        (Some(InstanceStateName::Running), false) => OperationStatus::Done,
        (Some(InstanceStateName::Terminated), true) | (None, true) => OperationStatus::Done,
        (Some(InstanceStateName::Terminated | InstanceStateName::ShuttingDown), false) => {
            OperationStatus::Failed("instance terminated during launch".into())
        }
        (Some(InstanceStateName::Stopped), false) => {
            OperationStatus::Failed("instance stopped during launch".into())
        }
        _ => OperationStatus::Pending,
    }
}

/// EC2 calls shared by the adapter and its probes
#[derive(Clone)]
struct Ec2 {
    client: aws_sdk_ec2::Client,
}

impl Ec2 {
    async fn instance_state(&self, id: &str) -> Result<Option<InstanceStateName>> {
        let output = self
            .client
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(AwsError::from_sdk);
        let output = match output {
            Ok(output) => output,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .find(|i| i.instance_id() == Some(id))
            .and_then(|i| i.state())
            .and_then(|s| s.name())
            .cloned())
    }
}

/// Polls an instance launch or termination
struct InstanceProbe {
    ec2: Ec2,
    id: String,
    deleting: bool,
}

#[async_trait]
impl OperationProbe for InstanceProbe {
    async fn status(&self) -> AdapterResult<OperationStatus> {
        let state = self.ec2.instance_state(&self.id).await?;
        tracing::debug!("Instance {} state: {:?}", self.id, state);
        Ok(instance_status(state.as_ref(), self.deleting))
    }
}

/// AWS backend adapter
pub struct AwsAdapter {
    ec2: Ec2,
    sqs: aws_sdk_sqs::Client,
    secrets: aws_sdk_secretsmanager::Client,
    ecr: aws_sdk_ecr::Client,
    route53: aws_sdk_route53::Client,
    config: aws_config::SdkConfig,
    region: String,
}

impl AwsAdapter {
    /// Load credentials and region through the SDK's default chain
    pub async fn new(settings: AwsSettings) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = settings.region {
            loader = loader.region(Region::new(region));
        }
        let config = loader.load().await;
        let region = config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        tracing::debug!("AWS adapter using region {}", region);

        Self {
            ec2: Ec2 {
                client: aws_sdk_ec2::Client::new(&config),
            },
            sqs: aws_sdk_sqs::Client::new(&config),
            secrets: aws_sdk_secretsmanager::Client::new(&config),
            ecr: aws_sdk_ecr::Client::new(&config),
            route53: aws_sdk_route53::Client::new(&config),
            config,
            region,
        }
    }

    pub async fn from_env() -> Self {
        Self::new(AwsSettings::from_env()).await
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn ec2(&self) -> &aws_sdk_ec2::Client {
        &self.ec2.client
    }

    /// S3 client for a bucket's region
    fn s3(&self, region: &str) -> aws_sdk_s3::Client {
        let conf = aws_sdk_s3::config::Builder::from(&self.config)
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .build();
        aws_sdk_s3::Client::from_conf(conf)
    }

    async fn create_vpc(&self, inputs: &Attributes) -> Result<Applied> {
        let name = required(inputs, "name")?;
        let output = self
            .ec2()
            .create_vpc()
            .cidr_block(required(inputs, "cidr_block")?)
            .tag_specifications(name_tag(ResourceType::Vpc, name))
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        let id = output
            .vpc()
            .and_then(|v| v.vpc_id())
            .ok_or(AwsError::MissingOutput("vpc id"))?;
        Ok(Applied::done(id))
    }

    async fn create_subnet(&self, inputs: &Attributes) -> Result<Applied> {
        let name = required(inputs, "name")?;
        let mut request = self
            .ec2()
            .create_subnet()
            .vpc_id(required(inputs, "vpc_id")?)
            .cidr_block(required(inputs, "cidr_block")?)
            .tag_specifications(name_tag(ResourceType::Subnet, name));
        if let Some(az) = inputs.str_attr("availability_zone") {
            request = request.availability_zone(az);
        }
        let output = request.send().await.map_err(AwsError::from_sdk)?;
        let id = output
            .subnet()
            .and_then(|s| s.subnet_id())
            .ok_or(AwsError::MissingOutput("subnet id"))?;
        Ok(Applied::done(id))
    }

    async fn create_internet_gateway(&self, inputs: &Attributes) -> Result<Applied> {
        let name = required(inputs, "name")?;
        let output = self
            .ec2()
            .create_internet_gateway()
            .tag_specifications(name_tag(ResourceType::InternetGateway, name))
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        let id = output
            .internet_gateway()
            .and_then(|g| g.internet_gateway_id())
            .ok_or(AwsError::MissingOutput("internet gateway id"))?;
        Ok(Applied::done(id))
    }

    async fn attach_gateway(&self, inputs: &Attributes) -> Result<Applied> {
        let gateway_id = required(inputs, "gateway_id")?;
        let vpc_id = required(inputs, "vpc_id")?;
        self.ec2()
            .attach_internet_gateway()
            .internet_gateway_id(gateway_id)
            .vpc_id(vpc_id)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(Applied::done(format!("{}/{}", gateway_id, vpc_id)))
    }

    async fn run_instance(&self, inputs: &Attributes) -> Result<Applied> {
        let name = required(inputs, "name")?;
        let mut request = self
            .ec2()
            .run_instances()
            .image_id(required(inputs, "image_id")?)
            .instance_type(InstanceType::from(inputs.str_or("instance_type", "t3.micro")))
            .min_count(1)
            .max_count(1)
            .tag_specifications(name_tag(ResourceType::Instance, name));
        if let Some(subnet) = inputs.str_attr("subnet_id") {
            request = request.subnet_id(subnet);
        }
        if let Some(key) = inputs.str_attr("key_name") {
            request = request.key_name(key);
        }
        if let Some(user_data) = inputs.str_attr("user_data") {
            request = request.user_data(BASE64.encode(user_data));
        }
        let output = request.send().await.map_err(AwsError::from_sdk)?;
        let id = output
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .ok_or(AwsError::MissingOutput("instance id"))?
            .to_string();

        let probe = Arc::new(InstanceProbe {
            ec2: self.ec2.clone(),
            id: id.clone(),
            deleting: false,
        });
        let handle = OperationHandle::new(&id, self.label(), probe);
        Ok(Applied::pending(id, handle))
    }

    async fn create_bucket(&self, inputs: &Attributes) -> Result<Applied> {
        let id = required(inputs, "id")?;
        let (region, name) = bucket_ref(id, &self.region)?;

        let mut request = self.s3(region).create_bucket().bucket(name);
        if let Some(configuration) = location_constraint(region) {
            request = request.create_bucket_configuration(configuration);
        }
        request.send().await.map_err(AwsError::from_sdk)?;

        Ok(Applied::done(id)
            .with_output("region", region)
            .with_output("arn", format!("arn:aws:s3:::{}", name)))
    }

    async fn enable_versioning(&self, inputs: &Attributes) -> Result<Applied> {
        let bucket = required(inputs, "bucket")?;
        let (region, name) = bucket_ref(bucket, &self.region)?;
        self.s3(region)
            .put_bucket_versioning()
            .bucket(name)
            .versioning_configuration(versioning(BucketVersioningStatus::Enabled))
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(Applied::done(bucket))
    }

    async fn create_queue(&self, inputs: &Attributes) -> Result<Applied> {
        let name = required(inputs, "name")?;
        let output = self
            .sqs
            .create_queue()
            .queue_name(name)
            .set_attributes(Some(queue_attributes(inputs)))
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        let url = output
            .queue_url()
            .ok_or(AwsError::MissingOutput("queue url"))?;
        Ok(Applied::done(url).with_output("queue_name", name))
    }

    async fn create_secret(&self, inputs: &Attributes) -> Result<Applied> {
        let name = required(inputs, "name")?;
        let output = self
            .secrets
            .create_secret()
            .name(name)
            .secret_string(required(inputs, "value")?)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        let mut applied = Applied::done(name);
        if let Some(arn) = output.arn() {
            applied = applied.with_output("arn", arn);
        }
        Ok(applied)
    }

    async fn create_repository(&self, inputs: &Attributes) -> Result<Applied> {
        let name = required(inputs, "name")?;
        let output = self
            .ecr
            .create_repository()
            .repository_name(name)
            .image_scanning_configuration(scan_configuration(inputs))
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        let mut applied = Applied::done(name);
        if let Some(uri) = output.repository().and_then(|r| r.repository_uri()) {
            applied = applied.with_output("uri", uri);
        }
        Ok(applied)
    }

    async fn create_record(&self, inputs: &Attributes) -> Result<Applied> {
        let id = required(inputs, "id")?;
        let (zone, _, _) = dns_record_ref(id)?;
        self.route53
            .change_resource_record_sets()
            .hosted_zone_id(zone)
            .change_batch(change_batch(ChangeAction::Create, record_set(inputs)?)?)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(Applied::done(id))
    }

    async fn vpc_exists(&self, id: &str) -> Result<bool> {
        let output = self
            .ec2()
            .describe_vpcs()
            .vpc_ids(id)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(!output.vpcs().is_empty())
    }

    async fn subnet_exists(&self, id: &str) -> Result<bool> {
        let output = self
            .ec2()
            .describe_subnets()
            .subnet_ids(id)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(!output.subnets().is_empty())
    }

    /// VPCs the gateway is attached to, `None` when the gateway is gone
    async fn gateway_attachments(&self, id: &str) -> Result<Option<Vec<String>>> {
        let output = self
            .ec2()
            .describe_internet_gateways()
            .internet_gateway_ids(id)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(output.internet_gateways().first().map(|g| {
            g.attachments()
                .iter()
                .filter(|a| {
                    !matches!(
                        a.state(),
                        Some(AttachmentStatus::Detached | AttachmentStatus::Detaching)
                    )
                })
                .filter_map(|a| a.vpc_id().map(str::to_string))
                .collect()
        }))
    }

    async fn bucket_exists(&self, id: &str) -> Result<bool> {
        let (region, name) = bucket_ref(id, &self.region)?;
        self.s3(region)
            .head_bucket()
            .bucket(name)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(true)
    }

    async fn versioning_enabled(&self, id: &str) -> Result<bool> {
        let (region, name) = bucket_ref(id, &self.region)?;
        let output = self
            .s3(region)
            .get_bucket_versioning()
            .bucket(name)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(output.status() == Some(&BucketVersioningStatus::Enabled))
    }

    async fn queue_exists(&self, url: &str) -> Result<bool> {
        self.sqs
            .get_queue_attributes()
            .queue_url(url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(true)
    }

    /// Secrets scheduled for deletion count as gone
    async fn secret_exists(&self, id: &str) -> Result<bool> {
        let output = self
            .secrets
            .describe_secret()
            .secret_id(id)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(output.deleted_date().is_none())
    }

    async fn repository_exists(&self, name: &str) -> Result<bool> {
        let output = self
            .ecr
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(!output.repositories().is_empty())
    }

    /// Live record set behind a record identifier
    async fn find_record(
        &self,
        id: &str,
    ) -> Result<Option<aws_sdk_route53::types::ResourceRecordSet>> {
        let (zone, name, record_type) = dns_record_ref(id)?;
        let output = self
            .route53
            .list_resource_record_sets()
            .hosted_zone_id(zone)
            .start_record_name(name)
            .start_record_type(record_type.clone())
            .max_items(1)
            .send()
            .await
            .map_err(AwsError::from_sdk)?;
        Ok(output
            .resource_record_sets()
            .first()
            .filter(|set| same_record_name(set.name(), name) && set.r#type() == &record_type)
            .cloned())
    }

    async fn exists_inner(&self, kind: SubResourceKind, id: &str) -> Result<bool> {
        let result = match kind {
            SubResourceKind::VirtualNetwork => self.vpc_exists(id).await,
            SubResourceKind::Subnet => self.subnet_exists(id).await,
            SubResourceKind::InternetGateway => {
                self.gateway_attachments(id).await.map(|a| a.is_some())
            }
            SubResourceKind::GatewayAttachment => {
                let (gateway_id, vpc_id) = attachment_ref(id)?;
                self.gateway_attachments(gateway_id)
                    .await
                    .map(|a| a.is_some_and(|vpcs| vpcs.iter().any(|v| v == vpc_id)))
            }
            SubResourceKind::ComputeInstance => {
                let state = self.ec2.instance_state(id).await?;
                Ok(!matches!(
                    state,
                    None | Some(InstanceStateName::Terminated | InstanceStateName::ShuttingDown)
                ))
            }
            SubResourceKind::ObjectBucket => self.bucket_exists(id).await,
            SubResourceKind::BucketVersioning => self.versioning_enabled(id).await,
            SubResourceKind::MessageQueue => self.queue_exists(id).await,
            SubResourceKind::Secret => self.secret_exists(id).await,
            SubResourceKind::ContainerRegistry => self.repository_exists(id).await,
            SubResourceKind::DnsRecord => self.find_record(id).await.map(|r| r.is_some()),
            other => Err(AwsError::Unsupported(other)),
        };
        match result {
            Err(e) if e.is_not_found() => Ok(false),
            other => other,
        }
    }

    async fn destroy_inner(&self, kind: SubResourceKind, id: &str) -> Result<Option<OperationHandle>> {
        match kind {
            SubResourceKind::VirtualNetwork => {
                self.ec2()
                    .delete_vpc()
                    .vpc_id(id)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::Subnet => {
                self.ec2()
                    .delete_subnet()
                    .subnet_id(id)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::InternetGateway => {
                self.ec2()
                    .delete_internet_gateway()
                    .internet_gateway_id(id)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::GatewayAttachment => {
                let (gateway_id, vpc_id) = attachment_ref(id)?;
                self.ec2()
                    .detach_internet_gateway()
                    .internet_gateway_id(gateway_id)
                    .vpc_id(vpc_id)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::ComputeInstance => {
                self.ec2()
                    .terminate_instances()
                    .instance_ids(id)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
                let probe = Arc::new(InstanceProbe {
                    ec2: self.ec2.clone(),
                    id: id.to_string(),
                    deleting: true,
                });
                return Ok(Some(OperationHandle::new(id, self.label(), probe)));
            }
            SubResourceKind::ObjectBucket => {
                let (region, name) = bucket_ref(id, &self.region)?;
                self.s3(region)
                    .delete_bucket()
                    .bucket(name)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::BucketVersioning => {
                let (region, name) = bucket_ref(id, &self.region)?;
                self.s3(region)
                    .put_bucket_versioning()
                    .bucket(name)
                    .versioning_configuration(versioning(BucketVersioningStatus::Suspended))
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::MessageQueue => {
                self.sqs
                    .delete_queue()
                    .queue_url(id)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::Secret => {
                self.secrets
                    .delete_secret()
                    .secret_id(id)
                    .force_delete_without_recovery(true)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::ContainerRegistry => {
                self.ecr
                    .delete_repository()
                    .repository_name(id)
                    .force(true)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            SubResourceKind::DnsRecord => {
                // Route53 deletes only by echoing the live record set
                let set = self
                    .find_record(id)
                    .await?
                    .ok_or_else(|| AwsError::NotFound(id.to_string()))?;
                let (zone, _, _) = dns_record_ref(id)?;
                self.route53
                    .change_resource_record_sets()
                    .hosted_zone_id(zone)
                    .change_batch(change_batch(ChangeAction::Delete, set)?)
                    .send()
                    .await
                    .map_err(AwsError::from_sdk)?;
            }
            other => return Err(AwsError::Unsupported(other)),
        }
        Ok(None)
    }
}

#[async_trait]
impl BackendAdapter for AwsAdapter {
    fn label(&self) -> &str {
        "aws"
    }

    fn capability(&self) -> BackendCapability {
        capability()
    }

    async fn apply(&self, kind: SubResourceKind, inputs: &Attributes) -> AdapterResult<Applied> {
        tracing::info!("Creating {} on AWS", kind);
        let applied = match kind {
            SubResourceKind::VirtualNetwork => self.create_vpc(inputs).await,
            SubResourceKind::Subnet => self.create_subnet(inputs).await,
            SubResourceKind::InternetGateway => self.create_internet_gateway(inputs).await,
            SubResourceKind::GatewayAttachment => self.attach_gateway(inputs).await,
            SubResourceKind::ComputeInstance => self.run_instance(inputs).await,
            SubResourceKind::ObjectBucket => self.create_bucket(inputs).await,
            SubResourceKind::BucketVersioning => self.enable_versioning(inputs).await,
            SubResourceKind::MessageQueue => self.create_queue(inputs).await,
            SubResourceKind::Secret => self.create_secret(inputs).await,
            SubResourceKind::ContainerRegistry => self.create_repository(inputs).await,
            SubResourceKind::DnsRecord => self.create_record(inputs).await,
            other => Err(AwsError::Unsupported(other)),
        }?;
        tracing::debug!("Created {} {:?}", kind, applied.id());
        Ok(applied)
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

#[cfg(test)]
mod tests {
    use super::*;
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
            cap.completion(SubResourceKind::InternetGateway),
            Some(Completion::Sync)
        );
        for kind in [
            SubResourceKind::GatewayAttachment,
            SubResourceKind::BucketVersioning,
            SubResourceKind::MessageQueue,
            SubResourceKind::Secret,
            SubResourceKind::ContainerRegistry,
            SubResourceKind::DnsRecord,
        ] {
            assert_eq!(cap.completion(kind), Some(Completion::Sync), "{}", kind);
        }
        assert!(!cap.supports(SubResourceKind::LoadBalancer));
        assert!(!cap.supports(SubResourceKind::SecretVersion));
    }

    /// Every chain the adapter can plan uses only single-call sub-resources
    #[test]
    fn test_supported_resource_chains() {
        use stratus_engine::{Backend, ChainBuilder, ResourceKind};

        let mut attrs = Attributes::new();
        for (k, v) in [
            ("name", "web"),
            ("image", "ami-0abc"),
            ("zone", "example.com"),
            ("hosted_zone_id", "Z0123456789"),
            ("value", "203.0.113.10"),
        ] {
            attrs.insert(k.into(), v.into());
        }
        let cap = capability();
        for kind in [
            ResourceKind::Bucket,
            ResourceKind::Network,
            ResourceKind::Instance,
            ResourceKind::Queue,
            ResourceKind::Secret,
            ResourceKind::Registry,
            ResourceKind::DnsRecord,
        ] {
            assert!(
                ChainBuilder::build(kind, Backend::Aws, &cap, &attrs).is_ok(),
                "{}",
                kind
            );
        }
        assert!(ChainBuilder::build(ResourceKind::Cluster, Backend::Aws, &cap, &attrs).is_err());
    }

    #[test]
    fn test_instance_status() {
        use InstanceStateName as S;

        assert_eq!(instance_status(Some(&S::Running), false), OperationStatus::Done);
        assert_eq!(instance_status(Some(&S::Pending), false), OperationStatus::Pending);
        assert!(matches!(
            instance_status(Some(&S::Terminated), false),
            OperationStatus::Failed(_)
        ));
        assert_eq!(instance_status(Some(&S::ShuttingDown), true), OperationStatus::Pending);
        assert_eq!(instance_status(Some(&S::Terminated), true), OperationStatus::Done);
        assert_eq!(instance_status(None, true), OperationStatus::Done);
    }

    #[test]
    #[serial]
    fn test_settings_from_env() {
        temp_env::with_vars(
            [("AWS_REGION", None), ("AWS_DEFAULT_REGION", Some("ap-northeast-1"))],
            || {
                assert_eq!(
                    AwsSettings::from_env().region.as_deref(),
                    Some("ap-northeast-1")
                );
            },
        );
        temp_env::with_vars_unset(["AWS_REGION", "AWS_DEFAULT_REGION"], || {
            assert_eq!(AwsSettings::from_env(), AwsSettings::default());
        });
    }
}
