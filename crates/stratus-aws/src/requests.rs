//! Request parameters
//!
//! Pure helpers turning chain inputs and identifiers into SDK request
//! parts. Identifiers follow the chain's scoping: buckets are `name` or
//! `region/name`, gateway attachments `igw/vpc` and DNS records
//! `hosted-zone/fqdn/TYPE`.

use crate::error::{AwsError, Result};
use aws_sdk_ecr::types::ImageScanningConfiguration;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_sqs::types::QueueAttributeName;
use std::collections::HashMap;
use stratus_engine::{Attributes, AttributesExt, SubResourceKind};

pub const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_DNS_TTL: i64 = 300;

pub fn required<'a>(inputs: &'a Attributes, key: &str) -> Result<&'a str> {
    inputs
        .str_attr(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AwsError::MissingInput(key.to_string()))
}

fn invalid(kind: SubResourceKind, id: &str) -> AwsError {
    AwsError::InvalidId {
        kind,
        id: id.to_string(),
    }
}

/// Region and name of a bucket; a bare name lives in `default_region`
pub fn bucket_ref<'a>(id: &'a str, default_region: &'a str) -> Result<(&'a str, &'a str)> {
    let (region, name) = id.split_once('/').unwrap_or((default_region, id));
    if region.is_empty() || name.is_empty() || name.contains('/') {
        return Err(invalid(SubResourceKind::ObjectBucket, id));
    }
    Ok((region, name))
}

/// Bucket location constraint; `us-east-1` takes none
pub fn location_constraint(region: &str) -> Option<CreateBucketConfiguration> {
    if region == DEFAULT_REGION {
        return None;
    }
    Some(
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build(),
    )
}

/// Gateway and VPC of an attachment
pub fn attachment_ref(id: &str) -> Result<(&str, &str)> {
    match id.split_once('/') {
        Some((gateway, vpc)) if !gateway.is_empty() && !vpc.is_empty() => Ok((gateway, vpc)),
        _ => Err(invalid(SubResourceKind::GatewayAttachment, id)),
    }
}

/// SQS attributes set at creation
pub fn queue_attributes(inputs: &Attributes) -> HashMap<QueueAttributeName, String> {
    let mut attributes = HashMap::new();
    if inputs.bool_attr("fifo") == Some(true) {
        attributes.insert(QueueAttributeName::FifoQueue, "true".to_string());
    }
    if let Some(timeout) = inputs.int_attr("visibility_timeout") {
        attributes.insert(QueueAttributeName::VisibilityTimeout, timeout.to_string());
    }
    attributes
}

pub fn scan_configuration(inputs: &Attributes) -> ImageScanningConfiguration {
    ImageScanningConfiguration::builder()
        .scan_on_push(inputs.bool_attr("scan_on_push").unwrap_or(false))
        .build()
}

/// Hosted zone, record name and type of a DNS record
pub fn dns_record_ref(id: &str) -> Result<(&str, &str, RrType)> {
    let parts: Vec<&str> = id.splitn(3, '/').collect();
    match parts.as_slice() {
        [zone, name, record_type]
            if !zone.is_empty() && !name.is_empty() && !record_type.is_empty() =>
        {
            Ok((*zone, *name, RrType::from(*record_type)))
        }
        _ => Err(invalid(SubResourceKind::DnsRecord, id)),
    }
}

/// Record set described by the chain inputs
pub fn record_set(inputs: &Attributes) -> Result<ResourceRecordSet> {
    let value = ResourceRecord::builder()
        .value(required(inputs, "value")?)
        .build()
        .map_err(|e| AwsError::InvalidRequest(e.to_string()))?;
    ResourceRecordSet::builder()
        .name(required(inputs, "name")?)
        .r#type(RrType::from(
            inputs.str_or("record_type", "A").to_ascii_uppercase().as_str(),
        ))
        .ttl(inputs.int_attr("ttl").unwrap_or(DEFAULT_DNS_TTL))
        .resource_records(value)
        .build()
        .map_err(|e| AwsError::InvalidRequest(e.to_string()))
}

pub fn change_batch(action: ChangeAction, set: ResourceRecordSet) -> Result<ChangeBatch> {
    let change = Change::builder()
        .action(action)
        .resource_record_set(set)
        .build()
        .map_err(|e| AwsError::InvalidRequest(e.to_string()))?;
    ChangeBatch::builder()
        .comment("Managed by stratus")
        .changes(change)
        .build()
        .map_err(|e| AwsError::InvalidRequest(e.to_string()))
}

/// Route53 returns names with a trailing dot and may differ in case
pub fn same_record_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}
