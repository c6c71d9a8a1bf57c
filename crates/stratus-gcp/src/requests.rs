//! REST request builders
//!
//! Identifiers follow the API's own scoping: global resources are bare
//! names, regional ones `region/name`, zonal ones `zone/name` and DNS
//! records `managed-zone/fqdn/TYPE`.

use crate::error::{GcpError, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Method;
use serde_json::{Value, json};
use stratus_engine::{Attributes, AttributesExt, SubResourceKind};

const COMPUTE_API: &str = "https://compute.googleapis.com/compute/v1";
const STORAGE_API: &str = "https://storage.googleapis.com/storage/v1";
const DNS_API: &str = "https://dns.googleapis.com/dns/v1";
const SECRETS_API: &str = "https://secretmanager.googleapis.com/v1";

const DEFAULT_MACHINE_TYPE: &str = "e2-medium";

/// One REST call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl ApiCall {
    fn get(url: String) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
        }
    }

    fn delete(url: String) -> Self {
        Self {
            method: Method::DELETE,
            url,
            body: None,
        }
    }

    fn post(url: String, body: Value) -> Self {
        Self {
            method: Method::POST,
            url,
            body: Some(body),
        }
    }
}

/// Whether the kind is a Compute Engine resource answered with an operation
pub fn is_compute(kind: SubResourceKind) -> bool {
    matches!(
        kind,
        SubResourceKind::VirtualNetwork
            | SubResourceKind::Subnet
            | SubResourceKind::ComputeInstance
            | SubResourceKind::PublicAddress
    )
}

fn split<'a>(kind: SubResourceKind, id: &'a str, n: usize) -> Result<Vec<&'a str>> {
    let parts: Vec<&str> = id.split('/').collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return Err(GcpError::InvalidId {
            kind: kind.to_string(),
            id: id.to_string(),
        });
    }
    Ok(parts)
}

fn input<'a>(inputs: &'a Attributes, key: &str) -> Result<&'a str> {
    inputs
        .str_attr(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GcpError::MissingInput(key.to_string()))
}

/// `family/image` shorthand to a full image path
fn source_image(image: &str) -> String {
    if image.starts_with("projects/") || image.starts_with("https://") {
        return image.to_string();
    }
    match image.split_once('/') {
        Some((project, family)) => format!("projects/{}/global/images/family/{}", project, family),
        None => image.to_string(),
    }
}

/// URL of an existing sub-resource
pub fn resource_url(project: &str, kind: SubResourceKind, id: &str) -> Result<String> {
    use SubResourceKind as S;

    let compute = format!("{}/projects/{}", COMPUTE_API, project);
    Ok(match kind {
        S::ObjectBucket => format!("{}/b/{}", STORAGE_API, split(kind, id, 1)?[0]),
        S::VirtualNetwork => format!("{}/global/networks/{}", compute, split(kind, id, 1)?[0]),
        S::Subnet => {
            let p = split(kind, id, 2)?;
            format!("{}/regions/{}/subnetworks/{}", compute, p[0], p[1])
        }
        S::PublicAddress => {
            let p = split(kind, id, 2)?;
            format!("{}/regions/{}/addresses/{}", compute, p[0], p[1])
        }
        S::ComputeInstance => {
            let p = split(kind, id, 2)?;
            format!("{}/zones/{}/instances/{}", compute, p[0], p[1])
        }
        S::DnsZone => format!(
            "{}/projects/{}/managedZones/{}",
            DNS_API,
            project,
            split(kind, id, 1)?[0]
        ),
        S::DnsRecord => {
            let p = split(kind, id, 3)?;
            format!(
                "{}/projects/{}/managedZones/{}/rrsets/{}/{}",
                DNS_API, project, p[0], p[1], p[2]
            )
        }
        S::Secret => format!(
            "{}/projects/{}/secrets/{}",
            SECRETS_API,
            project,
            split(kind, id, 1)?[0]
        ),
        S::SecretVersion => {
            let p = split(kind, id, 2)?;
            format!(
                "{}/projects/{}/secrets/{}/versions/{}",
                SECRETS_API, project, p[0], p[1]
            )
        }
        other => return Err(GcpError::Unsupported(other)),
    })
}

pub fn get_call(project: &str, kind: SubResourceKind, id: &str) -> Result<ApiCall> {
    Ok(ApiCall::get(resource_url(project, kind, id)?))
}

/// Secret versions are destroyed in place rather than deleted
pub fn delete_call(project: &str, kind: SubResourceKind, id: &str) -> Result<ApiCall> {
    let url = resource_url(project, kind, id)?;
    if kind == SubResourceKind::SecretVersion {
        return Ok(ApiCall::post(format!("{}:destroy", url), json!({})));
    }
    Ok(ApiCall::delete(url))
}

/// `secret/version` from a version resource name
/// (`projects/{p}/secrets/{secret}/versions/{version}`)
pub fn secret_version_id(resource_name: &str) -> Option<String> {
    let parts: Vec<&str> = resource_name.split('/').collect();
    match parts.as_slice() {
        [.., "secrets", secret, "versions", version] if !secret.is_empty() && !version.is_empty() => {
            Some(format!("{}/{}", secret, version))
        }
        _ => None,
    }
}

/// Creation call; the identifier is the `id` input where the chain fixes one
pub fn create_call(project: &str, kind: SubResourceKind, inputs: &Attributes) -> Result<ApiCall> {
    use SubResourceKind as S;

    if kind == S::SecretVersion {
        return Ok(ApiCall::post(
            format!(
                "{}/projects/{}/secrets/{}:addVersion",
                SECRETS_API,
                project,
                input(inputs, "secret")?
            ),
            json!({ "payload": { "data": BASE64.encode(input(inputs, "value")?) } }),
        ));
    }

    let compute = format!("{}/projects/{}", COMPUTE_API, project);
    let name = input(inputs, "name")?;

    Ok(match kind {
        S::ObjectBucket => {
            let mut body = json!({
                "name": name,
                "location": inputs.str_or("location", "US"),
            });
            if let Some(class) = inputs.str_attr("storage_class") {
                body["storageClass"] = json!(class);
            }
            if inputs.bool_attr("versioning") == Some(true) {
                body["versioning"] = json!({ "enabled": true });
            }
            ApiCall::post(format!("{}/b?project={}", STORAGE_API, project), body)
        }
        S::VirtualNetwork => ApiCall::post(
            format!("{}/global/networks", compute),
            json!({ "name": name, "autoCreateSubnetworks": false }),
        ),
        S::Subnet => {
            let region = input(inputs, "region")?;
            ApiCall::post(
                format!("{}/regions/{}/subnetworks", compute, region),
                json!({
                    "name": name,
                    "network": format!("projects/{}/global/networks/{}", project, input(inputs, "network")?),
                    "ipCidrRange": input(inputs, "cidr_block")?,
                }),
            )
        }
        S::PublicAddress => {
            let region = input(inputs, "region")?;
            ApiCall::post(
                format!("{}/regions/{}/addresses", compute, region),
                json!({ "name": name }),
            )
        }
        S::ComputeInstance => {
            let zone = input(inputs, "zone")?;
            let machine_type = inputs.str_or("machine_type", DEFAULT_MACHINE_TYPE);
            ApiCall::post(
                format!("{}/zones/{}/instances", compute, zone),
                json!({
                    "name": name,
                    "machineType": format!("zones/{}/machineTypes/{}", zone, machine_type),
                    "disks": [{
                        "boot": true,
                        "autoDelete": true,
                        "initializeParams": { "sourceImage": source_image(input(inputs, "image")?) },
                    }],
                    "networkInterfaces": [{
                        "network": format!("global/networks/{}", inputs.str_or("network", "default")),
                        "accessConfigs": [{ "type": "ONE_TO_ONE_NAT", "name": "External NAT" }],
                    }],
                }),
            )
        }
        S::DnsZone => ApiCall::post(
            format!("{}/projects/{}/managedZones", DNS_API, project),
            json!({
                "name": name,
                "dnsName": input(inputs, "dns_name")?,
                "description": "Managed by stratus",
            }),
        ),
        S::DnsRecord => {
            let zone = input(inputs, "zone")?;
            ApiCall::post(
                format!("{}/projects/{}/managedZones/{}/rrsets", DNS_API, project, zone),
                json!({
                    "name": name,
                    "type": inputs.str_or("record_type", "A").to_ascii_uppercase(),
                    "ttl": inputs.int_attr("ttl").unwrap_or(300),
                    "rrdatas": [input(inputs, "value")?],
                }),
            )
        }
        S::Secret => ApiCall::post(
            format!("{}/projects/{}/secrets?secretId={}", SECRETS_API, project, name),
            json!({ "replication": { "automatic": {} } }),
        ),
        other => return Err(GcpError::Unsupported(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_engine::AttrValue;

    fn inputs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_instance_call() {
        let i = inputs(&[
            ("name", "web".into()),
            ("zone", "us-central1-a".into()),
            ("image", "debian-cloud/debian-12".into()),
            ("machine_type", "e2-small".into()),
        ]);
        let call = create_call("demo", SubResourceKind::ComputeInstance, &i).unwrap();
        assert_eq!(call.method, Method::POST);
        assert_eq!(
            call.url,
            "https://compute.googleapis.com/compute/v1/projects/demo/zones/us-central1-a/instances"
        );
        let body = call.body.unwrap();
        assert_eq!(body["machineType"], "zones/us-central1-a/machineTypes/e2-small");
        assert_eq!(
            body["disks"][0]["initializeParams"]["sourceImage"],
            "projects/debian-cloud/global/images/family/debian-12"
        );
        assert_eq!(body["networkInterfaces"][0]["network"], "global/networks/default");
    }

    #[test]
    fn test_dns_record_urls() {
        let i = inputs(&[
            ("name", "www.example.com.".into()),
            ("zone", "example-com".into()),
            ("record_type", "a".into()),
            ("value", "203.0.113.10".into()),
        ]);
        let call = create_call("demo", SubResourceKind::DnsRecord, &i).unwrap();
        let body = call.body.unwrap();
        assert_eq!(body["type"], "A");
        assert_eq!(body["ttl"], 300);
        assert_eq!(body["rrdatas"][0], "203.0.113.10");

        let get = get_call("demo", SubResourceKind::DnsRecord, "example-com/www.example.com./A").unwrap();
        assert_eq!(
            get.url,
            "https://dns.googleapis.com/dns/v1/projects/demo/managedZones/example-com/rrsets/www.example.com./A"
        );
    }

    #[test]
    fn test_secret_calls() {
        let i = inputs(&[("name", "token".into()), ("value", "hunter2".into())]);
        let call = create_call("demo", SubResourceKind::Secret, &i).unwrap();
        assert!(call.url.ends_with("/projects/demo/secrets?secretId=token"));

        assert_eq!(call.body.unwrap()["replication"]["automatic"], json!({}));

        let v = inputs(&[("secret", "token".into()), ("value", "hunter2".into())]);
        let version = create_call("demo", SubResourceKind::SecretVersion, &v).unwrap();
        assert!(version.url.ends_with("/projects/demo/secrets/token:addVersion"));
        assert_eq!(version.body.unwrap()["payload"]["data"], "aHVudGVyMg==");

        let missing = inputs(&[("secret", "token".into())]);
        assert!(matches!(
            create_call("demo", SubResourceKind::SecretVersion, &missing),
            Err(GcpError::MissingInput(key)) if key == "value"
        ));
    }

    #[test]
    fn test_secret_version_ids() {
        assert_eq!(
            secret_version_id("projects/123/secrets/token/versions/4").as_deref(),
            Some("token/4")
        );
        assert_eq!(secret_version_id("projects/123/secrets/token"), None);

        let get = get_call("demo", SubResourceKind::SecretVersion, "token/4").unwrap();
        assert!(get.url.ends_with("/projects/demo/secrets/token/versions/4"));

        let destroy = delete_call("demo", SubResourceKind::SecretVersion, "token/4").unwrap();
        assert_eq!(destroy.method, Method::POST);
        assert!(destroy.url.ends_with("/secrets/token/versions/4:destroy"));

        let delete = delete_call("demo", SubResourceKind::Secret, "token").unwrap();
        assert_eq!(delete.method, Method::DELETE);
    }

    #[test]
    fn test_delete_and_invalid_ids() {
        let call = delete_call("demo", SubResourceKind::Subnet, "us-central1/net-subnet").unwrap();
        assert_eq!(call.method, Method::DELETE);
        assert!(call.url.ends_with("/regions/us-central1/subnetworks/net-subnet"));

        assert!(matches!(
            get_call("demo", SubResourceKind::ComputeInstance, "web"),
            Err(GcpError::InvalidId { .. })
        ));
        assert!(matches!(
            get_call("demo", SubResourceKind::ResourceGroup, "rg"),
            Err(GcpError::Unsupported(SubResourceKind::ResourceGroup))
        ));
    }

    #[test]
    fn test_compute_kinds() {
        assert!(is_compute(SubResourceKind::Subnet));
        assert!(!is_compute(SubResourceKind::ObjectBucket));
        assert!(!is_compute(SubResourceKind::DnsRecord));
    }
}
