//! Naming and normalization
//!
//! Backend-specific name constraints and generic size classes, applied to
//! the declared attributes before any adapter call. Every rule here is a
//! fixed point: normalizing an already-normalized map changes nothing.

use crate::attrs::{AttrValue, Attributes, AttributesExt};
use crate::backend::{Backend, ResourceKind};

/// Generic size class a spec may use instead of a backend SKU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "small" => Some(SizeClass::Small),
            "medium" => Some(SizeClass::Medium),
            "large" => Some(SizeClass::Large),
            _ => None,
        }
    }

    fn pick(self, table: [&'static str; 3]) -> &'static str {
        match self {
            SizeClass::Small => table[0],
            SizeClass::Medium => table[1],
            SizeClass::Large => table[2],
        }
    }
}

/// Attribute carrying the size class for a kind, with its default
fn size_attribute(kind: ResourceKind) -> Option<(&'static str, SizeClass)> {
    match kind {
        ResourceKind::Instance => Some(("size", SizeClass::Small)),
        ResourceKind::Database => Some(("size", SizeClass::Small)),
        ResourceKind::Cluster => Some(("node_size", SizeClass::Medium)),
        _ => None,
    }
}

fn size_table(backend: Backend, kind: ResourceKind) -> Option<[&'static str; 3]> {
    let table = match (kind, backend) {
        (ResourceKind::Instance, Backend::Aws) => ["t3.small", "t3.medium", "t3.large"],
        (ResourceKind::Instance, Backend::Azure) => {
            ["Standard_B1s", "Standard_B2s", "Standard_B4ms"]
        }
        (ResourceKind::Instance, Backend::Gcp) => ["e2-small", "e2-medium", "e2-standard-4"],
        (ResourceKind::Database, Backend::Aws) => ["db.t3.micro", "db.t3.medium", "db.m5.large"],
        (ResourceKind::Database, Backend::Azure) => {
            ["Standard_B1ms", "Standard_B2s", "Standard_D2ds_v4"]
        }
        (ResourceKind::Database, Backend::Gcp) => {
            ["db-f1-micro", "db-g1-small", "db-custom-2-7680"]
        }
        (ResourceKind::Cluster, Backend::Aws) => ["t3.small", "t3.medium", "t3.large"],
        (ResourceKind::Cluster, Backend::Azure) => {
            ["Standard_B2s", "Standard_DS2_v2", "Standard_D4s_v3"]
        }
        (ResourceKind::Cluster, Backend::Gcp) => ["e2-small", "e2-medium", "e2-standard-4"],
        _ => return None,
    };
    Some(table)
}

/// Concrete size identifier for a declared value
///
/// Generic classes map through the table; anything else is taken to be a
/// backend-native identifier and passes through.
pub fn resolve_size(backend: Backend, kind: ResourceKind, declared: Option<&str>) -> Option<String> {
    let (_, default) = size_attribute(kind)?;
    let table = size_table(backend, kind)?;
    let class = match declared {
        None | Some("") => Some(default),
        Some(value) => SizeClass::parse(value),
    };
    match class {
        Some(class) => Some(class.pick(table).to_string()),
        None => declared.map(str::to_string),
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Azure storage account: lowercase alphanumeric, at most 24
pub fn azure_storage_account(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    truncate(&cleaned, 24)
}

/// Azure container registry: alphanumeric, at most 50
pub fn azure_registry(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    truncate(&cleaned, 50)
}

/// Azure blob container or queue: lowercase alphanumeric runs joined by
/// single hyphens, at most 63
pub fn azure_container(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            cleaned.push(c.to_ascii_lowercase());
        } else if !cleaned.is_empty() && !cleaned.ends_with('-') {
            cleaned.push('-');
        }
    }
    truncate(&cleaned, 63).trim_end_matches('-').to_string()
}

/// AWS S3 bucket: lowercase, at most 63
pub fn aws_bucket(name: &str) -> String {
    truncate(&name.to_ascii_lowercase(), 63)
}

/// GCP storage bucket: lowercase, at most 63
pub fn gcp_bucket(name: &str) -> String {
    truncate(&name.to_ascii_lowercase(), 63)
}

/// AWS SQS FIFO queue: base at most 75, `.fifo` suffix
pub fn aws_fifo_queue(name: &str) -> String {
    let base = name.strip_suffix(".fifo").unwrap_or(name);
    format!("{}.fifo", truncate(base, 75))
}

/// AWS load balancer: at most 32
pub fn aws_load_balancer(name: &str) -> String {
    truncate(name, 32)
}

/// GCP resource name: lowercase, `_` replaced by `-`, at most 63
pub fn gcp_resource(name: &str) -> String {
    truncate(&name.to_ascii_lowercase().replace('_', "-"), 63)
}

/// Normalize declared attributes for one backend and kind
pub fn normalize(backend: Backend, kind: ResourceKind, raw: &Attributes) -> Attributes {
    let mut out = raw.clone();

    if let Some((key, _)) = size_attribute(kind) {
        if let Some(size) = resolve_size(backend, kind, raw.str_attr(key)) {
            out.insert(key.to_string(), AttrValue::String(size));
        }
    }

    let name = raw.str_attr("name").map(str::to_string);
    let set_name = |out: &mut Attributes, f: fn(&str) -> String| {
        if let Some(name) = &name {
            out.insert("name".to_string(), AttrValue::String(f(name)));
        }
    };

    match (backend, kind) {
        (Backend::Aws, ResourceKind::Bucket) => set_name(&mut out, aws_bucket),
        (Backend::Aws, ResourceKind::Queue) if raw.bool_attr("fifo") == Some(true) => {
            set_name(&mut out, aws_fifo_queue)
        }
        (Backend::Aws, ResourceKind::LoadBalancer) => set_name(&mut out, aws_load_balancer),
        (Backend::Azure, ResourceKind::Bucket | ResourceKind::Queue | ResourceKind::Function) => {
            let source = raw.str_attr("account").or(name.as_deref());
            if let Some(source) = source {
                out.insert(
                    "account".to_string(),
                    AttrValue::String(azure_storage_account(source)),
                );
            }
            if kind != ResourceKind::Function {
                set_name(&mut out, azure_container);
            }
        }
        (Backend::Azure, ResourceKind::Registry) => set_name(&mut out, azure_registry),
        (Backend::Gcp, ResourceKind::Bucket) => set_name(&mut out, gcp_bucket),
        (
            Backend::Gcp,
            ResourceKind::Instance
            | ResourceKind::Network
            | ResourceKind::Cluster
            | ResourceKind::Database,
        ) => set_name(&mut out, gcp_resource),
        _ => {}
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, AttrValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_size_classes() {
        let raw = attrs(&[("size", "SMALL".into())]);
        let out = normalize(Backend::Azure, ResourceKind::Instance, &raw);
        assert_eq!(out.str_attr("size"), Some("Standard_B1s"));

        let raw = attrs(&[("size", "large".into())]);
        let out = normalize(Backend::Gcp, ResourceKind::Database, &raw);
        assert_eq!(out.str_attr("size"), Some("db-custom-2-7680"));
    }

    #[test]
    fn test_size_defaults_and_pass_through() {
        let out = normalize(Backend::Aws, ResourceKind::Instance, &Attributes::new());
        assert_eq!(out.str_attr("size"), Some("t3.small"));

        let out = normalize(Backend::Azure, ResourceKind::Cluster, &Attributes::new());
        assert_eq!(out.str_attr("node_size"), Some("Standard_DS2_v2"));

        let raw = attrs(&[("size", "m5.2xlarge".into())]);
        let out = normalize(Backend::Aws, ResourceKind::Instance, &raw);
        assert_eq!(out.str_attr("size"), Some("m5.2xlarge"));
    }

    #[test]
    fn test_azure_storage_account_derived_from_name() {
        let raw = attrs(&[("name", "My-Assets_Bucket-For-Production-2024".into())]);
        let out = normalize(Backend::Azure, ResourceKind::Bucket, &raw);
        assert_eq!(out.str_attr("account"), Some("myassetsbucketforproduct"));
        assert_eq!(
            out.str_attr("name"),
            Some("my-assets-bucket-for-production-2024")
        );
    }

    #[test]
    fn test_azure_container_and_queue_names() {
        let raw = attrs(&[("name", "My_Assets".into())]);
        let out = normalize(Backend::Azure, ResourceKind::Bucket, &raw);
        assert_eq!(out.str_attr("name"), Some("my-assets"));
        assert_eq!(out.str_attr("account"), Some("myassets"));

        let out = normalize(Backend::Azure, ResourceKind::Queue, &raw);
        assert_eq!(out.str_attr("name"), Some("my-assets"));

        let out = normalize(Backend::Azure, ResourceKind::Function, &raw);
        assert_eq!(out.str_attr("name"), Some("My_Assets"));

        assert_eq!(azure_container("__Jobs..Queue--"), "jobs-queue");
        assert_eq!(azure_container(&"q".repeat(90)).len(), 63);
    }

    #[test]
    fn test_aws_rules() {
        let raw = attrs(&[("name", "Orders".into()), ("fifo", true.into())]);
        let out = normalize(Backend::Aws, ResourceKind::Queue, &raw);
        assert_eq!(out.str_attr("name"), Some("Orders.fifo"));

        let long = "x".repeat(100);
        assert_eq!(aws_fifo_queue(&long).len(), 80);
        assert_eq!(aws_bucket(&long).len(), 63);
        assert_eq!(aws_load_balancer(&long).len(), 32);
    }

    #[test]
    fn test_gcp_names() {
        let raw = attrs(&[("name", "Web_Server_1".into())]);
        let out = normalize(Backend::Gcp, ResourceKind::Instance, &raw);
        assert_eq!(out.str_attr("name"), Some("web-server-1"));

        let raw = attrs(&[("name", "My_Assets".into())]);
        let out = normalize(Backend::Gcp, ResourceKind::Bucket, &raw);
        assert_eq!(out.str_attr("name"), Some("my_assets"));
        assert_eq!(gcp_bucket(&"B".repeat(100)).len(), 63);
    }

    #[test]
    fn test_normalize_is_fixed_point() {
        let samples = vec![
            attrs(&[("name", "My_Bucket.Name-ABC".into())]),
            attrs(&[("name", "My_Assets".into())]),
            attrs(&[("name", "-Edge--Case_".into())]),
            attrs(&[("name", "Q".repeat(90).into()), ("fifo", true.into())]),
            attrs(&[("name", "Reg-Istry_9".into()), ("size", "Medium".into())]),
            attrs(&[("node_size", "large".into()), ("name", "K8S_Main".into())]),
            Attributes::new(),
        ];
        for backend in Backend::ALL {
            for kind in ResourceKind::ALL {
                for raw in &samples {
                    let once = normalize(backend, kind, raw);
                    let twice = normalize(backend, kind, &once);
                    assert_eq!(once, twice, "{} {}", backend, kind);
                }
            }
        }
    }
}
