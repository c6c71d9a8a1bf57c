//! az argument builders
//!
//! Azure identifiers used by the adapter are `/`-separated paths rooted at
//! the resource group: `rg`, `rg/name`, `rg/vnet/subnet`,
//! `rg/account/container` and `rg/zone/TYPE/name`. These builders turn a
//! sub-resource kind plus an identifier or an input map into the argument
//! list for one az invocation.

use crate::error::{AzureError, Result};
use stratus_engine::{Attributes, AttributesExt, SubResourceKind};

/// Split an identifier into exactly `n` non-empty segments
fn segments(kind: SubResourceKind, id: &str, n: usize) -> Result<Vec<String>> {
    let parts: Vec<String> = id.split('/').map(str::to_string).collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return Err(AzureError::InvalidId {
            kind: kind.to_string(),
            id: id.to_string(),
        });
    }
    Ok(parts)
}

/// Last segment of a linked identifier
fn leaf(kind: SubResourceKind, id: &str, n: usize) -> Result<String> {
    let mut parts = segments(kind, id, n)?;
    parts.pop().ok_or_else(|| AzureError::InvalidId {
        kind: kind.to_string(),
        id: id.to_string(),
    })
}

fn input<'a>(inputs: &'a Attributes, key: &str) -> Result<&'a str> {
    inputs
        .str_attr(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AzureError::MissingInput(key.to_string()))
}

fn display(inputs: &Attributes, key: &str) -> Option<String> {
    inputs.get(key).map(|v| v.to_string())
}

/// az record-set subcommand and value flag for a DNS record type
fn record_type(value: &str) -> Result<(&'static str, &'static str, &'static str)> {
    match value.to_ascii_uppercase().as_str() {
        "A" => Ok(("a", "add-record", "--ipv4-address")),
        "AAAA" => Ok(("aaaa", "add-record", "--ipv6-address")),
        "CNAME" => Ok(("cname", "set-record", "--cname")),
        "TXT" => Ok(("txt", "add-record", "--value")),
        other => Err(AzureError::InvalidInput(format!(
            "unsupported DNS record type: {}",
            other
        ))),
    }
}

/// Noun and scope flags addressing an existing sub-resource
struct Target {
    noun: Vec<String>,
    scope: Vec<String>,
    /// Data-plane kinds are probed with `exists` instead of `show`
    data_plane: bool,
    /// Whether `delete` takes `--yes`
    confirm: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn target(kind: SubResourceKind, id: &str) -> Result<Target> {
    use SubResourceKind as S;

    let in_group = |noun: &[&str], confirm: bool| -> Result<Target> {
        let p = segments(kind, id, 2)?;
        Ok(Target {
            noun: strings(noun),
            scope: vec!["-g".into(), p[0].clone(), "-n".into(), p[1].clone()],
            data_plane: false,
            confirm,
        })
    };
    let in_account = |noun: &[&str]| -> Result<Target> {
        let p = segments(kind, id, 3)?;
        Ok(Target {
            noun: strings(noun),
            scope: vec![
                "--account-name".into(),
                p[1].clone(),
                "-n".into(),
                p[2].clone(),
                "--auth-mode".into(),
                "login".into(),
            ],
            data_plane: true,
            confirm: false,
        })
    };

    match kind {
        S::ResourceGroup => {
            let p = segments(kind, id, 1)?;
            Ok(Target {
                noun: strings(&["group"]),
                scope: vec!["--name".into(), p[0].clone()],
                data_plane: false,
                confirm: true,
            })
        }
        S::VirtualNetwork => in_group(&["network", "vnet"], false),
        S::Subnet => {
            let p = segments(kind, id, 3)?;
            Ok(Target {
                noun: strings(&["network", "vnet", "subnet"]),
                scope: vec![
                    "-g".into(),
                    p[0].clone(),
                    "--vnet-name".into(),
                    p[1].clone(),
                    "-n".into(),
                    p[2].clone(),
                ],
                data_plane: false,
                confirm: false,
            })
        }
        S::PublicAddress => in_group(&["network", "public-ip"], false),
        S::NetworkInterface => in_group(&["network", "nic"], false),
        S::ComputeInstance => in_group(&["vm"], true),
        S::StorageAccount => in_group(&["storage", "account"], true),
        S::BlobContainer => in_account(&["storage", "container"]),
        S::MessageQueue => in_account(&["storage", "queue"]),
        S::KubernetesCluster => in_group(&["aks"], true),
        S::ContainerRegistry => in_group(&["acr"], true),
        S::LoadBalancer => in_group(&["network", "lb"], false),
        S::ContainerGroup => in_group(&["container"], true),
        S::DnsZone => in_group(&["network", "dns", "zone"], true),
        S::DnsRecord => {
            let p = segments(kind, id, 4)?;
            let (set, _, _) = record_type(&p[2])?;
            Ok(Target {
                noun: strings(&["network", "dns", "record-set", set]),
                scope: vec![
                    "-g".into(),
                    p[0].clone(),
                    "-z".into(),
                    p[1].clone(),
                    "-n".into(),
                    p[3].clone(),
                ],
                data_plane: false,
                confirm: true,
            })
        }
        other => Err(AzureError::Unsupported(other)),
    }
}

/// Whether existence is reported as `{"exists": bool}` rather than by `show`
pub fn is_data_plane(kind: SubResourceKind) -> bool {
    matches!(
        kind,
        SubResourceKind::BlobContainer | SubResourceKind::MessageQueue
    )
}

/// Arguments for `show` (or `exists` for data-plane kinds)
pub fn show_args(kind: SubResourceKind, id: &str) -> Result<Vec<String>> {
    let t = target(kind, id)?;
    let verb = if t.data_plane { "exists" } else { "show" };
    let mut args = t.noun;
    args.push(verb.to_string());
    args.extend(t.scope);
    Ok(args)
}

/// Arguments for `delete`; long-running deletes are issued with `--no-wait`
pub fn delete_args(kind: SubResourceKind, id: &str) -> Result<Vec<String>> {
    let t = target(kind, id)?;
    let mut args = t.noun;
    args.push("delete".to_string());
    args.extend(t.scope);
    if t.confirm {
        args.push("--yes".to_string());
    }
    if deletes_async(kind) {
        args.push("--no-wait".to_string());
    }
    Ok(args)
}

/// Kinds created with `--no-wait` and polled afterwards
pub fn creates_async(kind: SubResourceKind) -> bool {
    matches!(
        kind,
        SubResourceKind::ComputeInstance
            | SubResourceKind::KubernetesCluster
            | SubResourceKind::ContainerGroup
    )
}

/// Kinds deleted with `--no-wait` and polled afterwards
pub fn deletes_async(kind: SubResourceKind) -> bool {
    matches!(
        kind,
        SubResourceKind::ComputeInstance | SubResourceKind::KubernetesCluster
    )
}

/// Arguments for creating a sub-resource from resolved chain inputs
pub fn create_args(
    kind: SubResourceKind,
    inputs: &Attributes,
    default_location: &str,
) -> Result<Vec<String>> {
    use SubResourceKind as S;

    let id = input(inputs, "id")?;
    let location = inputs.str_or("location", default_location).to_string();
    let mut args: Vec<String>;

    match kind {
        S::ResourceGroup => {
            let p = segments(kind, id, 1)?;
            args = strings(&["group", "create", "--name"]);
            args.push(p[0].clone());
            args.extend(["--location".into(), location]);
        }
        S::VirtualNetwork => {
            let p = segments(kind, id, 2)?;
            args = strings(&["network", "vnet", "create", "-g"]);
            args.extend([p[0].clone(), "-n".into(), p[1].clone()]);
            args.extend([
                "--address-prefixes".into(),
                input(inputs, "address_prefix")?.to_string(),
                "--location".into(),
                location,
            ]);
        }
        S::Subnet => {
            let p = segments(kind, id, 3)?;
            args = strings(&["network", "vnet", "subnet", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "--vnet-name".into(),
                p[1].clone(),
                "-n".into(),
                p[2].clone(),
                "--address-prefixes".into(),
                input(inputs, "address_prefix")?.to_string(),
            ]);
        }
        S::PublicAddress => {
            let p = segments(kind, id, 2)?;
            args = strings(&["network", "public-ip", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--allocation-method".into(),
                inputs.str_or("allocation", "Static").to_string(),
                "--sku".into(),
                "Standard".into(),
                "--location".into(),
                location,
            ]);
        }
        S::NetworkInterface => {
            let p = segments(kind, id, 2)?;
            let subnet = segments(S::Subnet, input(inputs, "subnet")?, 3)?;
            args = strings(&["network", "nic", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--vnet-name".into(),
                subnet[1].clone(),
                "--subnet".into(),
                subnet[2].clone(),
                "--location".into(),
                location,
            ]);
            if let Some(address) = inputs.str_attr("public_address") {
                args.extend([
                    "--public-ip-address".into(),
                    leaf(S::PublicAddress, address, 2)?,
                ]);
            }
        }
        S::ComputeInstance => {
            let p = segments(kind, id, 2)?;
            let nic = leaf(S::NetworkInterface, input(inputs, "network_interface")?, 2)?;
            args = strings(&["vm", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--image".into(),
                input(inputs, "image")?.to_string(),
                "--admin-username".into(),
                input(inputs, "admin_username")?.to_string(),
                "--nics".into(),
                nic,
                "--location".into(),
                location,
            ]);
            if let Some(size) = inputs.str_attr("size") {
                args.extend(["--size".into(), size.to_string()]);
            }
            match inputs.str_attr("ssh_public_key") {
                Some(key) => args.extend(["--ssh-key-values".into(), key.to_string()]),
                None => args.push("--generate-ssh-keys".into()),
            }
        }
        S::StorageAccount => {
            let p = segments(kind, id, 2)?;
            args = strings(&["storage", "account", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--sku".into(),
                inputs.str_or("sku", "Standard_LRS").to_string(),
                "--location".into(),
                location,
            ]);
        }
        S::BlobContainer => {
            let p = segments(kind, id, 3)?;
            args = strings(&["storage", "container", "create", "--account-name"]);
            args.extend([
                p[1].clone(),
                "-n".into(),
                p[2].clone(),
                "--public-access".into(),
                inputs.str_or("public_access", "off").to_string(),
                "--auth-mode".into(),
                "login".into(),
            ]);
        }
        S::MessageQueue => {
            let p = segments(kind, id, 3)?;
            args = strings(&["storage", "queue", "create", "--account-name"]);
            args.extend([
                p[1].clone(),
                "-n".into(),
                p[2].clone(),
                "--auth-mode".into(),
                "login".into(),
            ]);
        }
        S::KubernetesCluster => {
            let p = segments(kind, id, 2)?;
            args = strings(&["aks", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--node-count".into(),
                display(inputs, "node_count").unwrap_or_else(|| "3".into()),
                "--dns-name-prefix".into(),
                inputs.str_or("dns_prefix", &p[1]).to_string(),
                "--generate-ssh-keys".into(),
                "--location".into(),
                location,
            ]);
            if let Some(size) = inputs.str_attr("node_size") {
                args.extend(["--node-vm-size".into(), size.to_string()]);
            }
            if let Some(version) = inputs.str_attr("version") {
                args.extend(["--kubernetes-version".into(), version.to_string()]);
            }
        }
        S::ContainerRegistry => {
            let p = segments(kind, id, 2)?;
            args = strings(&["acr", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--sku".into(),
                inputs.str_or("sku", "Basic").to_string(),
                "--location".into(),
                location,
            ]);
            if inputs.bool_attr("admin_enabled") == Some(true) {
                args.extend(["--admin-enabled".into(), "true".into()]);
            }
        }
        S::LoadBalancer => {
            let p = segments(kind, id, 2)?;
            let address = leaf(S::PublicAddress, input(inputs, "public_address")?, 2)?;
            args = strings(&["network", "lb", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--sku".into(),
                inputs.str_or("sku", "Standard").to_string(),
                "--public-ip-address".into(),
                address,
                "--location".into(),
                location,
            ]);
        }
        S::ContainerGroup => {
            let p = segments(kind, id, 2)?;
            args = strings(&["container", "create", "-g"]);
            args.extend([
                p[0].clone(),
                "-n".into(),
                p[1].clone(),
                "--image".into(),
                input(inputs, "image")?.to_string(),
                "--cpu".into(),
                display(inputs, "cpu").unwrap_or_else(|| "1".into()),
                "--ports".into(),
                display(inputs, "port").unwrap_or_else(|| "80".into()),
                "--ip-address".into(),
                "Public".into(),
                "--os-type".into(),
                "Linux".into(),
                "--location".into(),
                location,
            ]);
            if let Some(memory) = display(inputs, "memory") {
                args.extend(["--memory".into(), memory]);
            }
        }
        S::DnsZone => {
            let p = segments(kind, id, 2)?;
            args = strings(&["network", "dns", "zone", "create", "-g"]);
            args.extend([p[0].clone(), "-n".into(), p[1].clone()]);
        }
        S::DnsRecord => {
            let p = segments(kind, id, 4)?;
            let (set, verb, flag) = record_type(&p[2])?;
            args = strings(&["network", "dns", "record-set", set, verb, "-g"]);
            args.extend([
                p[0].clone(),
                "-z".into(),
                p[1].clone(),
                "-n".into(),
                p[3].clone(),
                flag.into(),
                input(inputs, "value")?.to_string(),
            ]);
            if verb == "add-record" {
                if let Some(ttl) = display(inputs, "ttl") {
                    args.extend(["--ttl".into(), ttl]);
                }
            }
        }
        other => return Err(AzureError::Unsupported(other)),
    }

    if creates_async(kind) {
        args.push("--no-wait".into());
    }
    Ok(args)
}
