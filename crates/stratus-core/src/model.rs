//! Definition model
//!
//! A definition file declares engine settings, per-backend settings and the
//! resources to provision.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use stratus_engine::{Attributes, PollConfig, ResourceKind, ResourceSpec};

/// Parsed definition file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Project name (`project` node, or the directory name)
    pub name: String,

    pub engine: EngineSettings,

    /// Backend settings keyed by canonical backend tag
    pub backends: BTreeMap<String, BackendSettings>,

    /// Resources in declaration order
    pub resources: Vec<ResourceDecl>,
}

impl Definition {
    pub fn resource(&self, kind: ResourceKind, name: &str) -> Option<&ResourceDecl> {
        self.resources
            .iter()
            .find(|r| r.kind == kind && r.name == name)
    }

    /// Settings declared for a backend tag
    pub fn backend(&self, tag: &str) -> Option<&BackendSettings> {
        self.backends.get(tag)
    }

    /// Canonical tags of the backends the resources use
    pub fn used_backends(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.resources.iter().map(|r| r.backend.clone()).collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

/// `engine { ... }` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let poll = PollConfig::default();
        Self {
            poll_interval: poll.interval,
            timeout: poll.timeout,
        }
    }
}

impl EngineSettings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig::new(self.poll_interval, self.timeout)
    }
}

/// `backend "<tag>" { ... }` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Canonical backend tag
    pub tag: String,

    /// Flat settings (`region`, `location`, `subscription`, `project`, ...)
    pub settings: BTreeMap<String, String>,
}

impl BackendSettings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// `resource "<kind>" "<name>" { ... }` block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDecl {
    pub kind: ResourceKind,
    pub name: String,

    /// Declared backend tag, as written
    pub backend: String,

    /// Declared attributes with snake_case keys
    pub attributes: Attributes,
}

impl ResourceDecl {
    /// Declaration handed to the engine; `name` is always set
    pub fn to_spec(&self) -> ResourceSpec {
        let mut attributes = self.attributes.clone();
        attributes.insert("name".to_string(), self.name.clone().into());
        ResourceSpec {
            backend: self.backend.clone(),
            attributes,
        }
    }

    /// State key of the resource
    pub fn key(&self) -> String {
        stratus_engine::state::state_key(self.kind, &self.name)
    }
}
