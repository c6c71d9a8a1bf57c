//! Command context: definition, project root, state and dispatchers

use anyhow::{Context as _, bail};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stratus_core::{Definition, ResourceDecl};
use stratus_engine::{
    Backend, BackendAdapter, BackendCapability, Dispatcher, MemoryBackend, StateManager,
    StoredResource,
};

pub struct Context {
    pub definition: Definition,
    pub definition_path: PathBuf,
    pub root: PathBuf,
    pub state: StateManager,
}

impl Context {
    /// Locate and parse the definition file
    pub fn load(config: Option<&Path>) -> anyhow::Result<Self> {
        let definition_path = match config {
            Some(path) => path.to_path_buf(),
            None => stratus_config::find_definition_file()?,
        };
        tracing::debug!("Definition file: {}", definition_path.display());

        let definition = stratus_core::parse_definition_file(&definition_path)
            .with_context(|| format!("failed to load {}", definition_path.display()))?;
        let root = stratus_config::project_root(&definition_path);
        let state = StateManager::new(&root);

        Ok(Self {
            definition,
            definition_path,
            root,
            state,
        })
    }

    /// Declared resources, optionally narrowed to one
    pub fn select(&self, filter: Option<&str>) -> anyhow::Result<Vec<&ResourceDecl>> {
        let selected: Vec<&ResourceDecl> = self
            .definition
            .resources
            .iter()
            .filter(|decl| filter.is_none_or(|f| matches_filter(&decl.key(), &decl.name, f)))
            .collect();

        if let Some(filter) = filter
            && selected.is_empty()
        {
            bail!("resource '{}' is not declared", filter);
        }
        Ok(selected)
    }

    /// Backends the declared resources use
    pub fn declared_backends(&self) -> anyhow::Result<BTreeSet<Backend>> {
        self.definition
            .used_backends()
            .iter()
            .map(|tag| Backend::parse(tag).map_err(anyhow::Error::from))
            .collect()
    }

    /// Dispatcher over in-memory backends carrying each adapter's capability
    pub fn simulated_dispatcher(&self, backends: &BTreeSet<Backend>) -> anyhow::Result<Dispatcher> {
        let mut builder = Dispatcher::builder().poll_config(self.definition.engine.poll_config());
        for backend in backends {
            let memory = MemoryBackend::new(backend.tag()).with_capability(capability(*backend)?);
            builder = builder.register(*backend, Arc::new(memory));
        }
        Ok(builder.build())
    }

    /// Dispatcher over the real adapters
    pub async fn live_dispatcher(&self, backends: &BTreeSet<Backend>) -> anyhow::Result<Dispatcher> {
        let mut builder = Dispatcher::builder().poll_config(self.definition.engine.poll_config());
        for backend in backends {
            let adapter = self.live_adapter(*backend).await?;
            builder = builder.register(*backend, adapter);
        }
        Ok(builder.build())
    }

    fn setting(&self, backend: Backend, key: &str) -> Option<String> {
        self.definition
            .backend(backend.tag())
            .and_then(|b| b.get(key))
            .map(str::to_string)
    }

    async fn live_adapter(&self, backend: Backend) -> anyhow::Result<Arc<dyn BackendAdapter>> {
        match backend {
            Backend::Aws => self.aws_adapter().await,
            Backend::Azure => {
                let mut settings = stratus_azure::AzureSettings::from_env();
                if let Some(subscription) = self.setting(backend, "subscription") {
                    settings.subscription = Some(subscription);
                }
                if let Some(location) = self.setting(backend, "location") {
                    settings.location = location;
                }
                let adapter = stratus_azure::AzureAdapter::new(settings);
                adapter
                    .check_auth()
                    .await
                    .context("Azure CLI is not logged in (run `az login`)")?;
                Ok(Arc::new(adapter))
            }
            Backend::Gcp => {
                let project = match self.setting(backend, "project") {
                    Some(project) => project,
                    None => std::env::var("GOOGLE_CLOUD_PROJECT")
                        .or_else(|_| std::env::var("CLOUDSDK_CORE_PROJECT"))
                        .context("no GCP project: set `project` in the gcp backend block or GOOGLE_CLOUD_PROJECT")?,
                };
                let access_token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
                    .context("GOOGLE_OAUTH_ACCESS_TOKEN is not set")?;
                Ok(Arc::new(stratus_gcp::GcpAdapter::new(
                    stratus_gcp::GcpSettings {
                        project,
                        access_token,
                    },
                )))
            }
        }
    }

    #[cfg(feature = "aws")]
    async fn aws_adapter(&self) -> anyhow::Result<Arc<dyn BackendAdapter>> {
        let mut settings = stratus_aws::AwsSettings::from_env();
        if let Some(region) = self.setting(Backend::Aws, "region") {
            settings.region = Some(region);
        }
        Ok(Arc::new(stratus_aws::AwsAdapter::new(settings).await))
    }

    #[cfg(not(feature = "aws"))]
    async fn aws_adapter(&self) -> anyhow::Result<Arc<dyn BackendAdapter>> {
        bail!("stratus was built without the `aws` feature")
    }
}

/// Capability of the real adapter for a backend
pub fn capability(backend: Backend) -> anyhow::Result<BackendCapability> {
    Ok(match backend {
        Backend::Aws => aws_capability()?,
        Backend::Azure => stratus_azure::capability(),
        Backend::Gcp => stratus_gcp::capability(),
    })
}

#[cfg(feature = "aws")]
fn aws_capability() -> anyhow::Result<BackendCapability> {
    Ok(stratus_aws::capability())
}

#[cfg(not(feature = "aws"))]
fn aws_capability() -> anyhow::Result<BackendCapability> {
    bail!("stratus was built without the `aws` feature")
}

/// Backend a stored record was provisioned on
pub fn stored_backend(stored: &StoredResource) -> anyhow::Result<Backend> {
    let tag = stored
        .record
        .backend_tag()
        .context("stored record has no backend tag")?;
    Ok(Backend::parse(tag)?)
}

/// Resource name part of a `kind:name` state key
pub fn key_name(key: &str) -> &str {
    key.split_once(':').map_or(key, |(_, name)| name)
}

/// `kind:name` matches exactly; a bare name matches any kind
pub fn matches_filter(key: &str, name: &str, filter: &str) -> bool {
    if filter.contains(':') {
        key == filter
    } else {
        name == filter
    }
}
