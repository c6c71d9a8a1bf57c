//! az CLI wrapper

use crate::commands;
use crate::error::{AzureError, Result};
use stratus_engine::SubResourceKind;
use std::process::Stdio;
use tokio::process::Command;

/// az CLI wrapper bound to an optional subscription
#[derive(Debug, Clone, Default)]
pub struct Az {
    subscription: Option<String>,
}

impl Az {
    pub fn new(subscription: Option<String>) -> Self {
        Self { subscription }
    }

    /// Check that az is installed and logged in
    pub async fn check_auth(&self) -> Result<serde_json::Value> {
        let which = Command::new("which").arg("az").output().await?;
        if !which.status.success() {
            return Err(AzureError::AzNotFound);
        }

        let output = self.run_command(&["account".into(), "show".into()]).await?;
        Ok(serde_json::from_str(&output)?)
    }

    /// Run an az command and return stdout
    async fn run_command(&self, args: &[String]) -> Result<String> {
        let mut cmd = Command::new("az");
        cmd.args(args);
        if let Some(subscription) = &self.subscription {
            cmd.arg("--subscription").arg(subscription);
        }
        cmd.arg("-o").arg("json");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: az {}", args.join(" "));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AzureError::AzNotFound,
            _ => AzureError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AzureError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn parse(output: &str) -> Result<serde_json::Value> {
        if output.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(output)?)
    }

    /// Create a sub-resource and return az's JSON output
    pub async fn create(&self, args: &[String]) -> Result<serde_json::Value> {
        let output = self.run_command(args).await?;
        Self::parse(&output)
    }

    /// Show a sub-resource; `None` when it does not exist
    pub async fn show(&self, kind: SubResourceKind, id: &str) -> Result<Option<serde_json::Value>> {
        let args = commands::show_args(kind, id)?;
        match self.run_command(&args).await {
            Ok(output) => {
                let value = Self::parse(&output)?;
                if commands::is_data_plane(kind) {
                    let exists = value
                        .get("exists")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);
                    return Ok(exists.then_some(value));
                }
                Ok(Some(value))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a sub-resource
    pub async fn delete(&self, kind: SubResourceKind, id: &str) -> Result<()> {
        let args = commands::delete_args(kind, id)?;
        match self.run_command(&args).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(AzureError::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }
}
