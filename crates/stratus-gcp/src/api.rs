//! Google Cloud REST client
//!
//! Bearer-token client for the Compute, Storage, Cloud DNS and Secret
//! Manager APIs.

use crate::error::{GcpError, Result};
use crate::requests::ApiCall;
use serde::Deserialize;
use serde_json::Value;

/// REST client shared by the adapter and its operation probes
#[derive(Clone)]
pub struct GcpApi {
    client: reqwest::Client,
    access_token: String,
}

impl GcpApi {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
        }
    }

    /// Send a call and return the JSON body (`Null` when empty)
    pub async fn send(&self, call: &ApiCall) -> Result<Value> {
        tracing::debug!("{} {}", call.method, call.url);

        let mut request = self
            .client
            .request(call.method.clone(), &call.url)
            .bearer_auth(&self.access_token);
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|r| r.error.message)
                .unwrap_or(text);
            return Err(GcpError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch a resource; `None` on 404
    pub async fn get(&self, call: &ApiCall) -> Result<Option<Value>> {
        match self.send(call).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch a Compute Engine operation by its self link
    pub async fn operation(&self, self_link: &str) -> Result<Operation> {
        let call = ApiCall {
            method: reqwest::Method::GET,
            url: self_link.to_string(),
            body: None,
        };
        Ok(serde_json::from_value(self.send(&call).await?)?)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Compute Engine long-running operation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,

    /// `PENDING`, `RUNNING` or `DONE`
    pub status: String,

    pub self_link: String,

    #[serde(default)]
    pub error: Option<OperationErrors>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl Operation {
    pub fn is_done(&self) -> bool {
        self.status == "DONE"
    }

    /// Error summary of a finished operation, if it failed
    pub fn failure(&self) -> Option<String> {
        let errors = &self.error.as_ref()?.errors;
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
