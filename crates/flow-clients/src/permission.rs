//! Permission-search client (spec.md §4.5) — backs the device-read-access
//! check the engine performs before accepting a pipeline request that
//! references device inputs.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClientError;

const SERVICE: &str = "permission-search";

#[async_trait]
pub trait PermissionClient: Send + Sync {
    /// `true` iff the calling user holds read access to every device ID.
    async fn user_has_devices_read_access(
        &self,
        device_ids: &[String],
        token: &str,
    ) -> Result<bool, ClientError>;
}

pub struct HttpPermissionClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPermissionClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessResult {
    #[serde(default)]
    result: Vec<bool>,
}

#[async_trait]
impl PermissionClient for HttpPermissionClient {
    async fn user_has_devices_read_access(
        &self,
        device_ids: &[String],
        token: &str,
    ) -> Result<bool, ClientError> {
        if device_ids.is_empty() {
            return Ok(true);
        }

        let url = format!("{}/v3/resources/devices/access", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "ids": device_ids, "rights": "r" }))
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;

        if !response.status().is_success() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: format!("unexpected status {}", response.status()),
            });
        }

        let parsed: AccessResult = response
            .json()
            .await
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })?;

        Ok(!parsed.result.is_empty() && parsed.result.iter().all(|&ok| ok))
    }
}
