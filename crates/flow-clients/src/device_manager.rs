//! Device Manager client (spec.md §4.2, §4.5) — supplies the device-type
//! service metadata the translator needs to rewrite local-operator input
//! topics and strip the platform envelope from value-mapping paths.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClientError;

const SERVICE: &str = "device-manager";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceMetadata {
    /// Local-broker topic the device's gateway publishes this service on.
    pub local_topic: String,
    /// Number of leading dotted segments the platform envelope occupies in
    /// this service's payload shape.
    #[serde(default = "default_envelope_depth")]
    pub envelope_depth: usize,
}

fn default_envelope_depth() -> usize {
    2
}

#[async_trait]
pub trait DeviceManagerClient: Send + Sync {
    async fn get_service_metadata(
        &self,
        device_id: &str,
        service_id: &str,
        token: &str,
    ) -> Result<ServiceMetadata, ClientError>;
}

pub struct HttpDeviceManagerClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceManagerClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DeviceManagerClient for HttpDeviceManagerClient {
    async fn get_service_metadata(
        &self,
        device_id: &str,
        service_id: &str,
        token: &str,
    ) -> Result<ServiceMetadata, ClientError> {
        let url = format!(
            "{}/devices/{device_id}/services/{service_id}",
            self.base_url
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                service: SERVICE,
                resource: format!("{device_id}/{service_id}"),
            });
        }
        if !response.status().is_success() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: format!("unexpected status {}", response.status()),
            });
        }

        response
            .json::<ServiceMetadata>()
            .await
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })
    }
}
