//! Kafka↔MQTT Bridge client (spec.md §4.5) — provisions the bridged
//! instance that forwards a cloud operator's Kafka output onto the MQTT fog
//! broker when its `downstreamConfig.enabled` flag is set.

use async_trait::async_trait;
use flow_core::{OperatorId, PipelineId};

use crate::error::ClientError;

const SERVICE: &str = "kafka2mqtt-bridge";

#[async_trait]
pub trait KafkaMqttBridgeClient: Send + Sync {
    async fn create_instance(
        &self,
        pipeline_id: PipelineId,
        operator_id: &OperatorId,
        source_topic: &str,
    ) -> Result<String, ClientError>;

    async fn delete_instance(&self, instance_id: &str) -> Result<(), ClientError>;
}

pub struct HttpKafkaMqttBridgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpKafkaMqttBridgeClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct CreateInstanceRequest<'a> {
    pipeline_id: String,
    operator_id: &'a str,
    source_topic: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct CreateInstanceResponse {
    id: String,
}

#[async_trait]
impl KafkaMqttBridgeClient for HttpKafkaMqttBridgeClient {
    async fn create_instance(
        &self,
        pipeline_id: PipelineId,
        operator_id: &OperatorId,
        source_topic: &str,
    ) -> Result<String, ClientError> {
        let body = CreateInstanceRequest {
            pipeline_id: pipeline_id.to_string(),
            operator_id: &operator_id.0,
            source_topic,
        };
        let response = self
            .client
            .post(format!("{}/instances", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;

        if !response.status().is_success() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: format!("unexpected status {}", response.status()),
            });
        }

        response
            .json::<CreateInstanceResponse>()
            .await
            .map(|r| r.id)
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })
    }

    async fn delete_instance(&self, instance_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(format!("{}/instances/{instance_id}", self.base_url))
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: format!("unexpected status {}", response.status()),
            });
        }
        Ok(())
    }
}
