//! Pipeline Registry client (spec.md §4.5) — the system of record for
//! pipeline metadata. The Flow Engine is the only writer but not the only
//! reader, so every write here happens *after* the cluster/fog side has
//! already taken effect; a failure here is logged and swallowed by the
//! engine rather than rolled back (spec.md §9 open question).

use async_trait::async_trait;
use flow_core::{Pipeline, PipelineId};

use crate::error::ClientError;

const SERVICE: &str = "pipeline-registry";

#[async_trait]
pub trait PipelineRegistryClient: Send + Sync {
    async fn register(&self, pipeline: &Pipeline, user_id: &str) -> Result<(), ClientError>;
    async fn update(&self, pipeline: &Pipeline, user_id: &str) -> Result<(), ClientError>;
    async fn get(&self, pipeline_id: PipelineId, user_id: &str) -> Result<Pipeline, ClientError>;
    async fn list(&self, user_id: &str) -> Result<Vec<Pipeline>, ClientError>;
    async fn delete(&self, pipeline_id: PipelineId, user_id: &str) -> Result<(), ClientError>;
}

pub struct HttpPipelineRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPipelineRegistryClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn pipeline_url(&self, pipeline_id: PipelineId) -> String {
        format!("{}/pipeline/{pipeline_id}", self.base_url)
    }
}

async fn check_status(service: &'static str, resource: String, response: &reqwest::Response) -> Result<(), ClientError> {
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound { service, resource });
    }
    if !response.status().is_success() {
        return Err(ClientError::Rejected {
            service,
            message: format!("unexpected status {}", response.status()),
        });
    }
    Ok(())
}

#[async_trait]
impl PipelineRegistryClient for HttpPipelineRegistryClient {
    async fn register(&self, pipeline: &Pipeline, user_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{}/pipeline", self.base_url))
            .header("X-UserId", user_id)
            .json(pipeline)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;
        check_status(SERVICE, pipeline.id.to_string(), &response).await
    }

    async fn update(&self, pipeline: &Pipeline, user_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .put(self.pipeline_url(pipeline.id))
            .header("X-UserId", user_id)
            .json(pipeline)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;
        check_status(SERVICE, pipeline.id.to_string(), &response).await
    }

    async fn get(&self, pipeline_id: PipelineId, user_id: &str) -> Result<Pipeline, ClientError> {
        let response = self
            .client
            .get(self.pipeline_url(pipeline_id))
            .header("X-UserId", user_id)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;
        check_status(SERVICE, pipeline_id.to_string(), &response).await?;
        response
            .json::<Pipeline>()
            .await
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })
    }

    async fn list(&self, user_id: &str) -> Result<Vec<Pipeline>, ClientError> {
        let response = self
            .client
            .get(format!("{}/pipelines", self.base_url))
            .header("X-UserId", user_id)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;
        check_status(SERVICE, user_id.to_string(), &response).await?;
        response
            .json::<Vec<Pipeline>>()
            .await
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })
    }

    async fn delete(&self, pipeline_id: PipelineId, user_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.pipeline_url(pipeline_id))
            .header("X-UserId", user_id)
            .send()
            .await
            .map_err(|source| ClientError::Transport { service: SERVICE, source })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(SERVICE, pipeline_id.to_string(), &response).await
    }
}
