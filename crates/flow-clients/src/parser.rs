//! Flow Parser client (spec.md §4.5) — translates a stored flow graph into
//! the [`ParsedFlow`] shape the translator consumes.

use async_trait::async_trait;
use flow_core::{FlowId, ParsedFlow};

use crate::error::ClientError;

const SERVICE: &str = "parser";

#[async_trait]
pub trait ParserClient: Send + Sync {
    async fn get_pipeline(&self, flow_id: &FlowId, token: &str) -> Result<ParsedFlow, ClientError>;
}

pub struct HttpParserClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpParserClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ParserClient for HttpParserClient {
    async fn get_pipeline(&self, flow_id: &FlowId, token: &str) -> Result<ParsedFlow, ClientError> {
        let url = format!("{}/flow/{flow_id}", self.base_url);
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
                resource: flow_id.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(ClientError::Rejected {
                service: SERVICE,
                message: format!("unexpected status {}", response.status()),
            });
        }

        response
            .json::<ParsedFlow>()
            .await
            .map_err(|e| ClientError::Decode { service: SERVICE, message: e.to_string() })
    }
}
