//! Errors raised by the external-service clients (spec.md §4.5).

use thiserror::Error;

use flow_core::EngineError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} returned not found for {resource}")]
    NotFound { service: &'static str, resource: String },

    #[error("{service} rejected the request: {message}")]
    Rejected { service: &'static str, message: String },

    #[error("{service} call failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned a response this client could not decode: {message}")]
    Decode { service: &'static str, message: String },
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound { resource, .. } => EngineError::NotFound(resource),
            ClientError::Rejected { message, .. } => EngineError::Input(message),
            ClientError::Transport { .. } | ClientError::Decode { .. } => {
                EngineError::internal("external service client", err)
            }
        }
    }
}
