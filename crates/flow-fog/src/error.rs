use thiserror::Error;

use flow_core::EngineError;

#[derive(Debug, Error)]
pub enum FogError {
    #[error("mqtt publish failed: {0}")]
    Publish(#[from] rumqttc::ClientError),

    #[error("mqtt message could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<FogError> for EngineError {
    fn from(err: FogError) -> Self {
        EngineError::internal("fog bridge", err)
    }
}
