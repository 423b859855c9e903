//! Core types, errors, and pure pipeline-translation logic for the flow
//! engine. No I/O lives here — collaborators that talk to Kubernetes, MQTT,
//! or the registry sit in `flow-driver`, `flow-fog` and `flow-clients`, and
//! call back into this crate for the shapes and the translation rules.

pub mod error;
pub mod ids;
pub mod model;
pub mod topics;
pub mod translator;

pub use error::{EngineError, EngineResult};
pub use ids::{ApplicationId, FlowId, OperatorId, PipelineId};
pub use model::{
    CatalogId, ConsumerOffset, DeploymentType, DownstreamConfig, FilterType, InputTopic, Mapping,
    NodeConfig, NodeInput, NodeValue, Operator, ParsedFlow, ParsedInputTopic, ParsedOperator,
    Pipeline, PipelineConfig, PipelineNode, PipelineRequest, PipelineStatus,
    PipelineStatusRequest, UpstreamConfig,
};
pub use translator::{
    add_operator_configs, create_pipeline, finalize_fog_topics, regenerate_missing_application_ids,
    regenerate_missing_output_topics, rotate_application_ids_on_offset_change,
    strip_platform_envelope, DeviceTopicRewriter, IdentityDeviceTopicRewriter,
};
