//! Wire and domain types for pipelines, operators and their bindings.
//!
//! Field names use `serde(rename_all = "camelCase")` throughout because the
//! HTTP and registry JSON payloads this engine exchanges with its
//! collaborators are camelCase, matching spec.md §3.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ApplicationId, FlowId, OperatorId, PipelineId};

/// Catalog image family a concrete [`Operator`] was instantiated from.
/// Distinct from [`OperatorId`] (the per-node identity) even though both are
/// opaque strings on the wire — conflating the two is the exact bug the
/// design notes ask us to make impossible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogId(pub String);

impl From<&str> for CatalogId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
impl From<String> for CatalogId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
impl std::fmt::Display for CatalogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    Cloud,
    Local,
}

impl DeploymentType {
    pub fn is_local(self) -> bool {
        matches!(self, DeploymentType::Local)
    }

    pub fn is_cloud(self) -> bool {
        matches!(self, DeploymentType::Cloud)
    }
}

/// Filter types a subscription can be scoped by. The request DTO sends these
/// in mixed case (`"deviceId"`, `"operatorId"`, `"ImportId"`); the translator
/// canonicalises to this representation before it ever reaches an
/// [`InputTopic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    DeviceId,
    OperatorId,
    ImportId,
}

impl FilterType {
    /// Canonicalise a request-supplied filter type string (case-insensitive,
    /// historically inconsistent: `"deviceId"`, `"operatorId"`, `"ImportId"`).
    pub fn from_request_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "operatorid" => FilterType::OperatorId,
            "importid" => FilterType::ImportId,
            _ => FilterType::DeviceId,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTopic {
    pub name: String,
    pub filter_type: FilterType,
    pub filter_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_value2: Option<String>,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownstreamConfig {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: OperatorId,
    pub application_id: ApplicationId,
    pub name: String,
    pub operator_id: CatalogId,
    pub image_id: String,
    pub deployment_type: DeploymentType,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub output_topic: String,
    #[serde(default)]
    pub persist_data: bool,
    #[serde(default)]
    pub input_topics: Vec<InputTopic>,
    #[serde(default)]
    pub input_selections: Vec<serde_json::Value>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub upstream_config: UpstreamConfig,
    #[serde(default)]
    pub downstream_config: DownstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: PipelineId,
    pub flow_id: FlowId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    pub window_time: i64,
    pub merge_strategy: String,
    #[serde(default)]
    pub consume_all_messages: bool,
    #[serde(default)]
    pub metrics: bool,
    #[serde(default)]
    pub operators: Vec<Operator>,
}

impl Pipeline {
    pub fn local_operators(&self) -> impl Iterator<Item = &Operator> {
        self.operators.iter().filter(|o| o.deployment_type.is_local())
    }

    pub fn cloud_operators(&self) -> impl Iterator<Item = &Operator> {
        self.operators.iter().filter(|o| o.deployment_type.is_cloud())
    }
}

// ---------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeValue {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    pub filter_type: String,
    #[serde(default)]
    pub filter_ids: String,
    #[serde(default)]
    pub topic_name: String,
    #[serde(default)]
    pub values: Vec<NodeValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNode {
    pub node_id: OperatorId,
    #[serde(default)]
    pub inputs: Vec<NodeInput>,
    #[serde(default)]
    pub config: Vec<NodeConfig>,
    #[serde(default)]
    pub input_selections: Vec<serde_json::Value>,
    #[serde(default)]
    pub persist_data: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    /// Only set on `UpdatePipeline`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PipelineId>,
    pub flow_id: FlowId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub window_time: i64,
    #[serde(default)]
    pub merge_strategy: String,
    #[serde(default)]
    pub consume_all_messages: bool,
    #[serde(default)]
    pub metrics: bool,
    #[serde(default)]
    pub nodes: Vec<PipelineNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatusRequest {
    #[serde(default)]
    pub ids: Vec<String>,
}

// ---------------------------------------------------------------------
// Runtime / driver-facing types
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerOffset {
    Latest,
    Earliest,
}

impl std::fmt::Display for ConsumerOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsumerOffset::Latest => write!(f, "latest"),
            ConsumerOffset::Earliest => write!(f, "earliest"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub window_time: i64,
    pub merge_strategy: String,
    pub metrics: bool,
    pub consumer_offset: ConsumerOffset,
    pub flow_id: FlowId,
    pub pipeline_id: PipelineId,
    pub user_id: String,
}

impl PipelineConfig {
    pub fn from_pipeline(pipeline: &Pipeline, user_id: impl Into<String>) -> Self {
        PipelineConfig {
            window_time: pipeline.window_time,
            merge_strategy: pipeline.merge_strategy.clone(),
            metrics: pipeline.metrics,
            consumer_offset: if pipeline.consume_all_messages {
                ConsumerOffset::Earliest
            } else {
                ConsumerOffset::Latest
            },
            flow_id: pipeline.flow_id.clone(),
            pipeline_id: pipeline.id,
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    #[serde(default)]
    pub name: String,
    pub running: bool,
    pub transitioning: bool,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------
// Parser output (upstream collaborator's shape, consumed read-only)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInputTopic {
    pub topic_name: String,
    pub filter_type: FilterType,
    pub filter_value: String,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedOperator {
    pub id: OperatorId,
    pub name: String,
    pub operator_id: CatalogId,
    pub image_id: String,
    pub deployment_type: DeploymentType,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub upstream_config: UpstreamConfig,
    #[serde(default)]
    pub downstream_config: DownstreamConfig,
    #[serde(default)]
    pub input_topics: Vec<ParsedInputTopic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFlow {
    pub flow_id: FlowId,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub operators: Vec<ParsedOperator>,
}
