//! Topic-name assembly.
//!
//! Every call site that needs a topic name goes through one of these three
//! pure functions instead of re-deriving the convention locally — the
//! scattering of this logic across parser/engine/driver in the legacy
//! service is exactly what the design notes call out as worth fixing.

use crate::ids::{OperatorId, PipelineId};

/// Cloud-tier (Kafka) output topic for an operator, keyed only by name.
pub fn cloud_output_topic(name: &str) -> String {
    format!("analytics-{name}")
}

/// Fog-tier (MQTT) output topic for an operator. `pipeline_id` is empty
/// during translation (the pipeline doesn't have an ID yet) and is appended
/// afterwards via [`with_pipeline_suffix`] once the registry assigns one.
pub fn fog_output_topic(name: &str, id: &OperatorId, pipeline_id: &str) -> String {
    format!("fog-{name}-{id}{pipeline_id}")
}

/// Append a pipeline ID to an already-computed topic name. This is a literal
/// suffix, not a path segment — matching the upstream fog-topic convention
/// byte for byte keeps this idempotent with re-reads from the registry.
pub fn with_pipeline_suffix(topic: &str, pipeline_id: PipelineId) -> String {
    format!("{topic}{pipeline_id}")
}

/// Rewrite an `OperatorId`-filtered input topic name to carry the pipeline
/// ID, the invariant that isolates fog topic spaces across pipelines
/// instantiating the same flow on the same device (topic-isolation
/// invariant, spec.md §8 invariant 1).
pub fn operator_input_name_with_pipeline(name: &str, pipeline_id: PipelineId) -> String {
    with_pipeline_suffix(name, pipeline_id)
}
