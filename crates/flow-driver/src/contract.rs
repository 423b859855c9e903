//! Cluster driver contract (spec.md §4.3).
//!
//! One trait, one production implementation (Kubernetes), one in-memory
//! fake for tests — the design notes are explicit that this boundary should
//! not grow a second production backend until one is actually needed.

use std::collections::HashMap;

use async_trait::async_trait;
use flow_core::{EngineResult, Pipeline, PipelineConfig, PipelineId, PipelineStatus};

#[async_trait]
pub trait Driver: Send + Sync {
    /// Create (or reconcile) the cloud-tier workloads for every cloud
    /// operator in `pipeline`. Idempotent: an already-existing workload with
    /// the same deterministic name is treated as success, not a conflict.
    async fn create_operators(&self, pipeline: &Pipeline, config: &PipelineConfig) -> EngineResult<()>;

    /// Tear down every cloud-tier workload for `pipeline_id`. Idempotent:
    /// workloads that are already gone are treated as success
    /// ([`flow_core::EngineError::is_benign_during_teardown`]).
    async fn delete_operators(&self, pipeline_id: PipelineId) -> EngineResult<()>;

    async fn get_pipeline_status(&self, pipeline_id: PipelineId) -> EngineResult<PipelineStatus>;

    async fn get_pipelines_status(
        &self,
        pipeline_ids: &[PipelineId],
    ) -> EngineResult<HashMap<PipelineId, PipelineStatus>>;
}
