//! In-memory [`Driver`] for tests — no Kubernetes, no network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use flow_core::{EngineResult, Pipeline, PipelineConfig, PipelineId, PipelineStatus};

use crate::contract::Driver;

#[derive(Default)]
pub struct FakeDriver {
    deployed: Mutex<HashMap<PipelineId, (Pipeline, PipelineConfig)>>,
    create_calls: Mutex<usize>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operator_count(&self, pipeline_id: PipelineId) -> usize {
        self.deployed
            .lock()
            .unwrap()
            .get(&pipeline_id)
            .map(|(p, _)| p.cloud_operators().count())
            .unwrap_or(0)
    }

    /// The last pipeline snapshot `create_operators` was called with, for
    /// tests that need to inspect what the driver would have deployed.
    pub fn last_created(&self, pipeline_id: PipelineId) -> Option<Pipeline> {
        self.deployed.lock().unwrap().get(&pipeline_id).map(|(p, _)| p.clone())
    }

    /// The `PipelineConfig` passed alongside the last `create_operators` call
    /// for this pipeline.
    pub fn last_config(&self, pipeline_id: PipelineId) -> Option<PipelineConfig> {
        self.deployed.lock().unwrap().get(&pipeline_id).map(|(_, c)| c.clone())
    }

    /// Total number of `create_operators` calls across every pipeline, for
    /// asserting a retry-free happy path or a bounded retry count.
    pub fn create_call_count(&self) -> usize {
        *self.create_calls.lock().unwrap()
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn create_operators(&self, pipeline: &Pipeline, config: &PipelineConfig) -> EngineResult<()> {
        *self.create_calls.lock().unwrap() += 1;
        self.deployed
            .lock()
            .unwrap()
            .insert(pipeline.id, (pipeline.clone(), config.clone()));
        Ok(())
    }

    async fn delete_operators(&self, pipeline_id: PipelineId) -> EngineResult<()> {
        self.deployed.lock().unwrap().remove(&pipeline_id);
        Ok(())
    }

    async fn get_pipeline_status(&self, pipeline_id: PipelineId) -> EngineResult<PipelineStatus> {
        let running = self.deployed.lock().unwrap().contains_key(&pipeline_id);
        Ok(PipelineStatus {
            name: pipeline_id.to_string(),
            running,
            transitioning: false,
            message: String::new(),
        })
    }

    async fn get_pipelines_status(
        &self,
        pipeline_ids: &[PipelineId],
    ) -> EngineResult<HashMap<PipelineId, PipelineStatus>> {
        let mut result = HashMap::new();
        for &id in pipeline_ids {
            result.insert(id, self.get_pipeline_status(id).await?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{FlowId, PipelineConfig};

    fn empty_pipeline() -> Pipeline {
        Pipeline {
            id: PipelineId::new(),
            flow_id: FlowId::from("flow-1"),
            name: String::new(),
            description: String::new(),
            image: String::new(),
            window_time: 0,
            merge_strategy: String::new(),
            consume_all_messages: false,
            metrics: false,
            operators: vec![],
        }
    }

    #[tokio::test]
    async fn create_then_delete_is_idempotent_on_status() {
        let driver = FakeDriver::new();
        let pipeline = empty_pipeline();
        let config = PipelineConfig::from_pipeline(&pipeline, "user-1");

        driver.create_operators(&pipeline, &config).await.unwrap();
        let status = driver.get_pipeline_status(pipeline.id).await.unwrap();
        assert!(status.running);

        driver.delete_operators(pipeline.id).await.unwrap();
        driver.delete_operators(pipeline.id).await.unwrap();
        let status = driver.get_pipeline_status(pipeline.id).await.unwrap();
        assert!(!status.running);
    }
}
