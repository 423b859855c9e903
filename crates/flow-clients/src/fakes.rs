//! In-memory fakes for the external-service client contracts — no network,
//! for use in `flow-engine`'s integration tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use flow_core::{FlowId, ParsedFlow, Pipeline, PipelineId};

use crate::bridge::KafkaMqttBridgeClient;
use crate::device_manager::{DeviceManagerClient, ServiceMetadata};
use crate::error::ClientError;
use crate::parser::ParserClient;
use crate::permission::PermissionClient;
use crate::registry::PipelineRegistryClient;

#[derive(Default)]
pub struct FakeParserClient {
    flows: Mutex<HashMap<FlowId, ParsedFlow>>,
}

impl FakeParserClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flow(self, flow: ParsedFlow) -> Self {
        self.flows.lock().unwrap().insert(flow.flow_id.clone(), flow);
        self
    }
}

#[async_trait]
impl ParserClient for FakeParserClient {
    async fn get_pipeline(&self, flow_id: &FlowId, _token: &str) -> Result<ParsedFlow, ClientError> {
        self.flows
            .lock()
            .unwrap()
            .get(flow_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                service: "parser",
                resource: flow_id.to_string(),
            })
    }
}

/// Always grants access unless constructed with `deny()`.
pub struct FakePermissionClient {
    grant: bool,
}

impl FakePermissionClient {
    pub fn allow_all() -> Self {
        Self { grant: true }
    }

    pub fn deny_all() -> Self {
        Self { grant: false }
    }
}

#[async_trait]
impl PermissionClient for FakePermissionClient {
    async fn user_has_devices_read_access(&self, _device_ids: &[String], _token: &str) -> Result<bool, ClientError> {
        Ok(self.grant)
    }
}

#[derive(Default)]
pub struct FakePipelineRegistryClient {
    pipelines: Mutex<HashMap<PipelineId, Pipeline>>,
}

impl FakePipelineRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineRegistryClient for FakePipelineRegistryClient {
    async fn register(&self, pipeline: &Pipeline, _user_id: &str) -> Result<(), ClientError> {
        self.pipelines.lock().unwrap().insert(pipeline.id, pipeline.clone());
        Ok(())
    }

    async fn update(&self, pipeline: &Pipeline, _user_id: &str) -> Result<(), ClientError> {
        self.pipelines.lock().unwrap().insert(pipeline.id, pipeline.clone());
        Ok(())
    }

    async fn get(&self, pipeline_id: PipelineId, _user_id: &str) -> Result<Pipeline, ClientError> {
        self.pipelines
            .lock()
            .unwrap()
            .get(&pipeline_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound {
                service: "pipeline-registry",
                resource: pipeline_id.to_string(),
            })
    }

    async fn list(&self, _user_id: &str) -> Result<Vec<Pipeline>, ClientError> {
        Ok(self.pipelines.lock().unwrap().values().cloned().collect())
    }

    async fn delete(&self, pipeline_id: PipelineId, _user_id: &str) -> Result<(), ClientError> {
        self.pipelines.lock().unwrap().remove(&pipeline_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDeviceManagerClient;

#[async_trait]
impl DeviceManagerClient for FakeDeviceManagerClient {
    async fn get_service_metadata(
        &self,
        _device_id: &str,
        service_id: &str,
        _token: &str,
    ) -> Result<ServiceMetadata, ClientError> {
        Ok(ServiceMetadata {
            local_topic: service_id.to_string(),
            envelope_depth: 2,
        })
    }
}

#[derive(Default)]
pub struct FakeKafkaMqttBridgeClient {
    next_id: Mutex<u64>,
}

#[async_trait]
impl KafkaMqttBridgeClient for FakeKafkaMqttBridgeClient {
    async fn create_instance(
        &self,
        _pipeline_id: PipelineId,
        _operator_id: &flow_core::OperatorId,
        _source_topic: &str,
    ) -> Result<String, ClientError> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        Ok(format!("bridge-instance-{next_id}"))
    }

    async fn delete_instance(&self, _instance_id: &str) -> Result<(), ClientError> {
        Ok(())
    }
}
