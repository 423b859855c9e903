//! The Flow Engine: pipeline lifecycle state machine (spec.md §4.1).

use std::sync::Arc;
use std::time::Duration;

use flow_clients::{
    DeviceManagerClient, KafkaMqttBridgeClient, ParserClient, PermissionClient,
    PipelineRegistryClient,
};
use flow_core::{
    add_operator_configs, create_pipeline, finalize_fog_topics, regenerate_missing_application_ids,
    regenerate_missing_output_topics, rotate_application_ids_on_offset_change, EngineError,
    EngineResult, Pipeline, PipelineConfig, PipelineId, PipelineRequest, PipelineStatus,
};
use async_trait::async_trait;
use flow_driver::Driver;
use flow_fog::{FogBridge, StartCommand, SyncRequestSource};

use crate::access::check_access;
use crate::device_rewriter::resolve_device_topics;
use crate::lifecycle::{disable_bridging, enable_bridging, start_command, start_operators, stop_operators};

/// Pipeline deletions are asynchronous from the engine's point of view —
/// this is the fixed, blocking wait `UpdatePipeline`/`DeletePipeline` use
/// to let the cluster observably catch up before resubmitting (spec.md
/// §4.1, §5 "Suspension points").
const QUIESCENCE_WINDOW: Duration = Duration::from_secs(15);

pub struct FlowEngine {
    driver: Arc<dyn Driver>,
    parser: Arc<dyn ParserClient>,
    permission: Arc<dyn PermissionClient>,
    registry: Arc<dyn PipelineRegistryClient>,
    device_manager: Arc<dyn DeviceManagerClient>,
    bridge: Arc<dyn KafkaMqttBridgeClient>,
    fog: FogBridge,
}

impl FlowEngine {
    pub fn new(
        driver: Arc<dyn Driver>,
        parser: Arc<dyn ParserClient>,
        permission: Arc<dyn PermissionClient>,
        registry: Arc<dyn PipelineRegistryClient>,
        device_manager: Arc<dyn DeviceManagerClient>,
        bridge: Arc<dyn KafkaMqttBridgeClient>,
        fog: FogBridge,
    ) -> Self {
        Self {
            driver,
            parser,
            permission,
            registry,
            device_manager,
            bridge,
            fog,
        }
    }

    pub async fn start_pipeline(
        &self,
        request: &PipelineRequest,
        user_id: &str,
        token: &str,
    ) -> EngineResult<Pipeline> {
        check_access(self.permission.as_ref(), self.registry.as_ref(), request, user_id, token).await?;

        let parsed = self.parser.get_pipeline(&request.flow_id, token).await?;
        let skeleton = create_pipeline(&parsed);
        let rewriter = resolve_device_topics(self.device_manager.as_ref(), request, &skeleton, token).await?;
        let operators = add_operator_configs(request, skeleton, &rewriter);

        let mut pipeline = Pipeline {
            id: PipelineId::new(),
            flow_id: parsed.flow_id,
            name: request.name.clone(),
            description: request.description.clone(),
            image: parsed.image,
            window_time: request.window_time,
            merge_strategy: request.merge_strategy.clone(),
            consume_all_messages: request.consume_all_messages,
            metrics: request.metrics,
            operators,
        };

        self.registry.register(&pipeline, user_id).await?;

        finalize_fog_topics(&mut pipeline);
        let config = PipelineConfig::from_pipeline(&pipeline, user_id);

        start_operators(self.driver.as_ref(), &self.fog, &pipeline, &config, user_id).await?;
        enable_bridging(self.bridge.as_ref(), &self.fog, &mut pipeline, user_id).await?;

        if let Err(err) = self.registry.update(&pipeline, user_id).await {
            tracing::warn!(pipeline_id = %pipeline.id, error = %err, "registry update after start failed, pipeline is running but registry is stale");
        }

        Ok(pipeline)
    }

    pub async fn update_pipeline(
        &self,
        request: &PipelineRequest,
        user_id: &str,
        token: &str,
    ) -> EngineResult<Pipeline> {
        check_access(self.permission.as_ref(), self.registry.as_ref(), request, user_id, token).await?;

        let pipeline_id = request
            .id
            .ok_or_else(|| EngineError::Input("update requires an existing pipeline id".to_string()))?;
        let mut existing = self.registry.get(pipeline_id, user_id).await?;
        let previous_consume_all_messages = existing.consume_all_messages;

        let rewriter =
            resolve_device_topics(self.device_manager.as_ref(), request, &existing.operators, token).await?;
        let new_operators = add_operator_configs(request, existing.operators.clone(), &rewriter);

        stop_operators(self.driver.as_ref(), &self.fog, &existing, user_id).await?;
        disable_bridging(self.bridge.as_ref(), &self.fog, &mut existing, user_id).await?;

        tokio::time::sleep(QUIESCENCE_WINDOW).await;

        let mut pipeline = existing;
        pipeline.operators = new_operators;
        pipeline.name = request.name.clone();
        pipeline.description = request.description.clone();
        pipeline.window_time = request.window_time;
        pipeline.merge_strategy = request.merge_strategy.clone();
        pipeline.consume_all_messages = request.consume_all_messages;
        pipeline.metrics = request.metrics;

        regenerate_missing_application_ids(&mut pipeline);
        regenerate_missing_output_topics(&mut pipeline);
        rotate_application_ids_on_offset_change(&mut pipeline, previous_consume_all_messages);
        finalize_fog_topics(&mut pipeline);

        let config = PipelineConfig::from_pipeline(&pipeline, user_id);
        start_operators(self.driver.as_ref(), &self.fog, &pipeline, &config, user_id).await?;
        enable_bridging(self.bridge.as_ref(), &self.fog, &mut pipeline, user_id).await?;

        if let Err(err) = self.registry.update(&pipeline, user_id).await {
            tracing::warn!(pipeline_id = %pipeline.id, error = %err, "registry update after update failed, pipeline is running but registry is stale");
        }

        Ok(pipeline)
    }

    pub async fn delete_pipeline(&self, pipeline_id: PipelineId, user_id: &str, _token: &str) -> EngineResult<()> {
        let mut pipeline = self.registry.get(pipeline_id, user_id).await?;

        stop_operators(self.driver.as_ref(), &self.fog, &pipeline, user_id).await?;
        disable_bridging(self.bridge.as_ref(), &self.fog, &mut pipeline, user_id).await?;

        self.registry.delete(pipeline_id, user_id).await?;
        Ok(())
    }

    pub async fn get_pipeline_status(
        &self,
        pipeline_id: PipelineId,
        user_id: &str,
        _token: &str,
    ) -> EngineResult<PipelineStatus> {
        // Ownership check: a non-owner's lookup surfaces the registry's
        // NotFound rather than leaking whether the pipeline exists at all.
        self.registry.get(pipeline_id, user_id).await?;
        self.driver.get_pipeline_status(pipeline_id).await
    }

    pub async fn get_pipelines_status(
        &self,
        ids: &[String],
        user_id: &str,
        _token: &str,
    ) -> EngineResult<Vec<PipelineStatus>> {
        let owned = self.registry.list(user_id).await?;

        let selected: Vec<PipelineId> = if ids.is_empty() {
            owned.iter().map(|p| p.id).collect()
        } else {
            ids.iter()
                .filter_map(|raw| PipelineId::parse(raw).ok())
                .filter(|id| owned.iter().any(|p| &p.id == id))
                .collect()
        };

        let statuses = self.driver.get_pipelines_status(&selected).await?;

        Ok(selected
            .into_iter()
            .map(|id| {
                statuses.get(&id).cloned().unwrap_or_else(|| PipelineStatus {
                    name: id.to_string(),
                    running: false,
                    transitioning: false,
                    message: "registered but not running".to_string(),
                })
            })
            .collect::<Vec<_>>())
    }
}

/// Answers the fog bridge's sync-request topics directly off the registry
/// (spec.md §4.4, testable scenario S6) — a fog node that reconnects after
/// being offline asks "what should be running for me" and gets back exactly
/// the start commands for its currently registered local operators.
#[async_trait]
impl SyncRequestSource for FlowEngine {
    async fn active_fog_operators(&self, user_id: &str) -> Vec<StartCommand> {
        let Ok(pipelines) = self.registry.list(user_id).await else {
            return Vec::new();
        };
        pipelines
            .iter()
            .flat_map(|pipeline| pipeline.local_operators().map(move |op| start_command(pipeline, op)))
            .collect()
    }

    async fn upstream_enabled_topics(&self, user_id: &str) -> Vec<String> {
        let Ok(pipelines) = self.registry.list(user_id).await else {
            return Vec::new();
        };
        pipelines
            .iter()
            .flat_map(|pipeline| pipeline.local_operators())
            .filter(|op| op.upstream_config.enabled)
            .map(|op| op.output_topic.clone())
            .collect()
    }
}
