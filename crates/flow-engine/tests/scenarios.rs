//! End-to-end lifecycle scenarios against in-memory fakes (spec.md §8,
//! scenarios S1-S6). No network, no cluster: every external collaborator is
//! a `Fake*` double except [`flow_fog::FogBridge`], whose publishes only
//! enqueue onto an internal channel and never touch the network unless its
//! event loop is polled — which none of these tests do.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flow_clients::{
    FakeDeviceManagerClient, FakeKafkaMqttBridgeClient, FakeParserClient, FakePermissionClient,
    FakePipelineRegistryClient, PipelineRegistryClient,
};
use flow_core::{
    ConsumerOffset, DeploymentType, DownstreamConfig, EngineError, EngineResult, FilterType, NodeInput,
    NodeValue, ParsedFlow, ParsedInputTopic, ParsedOperator, Pipeline, PipelineConfig, PipelineId,
    PipelineNode, PipelineRequest, PipelineStatus, UpstreamConfig,
};
use flow_driver::{Driver, FakeDriver};
use flow_engine::FlowEngine;
use flow_fog::{FogBridge, SyncRequestSource};
use rumqttc::MqttOptions;

fn fog_bridge() -> FogBridge {
    let options = MqttOptions::new("flow-engine-test", "localhost", 1883);
    FogBridge::connect(options, 64).0
}

const USER: &str = "user-1";
const TOKEN: &str = "token";

/// One cloud operator "sum" (`id=A`, `operatorId=op1`), as S1 sets up.
fn s1_parsed_flow() -> ParsedFlow {
    ParsedFlow {
        flow_id: "flow-s1".into(),
        image: String::new(),
        operators: vec![ParsedOperator {
            id: "A".into(),
            name: "sum".into(),
            operator_id: "op1".into(),
            image_id: "registry/sum:1".into(),
            deployment_type: DeploymentType::Cloud,
            cost: 1.0,
            upstream_config: UpstreamConfig::default(),
            downstream_config: DownstreamConfig::default(),
            input_topics: vec![],
        }],
    }
}

fn s1_request() -> PipelineRequest {
    PipelineRequest {
        flow_id: "flow-s1".into(),
        name: "sum-pipeline".into(),
        nodes: vec![PipelineNode {
            node_id: "A".into(),
            inputs: vec![NodeInput {
                filter_type: "deviceId".into(),
                filter_ids: "D1".into(),
                topic_name: "svc1".into(),
                values: vec![NodeValue {
                    name: "v".into(),
                    path: "value.root.x".into(),
                }],
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

struct Harness {
    engine: FlowEngine,
    driver: Arc<FakeDriver>,
    registry: Arc<FakePipelineRegistryClient>,
}

fn harness_with_flow(parsed: ParsedFlow) -> Harness {
    let driver = Arc::new(FakeDriver::new());
    let registry = Arc::new(FakePipelineRegistryClient::new());
    let engine = FlowEngine::new(
        driver.clone(),
        Arc::new(FakeParserClient::new().with_flow(parsed)),
        Arc::new(FakePermissionClient::allow_all()),
        registry.clone(),
        Arc::new(FakeDeviceManagerClient),
        Arc::new(FakeKafkaMqttBridgeClient::default()),
        fog_bridge(),
    );
    Harness { engine, driver, registry }
}

#[tokio::test]
async fn s1_start_deploys_one_cloud_operator_with_device_input() {
    let h = harness_with_flow(s1_parsed_flow());

    let pipeline = h.engine.start_pipeline(&s1_request(), USER, TOKEN).await.unwrap();

    assert_eq!(h.driver.create_call_count(), 1);

    let deployed = h.driver.last_created(pipeline.id).unwrap();
    assert_eq!(deployed.operators.len(), 1);
    let op = &deployed.operators[0];
    assert_eq!(op.output_topic, "analytics-sum");
    assert_eq!(op.input_topics.len(), 1);
    assert_eq!(op.input_topics[0].name, "svc1");
    assert_eq!(op.input_topics[0].filter_type, FilterType::DeviceId);
    assert_eq!(op.input_topics[0].filter_value, "D1");
    assert_eq!(op.input_topics[0].mappings[0].dest.as_deref(), Some("v"));
    assert_eq!(op.input_topics[0].mappings[0].source.as_deref(), Some("value.root.x"));

    // registered exactly once, retrievable under the same id
    assert_eq!(h.registry.list(USER).await.unwrap().len(), 1);
    assert_eq!(h.registry.get(pipeline.id, USER).await.unwrap().id, pipeline.id);
}

/// Two connected cloud operators A->B: the parser pre-computes B's edge to
/// A, the request only supplies a device input for A.
fn s2_parsed_flow() -> ParsedFlow {
    ParsedFlow {
        flow_id: "flow-s2".into(),
        image: String::new(),
        operators: vec![
            ParsedOperator {
                id: "A".into(),
                name: "sum".into(),
                operator_id: "op1".into(),
                image_id: "registry/sum:1".into(),
                deployment_type: DeploymentType::Cloud,
                cost: 1.0,
                upstream_config: UpstreamConfig::default(),
                downstream_config: DownstreamConfig::default(),
                input_topics: vec![],
            },
            ParsedOperator {
                id: "B".into(),
                name: "avg".into(),
                operator_id: "op2".into(),
                image_id: "registry/avg:1".into(),
                deployment_type: DeploymentType::Cloud,
                cost: 1.0,
                upstream_config: UpstreamConfig::default(),
                downstream_config: DownstreamConfig::default(),
                input_topics: vec![ParsedInputTopic {
                    topic_name: "analytics-sum".into(),
                    filter_type: FilterType::OperatorId,
                    filter_value: "A".into(),
                    mappings: vec![],
                }],
            },
        ],
    }
}

#[tokio::test]
async fn s2_request_device_input_and_parser_edge_coexist_after_translation() {
    let h = harness_with_flow(s2_parsed_flow());
    let request = PipelineRequest {
        flow_id: "flow-s2".into(),
        nodes: vec![PipelineNode {
            node_id: "A".into(),
            inputs: vec![NodeInput {
                filter_type: "deviceId".into(),
                filter_ids: "D1".into(),
                topic_name: "svc1".into(),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    let pipeline = h.engine.start_pipeline(&request, USER, TOKEN).await.unwrap();
    let deployed = h.driver.last_created(pipeline.id).unwrap();

    let a = deployed.operators.iter().find(|o| o.id == "A".into()).unwrap();
    let b = deployed.operators.iter().find(|o| o.id == "B".into()).unwrap();

    assert_eq!(a.input_topics.len(), 1);
    assert_eq!(a.input_topics[0].filter_value, "D1");

    assert_eq!(b.input_topics.len(), 1);
    assert_eq!(b.input_topics[0].filter_type, FilterType::OperatorId);
    assert_eq!(b.input_topics[0].filter_value, "A");
}

fn s3_parsed_flow() -> ParsedFlow {
    ParsedFlow {
        flow_id: "flow-s3".into(),
        image: String::new(),
        operators: (0..3)
            .map(|i| ParsedOperator {
                id: format!("op-{i}").into(),
                name: format!("stage-{i}"),
                operator_id: format!("catalog-{i}").into(),
                image_id: "registry/stage:1".into(),
                deployment_type: DeploymentType::Cloud,
                cost: 1.0,
                upstream_config: UpstreamConfig::default(),
                downstream_config: DownstreamConfig::default(),
                input_topics: vec![],
            })
            .collect(),
    }
}

#[tokio::test(start_paused = true)]
async fn s3_update_flipping_consume_all_messages_rotates_ids_and_waits_out_quiescence() {
    let h = harness_with_flow(s3_parsed_flow());
    let mut request = PipelineRequest {
        flow_id: "flow-s3".into(),
        consume_all_messages: false,
        ..Default::default()
    };

    let started = h.engine.start_pipeline(&request, USER, TOKEN).await.unwrap();
    let before: HashMap<_, _> = started
        .operators
        .iter()
        .map(|o| (o.id.clone(), o.application_id))
        .collect();
    assert_eq!(h.driver.create_call_count(), 1);

    request.id = Some(started.id);
    request.consume_all_messages = true;

    let updated = h.engine.update_pipeline(&request, USER, TOKEN).await.unwrap();

    assert_eq!(h.driver.create_call_count(), 2);
    assert!(h.driver.last_created(updated.id).unwrap().operators.len() == 3);
    for op in &updated.operators {
        assert_ne!(op.application_id, before[&op.id]);
    }

    let config = h.driver.last_config(updated.id).unwrap();
    assert_eq!(config.consumer_offset, ConsumerOffset::Earliest);
}

fn s4_parsed_flow() -> ParsedFlow {
    ParsedFlow {
        flow_id: "flow-s4".into(),
        image: String::new(),
        operators: vec![ParsedOperator {
            id: "X".into(),
            name: "filter".into(),
            operator_id: "catalog-filter".into(),
            image_id: "registry/filter:1".into(),
            deployment_type: DeploymentType::Local,
            cost: 0.0,
            upstream_config: UpstreamConfig::default(),
            downstream_config: DownstreamConfig::default(),
            input_topics: vec![],
        }],
    }
}

#[tokio::test]
async fn s4_fog_operator_topics_are_suffixed_and_start_command_is_sync_replayable() {
    let h = harness_with_flow(s4_parsed_flow());
    let request = PipelineRequest {
        flow_id: "flow-s4".into(),
        ..Default::default()
    };

    let pipeline = h.engine.start_pipeline(&request, USER, TOKEN).await.unwrap();
    let op = &pipeline.operators[0];
    assert!(op.output_topic.ends_with(&pipeline.id.to_string()));

    // S6: a sync request for this user replays exactly one start command,
    // carrying the operator/pipeline/catalog identity triple.
    let replayed = h.engine.active_fog_operators(USER).await;
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].operator_ids.operator_id, op.id);
    assert_eq!(replayed[0].operator_ids.pipeline_id, pipeline.id);
    assert_eq!(replayed[0].operator_ids.base_operator_id, "catalog-filter");
    assert_eq!(replayed[0].output_topic, op.output_topic);
}

#[tokio::test]
async fn s6_sync_request_replays_every_local_operator_exactly_once() {
    let h = harness_with_flow(s4_parsed_flow());
    let request = PipelineRequest {
        flow_id: "flow-s4".into(),
        ..Default::default()
    };
    h.engine.start_pipeline(&request, USER, TOKEN).await.unwrap();

    let first = h.engine.active_fog_operators(USER).await;
    let second = h.engine.active_fog_operators(USER).await;
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].operator_ids, second[0].operator_ids);

    // a different user sees nothing
    assert!(h.engine.active_fog_operators("nobody").await.is_empty());
}

#[tokio::test]
async fn s5_delete_of_already_deleted_pipeline_surfaces_not_found() {
    let h = harness_with_flow(s1_parsed_flow());
    let err = h
        .engine
        .delete_pipeline(PipelineId::new(), USER, TOKEN)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

/// Driver that reports the cloud workload already gone on the first delete
/// call, simulating a cluster that raced ahead of the registry.
struct MissingWorkloadOnDelete {
    inner: FakeDriver,
}

#[async_trait]
impl Driver for MissingWorkloadOnDelete {
    async fn create_operators(&self, pipeline: &Pipeline, config: &PipelineConfig) -> EngineResult<()> {
        self.inner.create_operators(pipeline, config).await
    }

    async fn delete_operators(&self, pipeline_id: PipelineId) -> EngineResult<()> {
        Err(EngineError::WorkloadNotFound(format!("deployment for {pipeline_id} not found")))
    }

    async fn get_pipeline_status(&self, pipeline_id: PipelineId) -> EngineResult<PipelineStatus> {
        self.inner.get_pipeline_status(pipeline_id).await
    }

    async fn get_pipelines_status(
        &self,
        pipeline_ids: &[PipelineId],
    ) -> EngineResult<HashMap<PipelineId, PipelineStatus>> {
        self.inner.get_pipelines_status(pipeline_ids).await
    }
}

#[tokio::test]
async fn s5_delete_with_driver_workload_already_gone_still_succeeds() {
    let registry = Arc::new(FakePipelineRegistryClient::new());
    let driver = Arc::new(MissingWorkloadOnDelete { inner: FakeDriver::new() });
    let engine = FlowEngine::new(
        driver,
        Arc::new(FakeParserClient::new().with_flow(s1_parsed_flow())),
        Arc::new(FakePermissionClient::allow_all()),
        registry.clone(),
        Arc::new(FakeDeviceManagerClient),
        Arc::new(FakeKafkaMqttBridgeClient::default()),
        fog_bridge(),
    );

    let pipeline = engine.start_pipeline(&s1_request(), USER, TOKEN).await.unwrap();
    engine.delete_pipeline(pipeline.id, USER, TOKEN).await.unwrap();

    assert!(matches!(
        registry.get(pipeline.id, USER).await.unwrap_err(),
        flow_clients::ClientError::NotFound { .. }
    ));
}
