//! HTTP surface behavior against an in-memory engine (spec.md §6, §7).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use flow_clients::{
    FakeDeviceManagerClient, FakeKafkaMqttBridgeClient, FakeParserClient, FakePermissionClient,
    FakePipelineRegistryClient,
};
use flow_core::{DeploymentType, DownstreamConfig, ParsedFlow, ParsedOperator, UpstreamConfig};
use flow_driver::FakeDriver;
use flow_engine::FlowEngine;
use flow_fog::FogBridge;
use rumqttc::MqttOptions;
use tower::ServiceExt;

fn fog_bridge() -> FogBridge {
    FogBridge::connect(MqttOptions::new("flow-http-test", "localhost", 1883), 64).0
}

fn test_engine() -> Arc<FlowEngine> {
    let parsed = ParsedFlow {
        flow_id: "flow-1".into(),
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
    };

    Arc::new(FlowEngine::new(
        Arc::new(FakeDriver::new()),
        Arc::new(FakeParserClient::new().with_flow(parsed)),
        Arc::new(FakePermissionClient::allow_all()),
        Arc::new(FakePipelineRegistryClient::new()),
        Arc::new(FakeDeviceManagerClient),
        Arc::new(FakeKafkaMqttBridgeClient::default()),
        fog_bridge(),
    ))
}

#[tokio::test]
async fn healthz_returns_200_without_auth() {
    let app = flow_http::build_router(test_engine(), "");
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_caller_identity_is_unauthorized() {
    let app = flow_http::build_router(test_engine(), "");
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/pipeline")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"flowId":"flow-1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn start_then_delete_round_trips_through_the_router() {
    let app = flow_http::build_router(test_engine(), "");

    let start_response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/pipeline")
                .header("content-type", "application/json")
                .header("x-userid", "user-1")
                .body(Body::from(r#"{"flowId":"flow-1","name":"p"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(start_response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(start_response.into_body(), usize::MAX).await.unwrap();
    let pipeline: flow_core::Pipeline = serde_json::from_slice(&body).unwrap();

    let delete_response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/pipeline/{}", pipeline.id))
                .header("x-userid", "user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete_response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn delete_of_unknown_pipeline_is_404() {
    let app = flow_http::build_router(test_engine(), "");
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/pipeline/{}", flow_core::PipelineId::new()))
                .header("x-userid", "user-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn url_prefix_nests_the_whole_api() {
    let app = flow_http::build_router(test_engine(), "/flow-engine");
    let response = app
        .oneshot(Request::builder().uri("/flow-engine/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
