//! Entry point for the flow engine control-plane daemon (spec.md §5, §6).
//!
//! Wires the concrete collaborators (Kubernetes driver, HTTP clients, MQTT
//! fog bridge) into a [`flow_engine::FlowEngine`], serves the HTTP surface
//! from `flow-http`, and answers fog sync requests off the MQTT event loop
//! until a shutdown signal arrives.

mod cli;
mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rumqttc::MqttOptions;
use tracing::{error, info, warn};

use flow_clients::{
    HttpDeviceManagerClient, HttpKafkaMqttBridgeClient, HttpParserClient, HttpPermissionClient,
    HttpPipelineRegistryClient,
};
use flow_driver::{Driver, FakeDriver, KubernetesDriver};
use flow_engine::FlowEngine;
use flow_fog::FogBridge;

use crate::cli::Cli;
use crate::config::Config;

/// How long the HTTP server is given to finish in-flight requests on
/// shutdown, and how long the MQTT client lingers after disconnecting
/// (spec.md §5 "Cancellation and timeouts").
const HTTP_SHUTDOWN_WINDOW: Duration = Duration::from_secs(5);
const MQTT_DISCONNECT_LINGER: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "fatal init failure");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    info!(port = config.server_port, driver = %config.driver.kind, "starting flow engine");

    let driver = build_driver(&config).await?;
    let http_client = reqwest::Client::new();
    let parser = Arc::new(HttpParserClient::new(http_client.clone(), config.services.parser.clone()));
    let permission = Arc::new(HttpPermissionClient::new(http_client.clone(), config.services.permission.clone()));
    let registry = Arc::new(HttpPipelineRegistryClient::new(
        http_client.clone(),
        config.services.pipeline_registry.clone(),
    ));
    let device_manager = Arc::new(HttpDeviceManagerClient::new(
        http_client.clone(),
        config.services.device_manager.clone(),
    ));
    let bridge_client = Arc::new(HttpKafkaMqttBridgeClient::new(
        http_client,
        config.services.kafka_mqtt_bridge.clone(),
    ));

    let mqtt_options = build_mqtt_options(&config);
    let (fog, event_loop) = FogBridge::connect(mqtt_options, 256);

    let engine = Arc::new(FlowEngine::new(
        driver,
        parser,
        permission,
        registry,
        device_manager,
        bridge_client,
        fog.clone(),
    ));

    fog.subscribe_control_topics("+").await.map_err(|err| anyhow::anyhow!("mqtt subscribe failed: {err}"))?;
    let event_loop_handle = tokio::spawn(flow_fog::run_event_loop(fog, event_loop, Arc::clone(&engine)));

    let router = flow_http::build_router(engine, &config.url_prefix);
    let bind_addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|err| anyhow::anyhow!("failed to bind {bind_addr}: {err}"))?;
    info!(%bind_addr, "http server listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
    });

    wait_for_signal().await;
    warn!("shutdown signal received, entering graceful shutdown window");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(HTTP_SHUTDOWN_WINDOW, server).await {
        Ok(join_result) => {
            join_result.map_err(|err| anyhow::anyhow!("http server task panicked: {err}"))?
                .map_err(|err| anyhow::anyhow!("http server error: {err}"))?;
        }
        Err(_) => warn!("graceful shutdown window elapsed, forcing exit"),
    }

    info!("http server stopped, disconnecting mqtt");
    tokio::time::sleep(MQTT_DISCONNECT_LINGER).await;
    event_loop_handle.abort();

    info!("shutdown complete");
    Ok(())
}

async fn build_driver(config: &Config) -> anyhow::Result<Arc<dyn Driver>> {
    match config.driver.kind.as_str() {
        "fake" => Ok(Arc::new(FakeDriver::new())),
        _ => {
            let client = kube::Client::try_default()
                .await
                .map_err(|err| anyhow::anyhow!("failed to build kubernetes client: {err}"))?;
            Ok(Arc::new(KubernetesDriver::new(
                client,
                config.driver.namespace.clone(),
                config.zookeeper.clone(),
                config.driver.storage_class.clone(),
            )))
        }
    }
}

fn build_mqtt_options(config: &Config) -> MqttOptions {
    let (host, port) = parse_broker_address(&config.broker.address);
    let mut options = MqttOptions::new("flow-engine", host, port);
    if !config.broker.user.is_empty() {
        options.set_credentials(config.broker.user.clone(), config.broker.password.clone());
    }
    options
}

fn parse_broker_address(address: &str) -> (String, u16) {
    let without_scheme = address.split("://").last().unwrap_or(address);
    match without_scheme.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(1883)),
        None => (without_scheme.to_string(), 1883),
    }
}

/// Resolves on SIGINT, SIGTERM, or SIGQUIT (spec.md §5 "Cancellation and
/// timeouts": the process carries a root cancellation context tied to all
/// three).
async fn wait_for_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigquit.recv() => {},
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
