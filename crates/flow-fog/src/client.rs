//! MQTT transport for the fog control plane, built on `rumqttc`.
//!
//! The engine owns one process-wide [`FogBridge`] (spec.md §5 "Shared
//! resources" — the MQTT client is a singleton guarded by the broker
//! library's own concurrency model); every publish goes through its cloned
//! `AsyncClient` handle, which is safe to call from any task.

use std::sync::Arc;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};

use crate::error::FogError;
use crate::messages::{StartCommand, StopCommand, UpstreamControlMessage, UpstreamSyncMessage};
use crate::topics;

const CONTROL_QOS: QoS = QoS::ExactlyOnce;

/// Supplies the data a sync-request responder needs without pulling
/// `flow-engine` (and the registry/driver it depends on) into this crate.
#[async_trait]
pub trait SyncRequestSource: Send + Sync {
    /// Every currently active fog operator for `user_id`, as the start
    /// command that would (re-)launch it.
    async fn active_fog_operators(&self, user_id: &str) -> Vec<StartCommand>;

    /// Output topics of every fog operator for `user_id` with upstream
    /// forwarding currently enabled.
    async fn upstream_enabled_topics(&self, user_id: &str) -> Vec<String>;
}

/// Lets the engine's process-wide `Arc<FlowEngine>` serve directly as the
/// event loop's sync-request source without an extra wrapper type.
#[async_trait]
impl<T: SyncRequestSource> SyncRequestSource for Arc<T> {
    async fn active_fog_operators(&self, user_id: &str) -> Vec<StartCommand> {
        (**self).active_fog_operators(user_id).await
    }

    async fn upstream_enabled_topics(&self, user_id: &str) -> Vec<String> {
        (**self).upstream_enabled_topics(user_id).await
    }
}

#[derive(Clone)]
pub struct FogBridge {
    client: AsyncClient,
}

impl FogBridge {
    pub fn connect(options: MqttOptions, capacity: usize) -> (Self, EventLoop) {
        let (client, event_loop) = AsyncClient::new(options, capacity);
        (Self { client }, event_loop)
    }

    pub async fn start_operator(&self, user_id: &str, command: &StartCommand) -> Result<(), FogError> {
        self.publish(&topics::operator_start(user_id), command).await
    }

    pub async fn stop_operator(&self, user_id: &str, command: &StopCommand) -> Result<(), FogError> {
        self.publish(&topics::operator_stop(user_id), command).await
    }

    pub async fn enable_upstream(&self, user_id: &str, output_topic: &str) -> Result<(), FogError> {
        let message = UpstreamControlMessage {
            output_topic: output_topic.to_string(),
        };
        self.publish(&topics::upstream_enable(user_id), &message).await
    }

    pub async fn disable_upstream(&self, user_id: &str, output_topic: &str) -> Result<(), FogError> {
        let message = UpstreamControlMessage {
            output_topic: output_topic.to_string(),
        };
        self.publish(&topics::upstream_disable(user_id), &message).await
    }

    async fn publish_sync_response(
        &self,
        user_id: &str,
        source: &dyn SyncRequestSource,
        kind: topics::SyncRequestKind,
    ) -> Result<(), FogError> {
        match kind {
            topics::SyncRequestKind::Operator => {
                for command in source.active_fog_operators(user_id).await {
                    self.publish(&topics::operator_sync_response(user_id), &command).await?;
                }
            }
            topics::SyncRequestKind::Upstream => {
                let message = UpstreamSyncMessage {
                    output_topics: source.upstream_enabled_topics(user_id).await,
                };
                self.publish(&topics::upstream_sync_response(user_id), &message).await?;
            }
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &impl serde::Serialize) -> Result<(), FogError> {
        let bytes = serde_json::to_vec(payload)?;
        self.client.publish(topic, CONTROL_QOS, false, bytes).await?;
        Ok(())
    }

    pub async fn subscribe_control_topics(&self, user_id: &str) -> Result<(), FogError> {
        self.client
            .subscribe(topics::operator_sync_request(user_id), CONTROL_QOS)
            .await?;
        self.client
            .subscribe(topics::upstream_sync_request(user_id), CONTROL_QOS)
            .await?;
        Ok(())
    }
}

/// Drive the MQTT event loop, dispatching incoming sync-request messages to
/// `source` and publishing the corresponding response. Runs until the event
/// loop errors (typically: cancellation on process shutdown).
pub async fn run_event_loop(
    bridge: FogBridge,
    mut event_loop: EventLoop,
    source: impl SyncRequestSource + 'static,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some((kind, user_id)) = topics::user_from_sync_request_topic(&publish.topic) else {
                    continue;
                };
                let user_id = user_id.to_string();
                if let Err(err) = bridge.publish_sync_response(&user_id, &source, kind).await {
                    tracing::warn!(%user_id, error = %err, "failed to answer fog sync request");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "mqtt event loop terminated");
                break;
            }
        }
    }
}
