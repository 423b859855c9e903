//! Operator and bridge lifecycle helpers shared by `StartPipeline` and
//! `UpdatePipeline` (spec.md §4.3, §4.4).

use flow_core::{EngineError, EngineResult, Pipeline};
use flow_clients::KafkaMqttBridgeClient;
use flow_driver::Driver;
use flow_fog::{FogBridge, OperatorIds, StartCommand, StopCommand};

use crate::retry::retry_fixed_backoff;

pub(crate) fn operator_ids(pipeline: &Pipeline, operator: &flow_core::Operator) -> OperatorIds {
    OperatorIds {
        operator_id: operator.id.clone(),
        pipeline_id: pipeline.id,
        base_operator_id: operator.operator_id.to_string(),
    }
}

pub(crate) fn start_command(pipeline: &Pipeline, operator: &flow_core::Operator) -> StartCommand {
    StartCommand {
        image_id: operator.image_id.clone(),
        input_topics: operator.input_topics.clone(),
        operator_config: operator.config.clone(),
        operator_ids: operator_ids(pipeline, operator),
        output_topic: operator.output_topic.clone(),
    }
}

/// Start every operator in `pipeline`: cloud operators go to the driver as
/// one retried batch call, fog operators are started one by one.
pub async fn start_operators(
    driver: &dyn Driver,
    fog: &FogBridge,
    pipeline: &Pipeline,
    config: &flow_core::PipelineConfig,
    user_id: &str,
) -> EngineResult<()> {
    retry_fixed_backoff(|| async { driver.create_operators(pipeline, config).await }).await?;

    for operator in pipeline.local_operators() {
        fog.start_operator(user_id, &start_command(pipeline, operator))
            .await
            .map_err(EngineError::from)?;
    }
    Ok(())
}

/// Stop every operator in `pipeline`. Idempotent: a driver reporting the
/// workload already gone is treated as success.
pub async fn stop_operators(
    driver: &dyn Driver,
    fog: &FogBridge,
    pipeline: &Pipeline,
    user_id: &str,
) -> EngineResult<()> {
    match driver.delete_operators(pipeline.id).await {
        Ok(()) => {}
        Err(err) if err.is_benign_during_teardown() => {}
        Err(err) => return Err(err),
    }

    for operator in pipeline.local_operators() {
        let command = StopCommand {
            operator_ids: operator_ids(pipeline, operator),
        };
        if let Err(err) = fog.stop_operator(user_id, &command).await {
            tracing::warn!(operator_id = %operator.id, error = %err, "fog operator stop command failed, continuing teardown");
        }
    }
    Ok(())
}

/// Enable cross-tier bridging (spec.md §4.4): cloud operators with
/// `downstreamConfig.enabled` get a kafka→mqtt bridge instance; fog
/// operators with `upstreamConfig.enabled` get an "enable upstream"
/// control message.
pub async fn enable_bridging(
    bridge: &dyn KafkaMqttBridgeClient,
    fog: &FogBridge,
    pipeline: &mut Pipeline,
    user_id: &str,
) -> EngineResult<()> {
    for operator in &mut pipeline.operators {
        if operator.deployment_type.is_cloud() && operator.downstream_config.enabled {
            let instance_id = bridge
                .create_instance(pipeline.id, &operator.id, &operator.output_topic)
                .await
                .map_err(EngineError::from)?;
            operator.downstream_config.instance_id = Some(instance_id);
        }
    }

    for operator in pipeline.local_operators() {
        if operator.upstream_config.enabled {
            fog.enable_upstream(user_id, &operator.output_topic)
                .await
                .map_err(EngineError::from)?;
        }
    }
    Ok(())
}

/// Disable cross-tier bridging, the reverse of [`enable_bridging`]. A
/// bridge-teardown failure aborts the delete so the caller can retry
/// (spec.md §7): "Bridge-teardown failures during Delete abort the
/// delete" — except a 404, which means the instance is already gone and is
/// not a terminal error, mirroring [`stop_operators`]'s treatment of the
/// driver side.
pub async fn disable_bridging(
    bridge: &dyn KafkaMqttBridgeClient,
    fog: &FogBridge,
    pipeline: &mut Pipeline,
    user_id: &str,
) -> EngineResult<()> {
    for operator in &mut pipeline.operators {
        if let Some(instance_id) = operator.downstream_config.instance_id.take() {
            match bridge.delete_instance(&instance_id).await {
                Ok(()) => {}
                Err(err) => {
                    let err = EngineError::from(err);
                    if err.is_benign_during_teardown() {
                        tracing::warn!(operator_id = %operator.id, error = %err, "bridge instance already gone, continuing teardown");
                    } else {
                        return Err(err);
                    }
                }
            }
        }
    }

    for operator in pipeline.local_operators() {
        if operator.upstream_config.enabled {
            fog.disable_upstream(user_id, &operator.output_topic)
                .await
                .map_err(EngineError::from)?;
        }
    }
    Ok(())
}
