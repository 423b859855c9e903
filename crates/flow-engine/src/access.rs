//! Access check shared by `StartPipeline` and `UpdatePipeline` (spec.md §4.1
//! step 1).

use std::collections::HashSet;

use flow_core::{EngineError, EngineResult, FilterType, PipelineId, PipelineRequest};
use flow_clients::{PermissionClient, PipelineRegistryClient};

/// Every distinct `DeviceId`-filtered ID and every distinct
/// `OperatorId`-filtered ID referenced by `request`'s node inputs.
fn collect_referenced_ids(request: &PipelineRequest) -> (Vec<String>, Vec<String>) {
    let mut device_ids = HashSet::new();
    let mut operator_ids = HashSet::new();

    for node in &request.nodes {
        for input in &node.inputs {
            let ids = input.filter_ids.split(',').map(str::trim).filter(|s| !s.is_empty());
            match FilterType::from_request_str(&input.filter_type) {
                FilterType::DeviceId => device_ids.extend(ids.map(str::to_string)),
                FilterType::OperatorId => operator_ids.extend(ids.map(str::to_string)),
                FilterType::ImportId => {}
            }
        }
    }

    (device_ids.into_iter().collect(), operator_ids.into_iter().collect())
}

/// Check the calling user has read access to every device and every
/// cross-pipeline operator reference the request names. Fails with
/// [`EngineError::Forbidden`] on denial or on any lookup error — the
/// access check does not distinguish "denied" from "couldn't verify".
pub async fn check_access(
    permission: &dyn PermissionClient,
    registry: &dyn PipelineRegistryClient,
    request: &PipelineRequest,
    user_id: &str,
    token: &str,
) -> EngineResult<()> {
    let (device_ids, operator_ids) = collect_referenced_ids(request);

    if !device_ids.is_empty() {
        let allowed = permission
            .user_has_devices_read_access(&device_ids, token)
            .await
            .map_err(|_| EngineError::Forbidden("device read access denied".to_string()))?;
        if !allowed {
            return Err(EngineError::Forbidden("device read access denied".to_string()));
        }
    }

    for operator_id in &operator_ids {
        let Some((_, pipeline_id_str)) = operator_id.split_once(':') else {
            continue;
        };
        let pipeline_id = PipelineId::parse(pipeline_id_str)
            .map_err(|_| EngineError::Forbidden(format!("malformed operator reference {operator_id}")))?;
        registry
            .get(pipeline_id, user_id)
            .await
            .map_err(|_| EngineError::Forbidden(format!("no access to pipeline {pipeline_id}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::{NodeInput, PipelineNode};

    fn request_with_device_input(filter_ids: &str) -> PipelineRequest {
        PipelineRequest {
            nodes: vec![PipelineNode {
                inputs: vec![NodeInput {
                    filter_type: "deviceId".into(),
                    filter_ids: filter_ids.into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn collects_deduplicated_device_ids() {
        let request = request_with_device_input("D1,D2,D1");
        let (device_ids, operator_ids) = collect_referenced_ids(&request);
        assert_eq!(device_ids.len(), 2);
        assert!(operator_ids.is_empty());
    }
}
