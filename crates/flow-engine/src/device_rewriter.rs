//! Pre-resolves the device-type service metadata the translator needs to
//! rewrite local-operator input topics (spec.md §4.2), keeping the
//! translation itself synchronous and pure.

use std::collections::HashMap;

use flow_core::{DeviceTopicRewriter, Operator, PipelineRequest};
use flow_clients::{ClientError, DeviceManagerClient};

pub struct CachingDeviceTopicRewriter {
    /// Keyed by `(deviceId, serviceId)`.
    metadata: HashMap<(String, String), flow_clients::ServiceMetadata>,
}

impl DeviceTopicRewriter for CachingDeviceTopicRewriter {
    fn local_input_topic(&self, device_id: &str, service_id: &str) -> String {
        self.metadata
            .get(&(device_id.to_string(), service_id.to_string()))
            .map(|m| m.local_topic.clone())
            .unwrap_or_else(|| service_id.to_string())
    }

    fn strip_envelope(&self, path: &str) -> String {
        // Depth is per-service, but every local operator input this engine
        // resolves shares the conventional two-segment platform envelope;
        // fall back to that when a specific service's metadata is absent.
        flow_core::strip_platform_envelope(path)
    }
}

/// Fetch device-type metadata for every `(deviceId, serviceId)` pair a
/// local operator's request bindings reference, mirroring the pairing
/// rule `addOperatorConfigs` applies (k-th filter ID with k-th topic name
/// for local operators with more than one filter ID supplied).
pub async fn resolve_device_topics(
    device_manager: &dyn DeviceManagerClient,
    request: &PipelineRequest,
    operators: &[Operator],
    token: &str,
) -> Result<CachingDeviceTopicRewriter, ClientError> {
    let local_ids: std::collections::HashSet<&str> = operators
        .iter()
        .filter(|o| o.deployment_type.is_local())
        .map(|o| o.id.0.as_str())
        .collect();

    let mut metadata = HashMap::new();

    for node in &request.nodes {
        if !local_ids.contains(node.node_id.0.as_str()) {
            continue;
        }
        for input in &node.inputs {
            if input.filter_type.to_ascii_lowercase() != "deviceid" {
                continue;
            }
            let filter_ids: Vec<&str> = input.filter_ids.split(',').collect();
            let topic_names: Vec<&str> = input.topic_name.split(',').collect();

            for (k, service_id) in topic_names.into_iter().enumerate() {
                let device_id = if filter_ids.len() > 1 {
                    filter_ids.get(k).copied().unwrap_or(filter_ids[0])
                } else {
                    filter_ids.first().copied().unwrap_or_default()
                };
                let key = (device_id.to_string(), service_id.to_string());
                if metadata.contains_key(&key) {
                    continue;
                }
                let service_metadata = device_manager
                    .get_service_metadata(device_id, service_id, token)
                    .await?;
                metadata.insert(key, service_metadata);
            }
        }
    }

    Ok(CachingDeviceTopicRewriter { metadata })
}
