//! JSON control-message shapes exchanged over the MQTT fog topics
//! (spec.md §4.4).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use flow_core::{InputTopic, OperatorId, PipelineId};

/// Identifies one fog operator instance across a start/stop round trip.
/// `base_operator_id` is the catalog ID the operator was instantiated from,
/// carried alongside so a fog node can recognise "the same kind of
/// operator" across pipeline restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorIds {
    pub operator_id: OperatorId,
    pub pipeline_id: PipelineId,
    pub base_operator_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCommand {
    pub image_id: String,
    pub input_topics: Vec<InputTopic>,
    pub operator_config: HashMap<String, String>,
    pub operator_ids: OperatorIds,
    pub output_topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopCommand {
    pub operator_ids: OperatorIds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamControlMessage {
    pub output_topic: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamSyncMessage {
    pub output_topics: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_command_serializes_operator_ids_in_camel_case() {
        let command = StartCommand {
            image_id: "registry/filter:1".into(),
            input_topics: vec![],
            operator_config: HashMap::new(),
            operator_ids: OperatorIds {
                operator_id: OperatorId::from("X"),
                pipeline_id: PipelineId::new(),
                base_operator_id: "op3".into(),
            },
            output_topic: "fog-filter-X".into(),
        };

        let value: serde_json::Value = serde_json::to_value(&command).unwrap();
        let operator_ids = &value["operatorIds"];
        assert_eq!(operator_ids["operatorId"], "X");
        assert_eq!(operator_ids["baseOperatorId"], "op3");
        assert_eq!(
            operator_ids["pipelineId"].as_str().unwrap(),
            command.operator_ids.pipeline_id.to_string()
        );
    }
}
