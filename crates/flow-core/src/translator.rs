//! Flow Translator (spec.md §4.2).
//!
//! Pure functions, by design: `createPipeline` and `addOperatorConfigs` take
//! their inputs and return new operator lists rather than mutating in
//! place, the opposite of the legacy service's side-effecting translation.
//! Local-operator topic/path rewriting needs device-type metadata fetched
//! from the Device Manager; since that is an async, fallible I/O call, it is
//! resolved *before* translation runs and handed in as a small synchronous
//! lookup (`DeviceTopicRewriter`) so the translation itself stays pure and
//! unit-testable without a mock HTTP server.

use std::collections::{HashMap, HashSet};

use crate::ids::ApplicationId;
use crate::model::{
    DownstreamConfig, FilterType, InputTopic, Mapping, Operator, ParsedFlow, Pipeline,
    PipelineRequest, UpstreamConfig,
};
use crate::topics::{
    cloud_output_topic, fog_output_topic, operator_input_name_with_pipeline, with_pipeline_suffix,
};

/// Resolves device-scoped fog topic names and strips the platform envelope
/// from dotted value paths, using device-type service metadata. Production
/// callers populate this from the Device Manager client ahead of time;
/// `IdentityDeviceTopicRewriter` is the pass-through used by tests and by
/// pipelines with no local operators.
pub trait DeviceTopicRewriter: Send + Sync {
    /// Rewrite a boundary-input topic name to the device's local-broker
    /// topic, given the raw `(deviceId, serviceId)` pair from the request.
    fn local_input_topic(&self, device_id: &str, service_id: &str) -> String;

    /// Strip the platform envelope (first two segments of a dotted path)
    /// from a value-mapping source path.
    fn strip_envelope(&self, path: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityDeviceTopicRewriter;

impl DeviceTopicRewriter for IdentityDeviceTopicRewriter {
    fn local_input_topic(&self, _device_id: &str, service_id: &str) -> String {
        service_id.to_string()
    }

    fn strip_envelope(&self, path: &str) -> String {
        strip_platform_envelope(path)
    }
}

/// Drop the first two dotted path segments (the platform envelope), e.g.
/// `"value.root.x"` -> `"x"`, `"a.b.c.d"` -> `"c.d"`.
pub fn strip_platform_envelope(path: &str) -> String {
    let mut parts = path.splitn(3, '.');
    let _first = parts.next();
    let _second = parts.next();
    parts.next().unwrap_or("").to_string()
}

/// `createPipeline(parsedFlow)`: build the operator skeleton for a freshly
/// parsed flow — fresh `applicationId`s, provisional output topics, and the
/// parser's pre-computed inter-operator input topics copied verbatim.
pub fn create_pipeline(parsed: &ParsedFlow) -> Vec<Operator> {
    parsed
        .operators
        .iter()
        .map(|op| {
            let output_topic = if op.deployment_type.is_local() {
                fog_output_topic(&op.name, &op.id, "")
            } else {
                cloud_output_topic(&op.name)
            };
            Operator {
                id: op.id.clone(),
                application_id: ApplicationId::new(),
                name: op.name.clone(),
                operator_id: op.operator_id.clone(),
                image_id: op.image_id.clone(),
                deployment_type: op.deployment_type,
                config: HashMap::new(),
                output_topic,
                persist_data: false,
                input_topics: op
                    .input_topics
                    .iter()
                    .map(|t| InputTopic {
                        name: t.topic_name.clone(),
                        filter_type: t.filter_type,
                        filter_value: t.filter_value.clone(),
                        filter_value2: None,
                        mappings: t.mappings.clone(),
                    })
                    .collect(),
                input_selections: Vec::new(),
                cost: op.cost,
                upstream_config: UpstreamConfig {
                    enabled: op.upstream_config.enabled,
                },
                downstream_config: DownstreamConfig {
                    enabled: op.downstream_config.enabled,
                    instance_id: None,
                },
            }
        })
        .collect()
}

/// `addOperatorConfigs(request, pipeline)`: prune each operator's input
/// topics down to the inter-operator edges the parser established, then
/// re-bind every request-supplied input/config/persistence/selection onto
/// the matching operator. Unmentioned operators keep their pruned edge set;
/// request nodes naming unknown operator IDs are silently ignored (the
/// parser owns the authoritative node set).
///
/// Pure and idempotent: `add_operator_configs(req, add_operator_configs(req,
/// ops)) == add_operator_configs(req, ops)`, because the prune step removes
/// every topic added by a prior call before request bindings are re-applied
/// deterministically.
pub fn add_operator_configs(
    request: &PipelineRequest,
    operators: Vec<Operator>,
    rewriter: &dyn DeviceTopicRewriter,
) -> Vec<Operator> {
    let known_ids: HashSet<String> = operators.iter().map(|o| o.id.0.clone()).collect();

    operators
        .into_iter()
        .map(|mut operator| {
            operator
                .input_topics
                .retain(|t| known_ids.contains(&t.filter_value));

            let Some(node) = request.nodes.iter().find(|n| n.node_id == operator.id) else {
                return operator;
            };

            operator.persist_data = node.persist_data;
            operator.input_selections = node.input_selections.clone();

            for input in &node.inputs {
                let filter_type = FilterType::from_request_str(&input.filter_type);
                let filter_ids: Vec<&str> = input.filter_ids.split(',').collect();
                let topic_names: Vec<&str> = input.topic_name.split(',').collect();

                for (k, raw_topic_name) in topic_names.into_iter().enumerate() {
                    let filter_id = if operator.deployment_type.is_local() && filter_ids.len() > 1
                    {
                        filter_ids.get(k).copied().unwrap_or(filter_ids[0])
                    } else {
                        filter_ids.first().copied().unwrap_or_default()
                    };

                    let topic_name = if operator.deployment_type.is_local() {
                        rewriter.local_input_topic(filter_id, raw_topic_name)
                    } else {
                        raw_topic_name.to_string()
                    };

                    let mappings = input
                        .values
                        .iter()
                        .map(|v| Mapping {
                            dest: Some(v.name.clone()),
                            source: Some(if operator.deployment_type.is_local() {
                                rewriter.strip_envelope(&v.path)
                            } else {
                                v.path.clone()
                            }),
                        })
                        .collect();

                    operator.input_topics.push(InputTopic {
                        name: topic_name,
                        filter_type,
                        filter_value: filter_id.to_string(),
                        filter_value2: None,
                        mappings,
                    });
                }
            }

            if !node.config.is_empty() {
                operator.config = node
                    .config
                    .iter()
                    .map(|c| (c.name.clone(), c.value.clone()))
                    .collect();
            }

            operator
        })
        .collect()
}

/// Finalize fog topics (spec.md §4.1 step 6), run once right after the
/// registry assigns `pipeline.id`. For every local operator, append the
/// pipeline ID to its output topic and to every `OperatorId`-filtered input
/// topic — the invariant that isolates fog topic spaces across pipelines
/// instantiating the same flow on the same device (testable property 1).
///
/// Idempotent: a topic that already carries the pipeline ID suffix is left
/// alone, so this is safe to call again on `UpdatePipeline` after
/// `addOperatorConfigs` has re-applied request bindings onto operators
/// whose surviving topics were already finalized on a prior Start.
pub fn finalize_fog_topics(pipeline: &mut Pipeline) {
    let pipeline_id = pipeline.id;
    let suffix = pipeline_id.to_string();
    for operator in &mut pipeline.operators {
        if !operator.deployment_type.is_local() {
            continue;
        }
        if !operator.output_topic.ends_with(&suffix) {
            operator.output_topic = with_pipeline_suffix(&operator.output_topic, pipeline_id);
        }
        for topic in &mut operator.input_topics {
            if topic.filter_type == FilterType::OperatorId && !topic.name.ends_with(&suffix) {
                topic.name = operator_input_name_with_pipeline(&topic.name, pipeline_id);
            }
        }
    }
}

/// Assign a fresh `applicationId` to every operator whose current one is
/// nil ("never assigned"), used by `UpdatePipeline` to backfill operators
/// added since the pipeline was last started (testable property 2).
pub fn regenerate_missing_application_ids(pipeline: &mut Pipeline) {
    for operator in &mut pipeline.operators {
        if operator.application_id.is_nil() {
            operator.application_id = ApplicationId::new();
        }
    }
}

/// Recompute `outputTopic` from `name`/`deploymentType` for any operator
/// whose output topic is empty, using the same provisional (fog) or final
/// (cloud) convention `createPipeline` uses. Fog topics are re-suffixed
/// with `pipeline_id` immediately, since this runs after registration.
pub fn regenerate_missing_output_topics(pipeline: &mut Pipeline) {
    let pipeline_id = pipeline.id;
    for operator in &mut pipeline.operators {
        if !operator.output_topic.is_empty() {
            continue;
        }
        operator.output_topic = if operator.deployment_type.is_local() {
            with_pipeline_suffix(
                &fog_output_topic(&operator.name, &operator.id, ""),
                pipeline_id,
            )
        } else {
            cloud_output_topic(&operator.name)
        };
    }
}

/// If `consumeAllMessages` flipped between the pre- and post-update
/// pipeline, rotate every operator's `applicationId` — a policy change
/// that must not silently reuse a consumer group's committed offsets
/// (testable property 3).
pub fn rotate_application_ids_on_offset_change(pipeline: &mut Pipeline, previous_consume_all_messages: bool) {
    if pipeline.consume_all_messages == previous_consume_all_messages {
        return;
    }
    for operator in &mut pipeline.operators {
        operator.application_id = ApplicationId::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::OperatorId;
    use crate::model::{
        DeploymentType, NodeInput, NodeValue, ParsedInputTopic, ParsedOperator, PipelineNode,
    };

    fn parsed_flow_two_operators() -> ParsedFlow {
        ParsedFlow {
            flow_id: "flow-1".into(),
            image: String::new(),
            operators: vec![
                ParsedOperator {
                    id: OperatorId::from("A"),
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
                    id: OperatorId::from("B"),
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

    #[test]
    fn create_pipeline_preserves_operator_count_and_ids() {
        let parsed = parsed_flow_two_operators();
        let operators = create_pipeline(&parsed);
        assert_eq!(operators.len(), 2);
        assert_eq!(operators[0].id, OperatorId::from("A"));
        assert_eq!(operators[1].id, OperatorId::from("B"));
        assert_eq!(operators[0].output_topic, "analytics-sum");
    }

    #[test]
    fn add_operator_configs_preserves_inter_operator_edge_and_adds_device_input() {
        let parsed = parsed_flow_two_operators();
        let operators = create_pipeline(&parsed);

        let request = PipelineRequest {
            flow_id: "flow-1".into(),
            nodes: vec![PipelineNode {
                node_id: OperatorId::from("A"),
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
        };

        let result = add_operator_configs(&request, operators, &IdentityDeviceTopicRewriter);
        let a = result.iter().find(|o| o.id == OperatorId::from("A")).unwrap();
        let b = result.iter().find(|o| o.id == OperatorId::from("B")).unwrap();

        assert_eq!(a.input_topics.len(), 1);
        assert_eq!(a.input_topics[0].name, "svc1");
        assert_eq!(a.input_topics[0].filter_value, "D1");
        assert_eq!(a.input_topics[0].mappings[0].source.as_deref(), Some("value.root.x"));

        // B's inter-operator edge survives pruning untouched.
        assert_eq!(b.input_topics.len(), 1);
        assert_eq!(b.input_topics[0].filter_type, FilterType::OperatorId);
        assert_eq!(b.input_topics[0].filter_value, "A");
    }

    #[test]
    fn add_operator_configs_is_idempotent() {
        let parsed = parsed_flow_two_operators();
        let operators = create_pipeline(&parsed);
        let request = PipelineRequest {
            flow_id: "flow-1".into(),
            nodes: vec![PipelineNode {
                node_id: OperatorId::from("A"),
                inputs: vec![NodeInput {
                    filter_type: "deviceId".into(),
                    filter_ids: "D1".into(),
                    topic_name: "svc1".into(),
                    values: vec![],
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let once = add_operator_configs(&request, operators.clone(), &IdentityDeviceTopicRewriter);
        let twice = add_operator_configs(&request, once.clone(), &IdentityDeviceTopicRewriter);

        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.input_topics.len(), b.input_topics.len());
            assert_eq!(a.input_topics, b.input_topics);
        }
    }

    #[test]
    fn local_operator_input_is_rewritten_through_device_manager_metadata() {
        struct FixedRewriter;
        impl DeviceTopicRewriter for FixedRewriter {
            fn local_input_topic(&self, device_id: &str, service_id: &str) -> String {
                format!("local/{device_id}/{service_id}")
            }
            fn strip_envelope(&self, path: &str) -> String {
                strip_platform_envelope(path)
            }
        }

        let parsed = ParsedFlow {
            flow_id: "flow-1".into(),
            image: String::new(),
            operators: vec![ParsedOperator {
                id: OperatorId::from("F"),
                name: "filter".into(),
                operator_id: "op3".into(),
                image_id: "registry/filter:1".into(),
                deployment_type: DeploymentType::Local,
                cost: 0.0,
                upstream_config: UpstreamConfig::default(),
                downstream_config: DownstreamConfig::default(),
                input_topics: vec![],
            }],
        };
        let operators = create_pipeline(&parsed);

        let request = PipelineRequest {
            flow_id: "flow-1".into(),
            nodes: vec![PipelineNode {
                node_id: OperatorId::from("F"),
                inputs: vec![NodeInput {
                    filter_type: "deviceId".into(),
                    filter_ids: "D1".into(),
                    topic_name: "svc1".into(),
                    values: vec![NodeValue {
                        name: "v".into(),
                        path: "envelope.meta.value.x".into(),
                    }],
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let result = add_operator_configs(&request, operators, &FixedRewriter);
        let f = &result[0];
        assert_eq!(f.input_topics[0].name, "local/D1/svc1");
        assert_eq!(f.input_topics[0].mappings[0].source.as_deref(), Some("value.x"));
    }

    fn fog_pipeline() -> Pipeline {
        Pipeline {
            id: crate::ids::PipelineId::new(),
            flow_id: "flow-1".into(),
            name: String::new(),
            description: String::new(),
            image: String::new(),
            window_time: 0,
            merge_strategy: String::new(),
            consume_all_messages: false,
            metrics: false,
            operators: vec![Operator {
                id: OperatorId::from("F"),
                application_id: ApplicationId::new(),
                name: "filter".into(),
                operator_id: "op3".into(),
                image_id: "registry/filter:1".into(),
                deployment_type: DeploymentType::Local,
                config: HashMap::new(),
                output_topic: "fog-filter-F".into(),
                persist_data: false,
                input_topics: vec![InputTopic {
                    name: "fog-sum-A".into(),
                    filter_type: FilterType::OperatorId,
                    filter_value: "A".into(),
                    filter_value2: None,
                    mappings: vec![],
                }],
                input_selections: vec![],
                cost: 0.0,
                upstream_config: UpstreamConfig::default(),
                downstream_config: DownstreamConfig::default(),
            }],
        }
    }

    #[test]
    fn finalize_fog_topics_suffixes_output_and_operator_input_topics() {
        let mut pipeline = fog_pipeline();
        let pipeline_id = pipeline.id;
        finalize_fog_topics(&mut pipeline);

        let op = &pipeline.operators[0];
        assert!(op.output_topic.ends_with(&pipeline_id.to_string()));
        assert!(op.input_topics[0].name.ends_with(&pipeline_id.to_string()));
    }

    #[test]
    fn finalize_fog_topics_is_idempotent() {
        let mut pipeline = fog_pipeline();
        finalize_fog_topics(&mut pipeline);
        let once = pipeline.operators[0].output_topic.clone();
        finalize_fog_topics(&mut pipeline);
        assert_eq!(pipeline.operators[0].output_topic, once);
    }

    #[test]
    fn rotate_application_ids_only_when_offset_policy_changes() {
        let mut pipeline = fog_pipeline();
        let original = pipeline.operators[0].application_id;

        rotate_application_ids_on_offset_change(&mut pipeline, pipeline.consume_all_messages);
        assert_eq!(pipeline.operators[0].application_id, original);

        pipeline.consume_all_messages = true;
        rotate_application_ids_on_offset_change(&mut pipeline, false);
        assert_ne!(pipeline.operators[0].application_id, original);
    }

    #[test]
    fn regenerate_missing_application_ids_backfills_nil_ids_only() {
        let mut pipeline = fog_pipeline();
        let original = pipeline.operators[0].application_id;
        pipeline.operators[0].application_id = ApplicationId::nil();

        regenerate_missing_application_ids(&mut pipeline);
        assert!(!pipeline.operators[0].application_id.is_nil());
        assert_ne!(pipeline.operators[0].application_id, original);
    }
}
