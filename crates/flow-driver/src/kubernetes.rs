//! Production [`Driver`] backed by the Kubernetes API (spec.md §4.3).
//!
//! One pipeline gets one `Deployment`, one container per cloud operator
//! inside it, and one `VerticalPodAutoscaler` targeting that deployment.
//! Operators with `persistData` set also get a `PersistentVolumeClaim`
//! mounted into their container. Resource requests/limits are fixed, not
//! configurable, matching `original_source/pkg/kubernetes-api/api.go`'s own
//! hardcoded sizing rather than inventing a policy the spec doesn't ask for.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, ResourceRequirements, Volume,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, ObjectMeta, Patch,
    PatchParams, PropagationPolicy,
};
use kube::Client;
use serde::Serialize;

use flow_core::{EngineError, EngineResult, InputTopic, Operator, Pipeline, PipelineConfig, PipelineId, PipelineStatus};

use crate::contract::Driver;
use crate::naming::{container_name, deployment_name, pvc_name, vpa_checkpoint_name, vpa_name, PIPELINE_ID_LABEL};

const CPU_REQUEST: &str = "100m";
const CPU_LIMIT: &str = "500m";
const MEMORY_REQUEST: &str = "128Mi";
const MEMORY_LIMIT: &str = "512Mi";

const PVC_STORAGE: &str = "50M";
const PVC_MOUNT_PATH: &str = "/opt/data";

const VPA_MAX_CPU: &str = "1000m";
const VPA_MAX_MEMORY: &str = "4000Mi";

const METRICS_BASE_PORT: i32 = 8080;

/// Mirrors the original service's `lib.OperatorRequestConfig`: an
/// operator's config map and its resolved input topics, serialized
/// together into one `CONFIG` environment variable.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OperatorRequestConfig<'a> {
    config: &'a HashMap<String, String>,
    input_topics: &'a [InputTopic],
}

fn vpa_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk("autoscaling.k8s.io", "v1", "VerticalPodAutoscaler"))
}

fn vpa_checkpoint_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        "autoscaling.k8s.io",
        "v1",
        "VerticalPodAutoscalerCheckpoint",
    ))
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

pub struct KubernetesDriver {
    client: Client,
    namespace: String,
    zookeeper: String,
    storage_class: String,
}

impl KubernetesDriver {
    pub fn new(client: Client, namespace: impl Into<String>, zookeeper: impl Into<String>, storage_class: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            zookeeper: zookeeper.into(),
            storage_class: storage_class.into(),
        }
    }

    fn deployments(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pvcs(&self) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn vpas(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &vpa_api_resource())
    }

    fn vpa_checkpoints(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &vpa_checkpoint_api_resource())
    }

    fn resource_requirements(&self) -> ResourceRequirements {
        let mut requests = BTreeMap::new();
        requests.insert("cpu".to_string(), Quantity(CPU_REQUEST.to_string()));
        requests.insert("memory".to_string(), Quantity(MEMORY_REQUEST.to_string()));
        let mut limits = BTreeMap::new();
        limits.insert("cpu".to_string(), Quantity(CPU_LIMIT.to_string()));
        limits.insert("memory".to_string(), Quantity(MEMORY_LIMIT.to_string()));
        ResourceRequirements {
            requests: Some(requests),
            limits: Some(limits),
            ..Default::default()
        }
    }

    fn build_pvc(&self, pipeline_id: PipelineId, operator: &Operator) -> PersistentVolumeClaim {
        let name = pvc_name(pipeline_id, &operator.id);
        let mut requests = BTreeMap::new();
        requests.insert("storage".to_string(), Quantity(PVC_STORAGE.to_string()));

        let mut labels = BTreeMap::new();
        labels.insert(PIPELINE_ID_LABEL.to_string(), pipeline_id.to_string());

        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(requests),
                    ..Default::default()
                }),
                storage_class_name: if self.storage_class.is_empty() {
                    None
                } else {
                    Some(self.storage_class.clone())
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// `CreateOperators`' per-operator env set (`api.go:86-138`): every
    /// name and value here is load-bearing — the operator images read
    /// these exact variables, not a renamed equivalent.
    fn env_vars(&self, pipeline_id: PipelineId, config: &PipelineConfig, operator: &Operator, index: usize) -> (Vec<EnvVar>, Vec<ContainerPort>) {
        let request_config = OperatorRequestConfig {
            config: &operator.config,
            input_topics: &operator.input_topics,
        };
        let config_json = serde_json::to_string(&request_config).unwrap_or_default();

        let mut env: Vec<EnvVar> = vec![
            ("ZK_QUORUM", self.zookeeper.clone()),
            ("CONFIG_APPLICATION_ID", format!("analytics-{}", operator.application_id)),
            ("PIPELINE_ID", pipeline_id.to_string()),
            ("OPERATOR_ID", operator.id.to_string()),
            ("WINDOW_TIME", config.window_time.to_string()),
            ("JOIN_STRATEGY", config.merge_strategy.clone()),
            ("CONFIG", config_json),
            ("DEVICE_ID_PATH", "device_id".to_string()),
            ("CONSUMER_AUTO_OFFSET_RESET_CONFIG", config.consumer_offset.to_string()),
            ("USER_ID", config.user_id.clone()),
        ]
        .into_iter()
        .map(|(name, value)| EnvVar {
            name: name.to_string(),
            value: Some(value),
            ..Default::default()
        })
        .collect();

        let mut ports = Vec::new();
        if config.metrics {
            let metrics_port = METRICS_BASE_PORT + index as i32;
            env.push(EnvVar {
                name: "METRICS".to_string(),
                value: Some("true".to_string()),
                ..Default::default()
            });
            env.push(EnvVar {
                name: "METRICS_PORT".to_string(),
                value: Some(metrics_port.to_string()),
                ..Default::default()
            });
            ports.push(ContainerPort {
                name: Some(format!("metrics-{index}")),
                container_port: metrics_port,
                ..Default::default()
            });
        }
        if !operator.output_topic.is_empty() {
            env.push(EnvVar {
                name: "OUTPUT".to_string(),
                value: Some(operator.output_topic.clone()),
                ..Default::default()
            });
        }

        (env, ports)
    }

    fn build_container(
        &self,
        pipeline_id: PipelineId,
        config: &PipelineConfig,
        operator: &Operator,
        index: usize,
        volume_mount: Option<VolumeMount>,
    ) -> Container {
        let (env, ports) = self.env_vars(pipeline_id, config, operator, index);
        Container {
            name: container_name(&operator.operator_id, &operator.id),
            image: Some(operator.image_id.clone()),
            image_pull_policy: Some("Always".to_string()),
            env: Some(env),
            ports: if ports.is_empty() { None } else { Some(ports) },
            volume_mounts: volume_mount.map(|mount| vec![mount]),
            resources: Some(self.resource_requirements()),
            ..Default::default()
        }
    }

    fn build_deployment(&self, pipeline: &Pipeline, config: &PipelineConfig, containers: Vec<Container>, volumes: Vec<Volume>) -> Deployment {
        let name = deployment_name(pipeline.id);

        let mut selector_labels = BTreeMap::new();
        selector_labels.insert(PIPELINE_ID_LABEL.to_string(), pipeline.id.to_string());

        let mut pod_labels = selector_labels.clone();
        pod_labels.insert("flowId".to_string(), pipeline.flow_id.to_string());
        pod_labels.insert("user".to_string(), config.user_id.clone());

        Deployment {
            metadata: ObjectMeta {
                name: Some(name),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: LabelSelector {
                    match_labels: Some(selector_labels),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(pod_labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers,
                        volumes: if volumes.is_empty() { None } else { Some(volumes) },
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn build_vpa(&self, pipeline_id: PipelineId, deployment_name: &str) -> DynamicObject {
        let name = vpa_name(pipeline_id);
        let mut vpa = DynamicObject::new(&name, &vpa_api_resource()).within(&self.namespace);
        vpa.data = serde_json::json!({
            "spec": {
                "targetRef": {"kind": "Deployment", "name": deployment_name},
                "updatePolicy": {"updateMode": "Auto"},
                "resourcePolicy": {
                    "containerPolicies": [{
                        "containerName": "*",
                        "maxAllowed": {"cpu": VPA_MAX_CPU, "memory": VPA_MAX_MEMORY},
                    }],
                },
            },
        });
        vpa
    }
}

#[async_trait]
impl Driver for KubernetesDriver {
    async fn create_operators(&self, pipeline: &Pipeline, config: &PipelineConfig) -> EngineResult<()> {
        let deployments = self.deployments();
        let pvcs = self.pvcs();
        let patch_params = PatchParams::apply("flow-engine").force();

        let mut containers = Vec::new();
        let mut volumes = Vec::new();

        for (index, operator) in pipeline.cloud_operators().enumerate() {
            let volume_mount = if operator.persist_data {
                let pvc = self.build_pvc(pipeline.id, operator);
                let volume_name = pvc.metadata.name.clone().unwrap_or_default();
                pvcs.patch(&volume_name, &patch_params, &Patch::Apply(&pvc))
                    .await
                    .map_err(|e| EngineError::internal(format!("create pvc {volume_name}"), e))?;
                volumes.push(Volume {
                    name: volume_name.clone(),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: volume_name.clone(),
                        ..Default::default()
                    }),
                    ..Default::default()
                });
                Some(VolumeMount {
                    name: volume_name,
                    mount_path: PVC_MOUNT_PATH.to_string(),
                    ..Default::default()
                })
            } else {
                None
            };

            containers.push(self.build_container(pipeline.id, config, operator, index, volume_mount));
        }

        let deployment = self.build_deployment(pipeline, config, containers, volumes);
        let name = deployment.metadata.name.clone().unwrap_or_default();
        tracing::debug!(pipeline_id = %pipeline.id, deployment = %name, "applying pipeline deployment");
        deployments
            .patch(&name, &patch_params, &Patch::Apply(&deployment))
            .await
            .map_err(|e| EngineError::internal(format!("create deployment {name}"), e))?;

        let vpa = self.build_vpa(pipeline.id, &name);
        let vpa_object_name = vpa.metadata.name.clone().unwrap_or_default();
        tracing::debug!(pipeline_id = %pipeline.id, vpa = %vpa_object_name, "applying vertical pod autoscaler");
        self.vpas()
            .patch(&vpa_object_name, &patch_params, &Patch::Apply(&vpa))
            .await
            .map_err(|e| EngineError::internal(format!("create vpa {vpa_object_name}"), e))?;

        Ok(())
    }

    async fn delete_operators(&self, pipeline_id: PipelineId) -> EngineResult<()> {
        let deployments = self.deployments();
        let pvcs = self.pvcs();
        let name = deployment_name(pipeline_id);

        // The container names baked into the live deployment are exactly
        // the suffixes its per-operator VPA checkpoints were named with
        // (`container_name`), so read them back rather than requiring the
        // caller to pass the operator list back in for teardown.
        let container_names: Vec<String> = match deployments.get(&name).await {
            Ok(existing) => existing
                .spec
                .and_then(|spec| spec.template.spec)
                .map(|pod_spec| pod_spec.containers.into_iter().map(|c| c.name).collect())
                .unwrap_or_default(),
            Err(err) if is_not_found(&err) => Vec::new(),
            Err(err) => return Err(EngineError::internal(format!("get deployment {name}"), err)),
        };

        let vpa_checkpoints = self.vpa_checkpoints();
        for container in &container_names {
            let checkpoint_name = vpa_checkpoint_name(pipeline_id, container);
            tracing::debug!(pipeline_id = %pipeline_id, checkpoint = %checkpoint_name, "deleting vpa checkpoint");
            match vpa_checkpoints.delete(&checkpoint_name, &DeleteParams::default()).await {
                Ok(_) => {}
                Err(err) if is_not_found(&err) => {}
                Err(err) => return Err(EngineError::internal(format!("delete vpa checkpoint {checkpoint_name}"), err)),
            }
        }

        let selector = format!("{PIPELINE_ID_LABEL}={pipeline_id}");
        let list_params = ListParams::default().labels(&selector);
        let found_pvcs = pvcs
            .list(&list_params)
            .await
            .map_err(|e| EngineError::internal("list operator pvcs", e))?;
        for item in found_pvcs.items {
            let Some(pvc_name) = item.metadata.name else { continue };
            tracing::debug!(pipeline_id = %pipeline_id, pvc = %pvc_name, "deleting pvc");
            match pvcs.delete(&pvc_name, &DeleteParams::default()).await {
                Ok(_) => {}
                Err(err) if is_not_found(&err) => {}
                Err(err) => return Err(EngineError::internal(format!("delete pvc {pvc_name}"), err)),
            }
        }

        tracing::debug!(pipeline_id = %pipeline_id, deployment = %name, "deleting deployment");
        let delete_params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..Default::default()
        };
        match deployments.delete(&name, &delete_params).await {
            Ok(_) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(EngineError::internal(format!("delete deployment {name}"), err)),
        }

        let vpa_object_name = vpa_name(pipeline_id);
        tracing::debug!(pipeline_id = %pipeline_id, vpa = %vpa_object_name, "deleting vpa");
        match self.vpas().delete(&vpa_object_name, &DeleteParams::default()).await {
            Ok(_) => {}
            Err(err) if is_not_found(&err) => {}
            Err(err) => return Err(EngineError::internal(format!("delete vpa {vpa_object_name}"), err)),
        }

        Ok(())
    }

    async fn get_pipeline_status(&self, pipeline_id: PipelineId) -> EngineResult<PipelineStatus> {
        let deployments = self.deployments();
        let name = deployment_name(pipeline_id);

        match deployments.get(&name).await {
            Ok(deployment) => Ok(status_from_deployment(&name, &deployment)),
            Err(err) if is_not_found(&err) => Ok(PipelineStatus {
                name,
                running: false,
                transitioning: false,
                message: "no workloads found".to_string(),
            }),
            Err(err) => Err(EngineError::internal(format!("get deployment {name}"), err)),
        }
    }

    async fn get_pipelines_status(
        &self,
        pipeline_ids: &[PipelineId],
    ) -> EngineResult<HashMap<PipelineId, PipelineStatus>> {
        let mut result = HashMap::new();
        for &pipeline_id in pipeline_ids {
            result.insert(pipeline_id, self.get_pipeline_status(pipeline_id).await?);
        }
        Ok(result)
    }
}

fn status_from_deployment(name: &str, deployment: &Deployment) -> PipelineStatus {
    let status = deployment.status.clone().unwrap_or_default();
    let available = status.available_replicas.unwrap_or(0);
    let unavailable = status.unavailable_replicas.unwrap_or(0);
    PipelineStatus {
        name: name.to_string(),
        running: available > 0 && unavailable == 0,
        transitioning: unavailable > 0,
        message: String::new(),
    }
}
