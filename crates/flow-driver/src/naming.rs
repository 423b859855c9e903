//! Deterministic resource name generation (mirrors `getOperatorName` in
//! `kubernetes-api/api.go`: one Deployment per pipeline, one PVC/VPA
//! checkpoint per persistent operator).
//!
//! Names must be stable across repeated calls (create is idempotent, delete
//! needs to find what create made).

use flow_core::{CatalogId, OperatorId, PipelineId};

/// Pipeline-scoped label applied to the Deployment's pods, used as the
/// Deployment's own selector (`Selector.MatchLabels: {"pipelineId": ...}`).
pub const PIPELINE_ID_LABEL: &str = "pipelineId";

/// The one Deployment holding every cloud operator's container for this
/// pipeline.
pub fn deployment_name(pipeline_id: PipelineId) -> String {
    format!("pipeline-{pipeline_id}")
}

/// Per-operator PVC name, only allocated for operators with `persistData`
/// set. Keyed by the operator's node ID (`operator.Id`), truncated to its
/// first 8 characters verbatim, not the catalog/image ID.
pub fn pvc_name(pipeline_id: PipelineId, operator_id: &OperatorId) -> String {
    let prefix: String = operator_id.0.chars().take(8).collect();
    format!("operator-{pipeline_id}-{prefix}")
}

/// Container name within the pipeline Deployment: catalog ID joined to the
/// operator's node ID (`operator.OperatorId + "--" + operator.Id`).
pub fn container_name(catalog_id: &CatalogId, operator_id: &OperatorId) -> String {
    format!("{catalog_id}--{operator_id}")
}

/// VerticalPodAutoscaler name for the pipeline's Deployment.
pub fn vpa_name(pipeline_id: PipelineId) -> String {
    format!("{}-vpa", deployment_name(pipeline_id))
}

/// VerticalPodAutoscalerCheckpoint name for one operator's container,
/// deleted alongside the VPA on teardown. `container_name` is read back
/// from the live Deployment rather than recomputed, since teardown is only
/// ever given a pipeline ID and not the operator list that produced it.
pub fn vpa_checkpoint_name(pipeline_id: PipelineId, container_name: &str) -> String {
    format!("{}-vpa-{container_name}", deployment_name(pipeline_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_name_is_deterministic() {
        let pipeline_id = PipelineId::new();
        assert_eq!(deployment_name(pipeline_id), deployment_name(pipeline_id));
    }

    #[test]
    fn deployment_name_embeds_the_full_pipeline_id() {
        let pipeline_id = PipelineId::new();
        assert_eq!(deployment_name(pipeline_id), format!("pipeline-{pipeline_id}"));
    }

    #[test]
    fn pvc_name_truncates_the_operator_id_to_eight_raw_characters() {
        let pipeline_id = PipelineId::new();
        let operator_id = OperatorId::from("ABCDEFGHIJKLMNOP");
        assert_eq!(pvc_name(pipeline_id, &operator_id), format!("operator-{pipeline_id}-ABCDEFGH"));
    }

    #[test]
    fn container_name_joins_catalog_and_operator_id() {
        let catalog_id = CatalogId::from("sum-operator");
        let operator_id = OperatorId::from("node-1");
        assert_eq!(container_name(&catalog_id, &operator_id), "sum-operator--node-1");
    }

    #[test]
    fn vpa_checkpoint_name_nests_under_the_vpa_name() {
        let pipeline_id = PipelineId::new();
        let container = container_name(&CatalogId::from("sum-operator"), &OperatorId::from("node-1"));
        let checkpoint = vpa_checkpoint_name(pipeline_id, &container);
        assert!(checkpoint.starts_with(&vpa_name(pipeline_id)));
        assert!(checkpoint.ends_with("sum-operator--node-1"));
    }
}
