//! Request handlers for the HTTP surface table in spec.md §6.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use flow_core::{PipelineId, PipelineStatus, PipelineStatusRequest};
use flow_engine::FlowEngine;

use crate::auth::Caller;
use crate::error::HttpError;

pub type SharedEngine = Arc<FlowEngine>;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn get_pipeline_status(
    State(engine): State<SharedEngine>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<PipelineStatus>, HttpError> {
    let pipeline_id = PipelineId::parse(&id).map_err(|_| HttpError::bad_request("malformed pipeline id"))?;
    let status = engine
        .get_pipeline_status(pipeline_id, &caller.user_id, &caller.token)
        .await
        .map_err(|e| HttpError::from_engine_error(e, false))?;
    Ok(Json(status))
}

pub async fn get_pipelines_status(
    State(engine): State<SharedEngine>,
    caller: Caller,
    Json(request): Json<PipelineStatusRequest>,
) -> Result<Json<Vec<PipelineStatus>>, HttpError> {
    let statuses = engine
        .get_pipelines_status(&request.ids, &caller.user_id, &caller.token)
        .await
        .map_err(|e| HttpError::from_engine_error(e, false))?;
    Ok(Json(statuses))
}

pub async fn start_pipeline(
    State(engine): State<SharedEngine>,
    caller: Caller,
    Json(request): Json<flow_core::PipelineRequest>,
) -> Result<Json<flow_core::Pipeline>, HttpError> {
    let pipeline = engine
        .start_pipeline(&request, &caller.user_id, &caller.token)
        .await
        .map_err(|e| HttpError::from_engine_error(e, false))?;
    Ok(Json(pipeline))
}

pub async fn update_pipeline(
    State(engine): State<SharedEngine>,
    caller: Caller,
    Json(request): Json<flow_core::PipelineRequest>,
) -> Result<Json<flow_core::Pipeline>, HttpError> {
    let pipeline = engine
        .update_pipeline(&request, &caller.user_id, &caller.token)
        .await
        .map_err(|e| HttpError::from_engine_error(e, false))?;
    Ok(Json(pipeline))
}

pub async fn delete_pipeline(
    State(engine): State<SharedEngine>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    let pipeline_id = PipelineId::parse(&id).map_err(|_| HttpError::bad_request("malformed pipeline id"))?;
    engine
        .delete_pipeline(pipeline_id, &caller.user_id, &caller.token)
        .await
        .map_err(|e| HttpError::from_engine_error(e, true))?;
    Ok(StatusCode::NO_CONTENT)
}
