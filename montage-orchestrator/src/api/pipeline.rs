//! Pipeline API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use montage_core::domain::pipeline::Pipeline;
use montage_core::dto::pipeline::{CreatePipeline, PipelineProgress};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /pipeline/create
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<Pipeline>)> {
    tracing::info!("Creating pipeline: {}", req.title);

    let pipeline = state.pipelines.create(req).await?;
    Ok((StatusCode::CREATED, Json(pipeline)))
}

/// GET /pipeline/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    Ok(Json(state.pipelines.get(id).await?))
}

/// DELETE /pipeline/{id}
/// Delete a pipeline and all of its nodes
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    state.pipelines.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /pipeline/{id}/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineProgress>> {
    tracing::debug!("Getting progress of pipeline: {}", id);

    Ok(Json(state.pipelines.progress(id).await?))
}
