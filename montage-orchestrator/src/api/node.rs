//! Node API Handlers
//!
//! Node definition and execution endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use montage_core::dto::node::{CreateNode, NodeRecord, UpdateNode};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

// =============================================================================
// Definition Endpoints
// =============================================================================

/// POST /node/create
pub async fn create_node(
    State(state): State<AppState>,
    Json(req): Json<CreateNode>,
) -> ApiResult<(StatusCode, Json<NodeRecord>)> {
    tracing::info!(
        "Creating {} node in pipeline: {}",
        req.node_type,
        req.pipeline_id
    );

    let node = state.nodes.create(req).await?;
    Ok((StatusCode::CREATED, Json(node.into())))
}

/// GET /node/{id}
pub async fn get_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NodeRecord>> {
    tracing::debug!("Getting node: {}", id);

    Ok(Json(state.nodes.get(id).await?.into()))
}

/// PATCH /node/{id}
pub async fn update_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNode>,
) -> ApiResult<Json<NodeRecord>> {
    tracing::info!("Updating node: {}", id);

    Ok(Json(state.nodes.update(id, req).await?.into()))
}

/// DELETE /node/{id}
/// Delete a node, detaching it from every node that references it
pub async fn delete_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting node: {}", id);

    state.nodes.destroy(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Execution Endpoints
// =============================================================================

/// POST /node/{id}/validate
pub async fn validate_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NodeRecord>> {
    tracing::debug!("Validating node: {}", id);

    Ok(Json(state.nodes.validate(id).await?.into()))
}

/// POST /node/{id}/execute
/// Start execution; the response is the node as it was when accepted
pub async fn execute_node(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<NodeRecord>)> {
    tracing::info!("Execute requested for node: {}", id);

    let node = state.nodes.execute(id).await?;
    Ok((StatusCode::ACCEPTED, Json(node.into())))
}
