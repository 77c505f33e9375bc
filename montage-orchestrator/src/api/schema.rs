//! Schema API Handlers

use axum::{Json, extract::Path};
use montage_core::domain::node::NodeType;
use montage_core::schema::{NodeSchema, lookup, schema_for};

use crate::api::error::{ApiError, ApiResult};

/// GET /schema
pub async fn list_schemas() -> Json<Vec<&'static NodeSchema>> {
    Json(NodeType::ALL.into_iter().map(schema_for).collect())
}

/// GET /schema/{type}
pub async fn get_schema(Path(node_type): Path<String>) -> ApiResult<Json<&'static NodeSchema>> {
    lookup(&node_type)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown node type: {}", node_type)))
}
