//! Callback API Handler

use axum::{Json, extract::State};
use montage_core::dto::callback::CallbackPayload;
use montage_core::dto::node::NodeRecord;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /callback
/// Completion signal from the compute service
pub async fn receive_callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackPayload>,
) -> ApiResult<Json<NodeRecord>> {
    tracing::info!(
        "Callback for node {} from {}",
        payload.node_id,
        payload.executor_type
    );

    let node = state.callbacks.handle(payload).await?;
    Ok(Json(node.into()))
}
