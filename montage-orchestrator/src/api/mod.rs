//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod callback;
pub mod error;
pub mod health;
pub mod node;
pub mod pipeline;
pub mod schema;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::callback::CallbackProcessor;
use crate::service::{NodeService, PipelineService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub nodes: Arc<NodeService>,
    pub pipelines: Arc<PipelineService>,
    pub callbacks: Arc<CallbackProcessor>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/create", post(pipeline::create_pipeline))
        .route(
            "/pipeline/{id}",
            get(pipeline::get_pipeline).delete(pipeline::delete_pipeline),
        )
        .route("/pipeline/{id}/progress", get(pipeline::get_progress))
        // Node endpoints
        .route("/node/create", post(node::create_node))
        .route(
            "/node/{id}",
            get(node::get_node)
                .patch(node::update_node)
                .delete(node::delete_node),
        )
        .route("/node/{id}/validate", post(node::validate_node))
        .route("/node/{id}/execute", post(node::execute_node))
        // Schema endpoints
        .route("/schema", get(schema::list_schemas))
        .route("/schema/{type}", get(schema::get_schema))
        // Compute callbacks
        .route("/callback", post(callback::receive_callback))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
