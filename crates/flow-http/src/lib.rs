//! HTTP surface for the flow engine (spec.md §6): health, pipeline CRUD, and
//! batch status, fronted by a CORS layer permissive enough for the browser
//! clients that call this API directly.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use flow_engine::FlowEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::SharedEngine;

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
}

/// Build the router, nested under `url_prefix` (empty string for none).
pub fn build_router(engine: Arc<FlowEngine>, url_prefix: &str) -> Router {
    let api = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/pipeline/:id", get(handlers::get_pipeline_status).delete(handlers::delete_pipeline))
        .route("/pipelines", post(handlers::get_pipelines_status))
        .route("/pipeline", post(handlers::start_pipeline).put(handlers::update_pipeline))
        .with_state(engine)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    let prefix = url_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    }
}
