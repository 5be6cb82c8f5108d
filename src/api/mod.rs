use crate::state::AppState;
use axum::routing::{any, get};
use axum::Router;
use std::sync::Arc;

pub mod common;
mod learn;
mod metadata;
mod odata;

pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // One handler for everything under the feed; the pipeline in
        // odata.rs owns the method/auth/endpoint ordering.
        .route("/odatafeed", any(odata::handle_odata))
        .route("/odatafeed/*path", any(odata::handle_odata))
        // Health
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}
