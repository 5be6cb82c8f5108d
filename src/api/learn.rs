//! `$learn-summary`: read access to the learned schema records.

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;
use url::form_urlencoded;

use super::common;
use crate::state::AppState;

pub async fn summary_response(state: &AppState, raw_query: &str) -> Response {
    let learner = &state.learner;
    if !learner.enabled() {
        return common::error_response(
            StatusCode::BAD_REQUEST,
            "Learning is disabled. Set ENABLE_LEARNING=true to activate schema learning.",
        );
    }
    if !learner.has_store() {
        return common::error_response(
            StatusCode::BAD_REQUEST,
            "Learning is enabled but no KV store is configured. Set LEARNING_KV to a writable database path.",
        );
    }

    let entity = form_urlencoded::parse(raw_query.as_bytes())
        .find(|(key, _)| key == "entity")
        .map(|(_, value)| value.into_owned());

    if let Some(entity) = entity {
        return match learner.record_for(&entity).await {
            Ok(record) => common::json_response(StatusCode::OK, json!({ "record": record })),
            Err(e) => common::error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
        };
    }

    match learner.index().await {
        Ok(index) => {
            let records = learner.records(&index.entities).await;
            common::json_response(
                StatusCode::OK,
                json!({
                    "learningEnabled": true,
                    "entityCount": index.entities.len(),
                    "entities": index.entities,
                    "records": records,
                }),
            )
        }
        Err(e) => common::error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}
