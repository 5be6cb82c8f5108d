//! The proxy pipeline for `/odatafeed/...` requests.

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::Response;
use bytes::Bytes;
use std::sync::Arc;

use super::{common, learn, metadata};
use crate::core::catalog::CATALOG;
use crate::core::policy::FORBIDDEN_OWNERS;
use crate::proxy::error_mapper;
use crate::proxy::redact::redact_body;
use crate::proxy::sanitize::sanitize_query;
use crate::state::AppState;

/// One entry point for every method and path under `/odatafeed`, so the
/// gate ordering (CORS, method, credential, then everything else) is
/// explicit in one place.
pub async fn handle_odata(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    // 1. CORS preflight
    if method == Method::OPTIONS {
        return common::preflight();
    }

    // 2. Method gate
    if method != Method::GET {
        return common::error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    // 3. Short-key check, before any upstream I/O
    let key = match bearer_token(&headers) {
        Some(k) => k,
        None => {
            return common::error_response(
                StatusCode::UNAUTHORIZED,
                "Missing or invalid Authorization header",
            )
        }
    };
    if key != state.config.proxy_api_key {
        return common::error_response(StatusCode::UNAUTHORIZED, "Invalid API key");
    }

    // 4. Introspection endpoints
    let path = uri.path();
    if path == "/odatafeed/$metadata-summary" {
        return metadata::summary_response();
    }
    if path == "/odatafeed/$learn-summary" {
        return learn::summary_response(&state, uri.query().unwrap_or("")).await;
    }

    // 5-6. Normalise the entity segment
    let rest = path
        .strip_prefix("/odatafeed")
        .unwrap_or("")
        .trim_start_matches('/');
    let (segment, remainder) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    let entity = if segment.is_empty() || segment.starts_with('$') {
        segment
    } else {
        CATALOG.alias_for(segment).unwrap_or(segment)
    };

    // 7. Upstream JWT
    let jwt = match state.token_manager.acquire().await {
        Ok(token) => token,
        Err(e) => {
            return common::error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get Bloxs token: {}", e),
            )
        }
    };

    // 8. Query sanitisation
    let entity_name = (!entity.is_empty() && !entity.starts_with('$')).then_some(entity);
    let sanitized = sanitize_query(entity_name, uri.query().unwrap_or(""), &CATALOG);

    // 9. Guardrail: mandatory $filter, checked before touching the upstream
    if let Some(name) = entity_name {
        if CATALOG.requires_filter(name) && !sanitized.has_filter {
            return common::error_response(
                StatusCode::BAD_REQUEST,
                format!(
                    "{} requires a $filter; results are capped at $top={}. Add a filter and retry.",
                    name,
                    CATALOG.top_cap_for(name)
                ),
            );
        }
    }

    // 10. Forward to the upstream feed
    let url = format!(
        "{}/odatafeed/{}{}{}",
        state.config.bloxs_base_url, entity, remainder, sanitized.query
    );
    let upstream = match state
        .http
        .get(&url)
        .bearer_auth(&jwt)
        .header(header::ACCEPT, "application/json")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            return common::error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to fetch from Bloxs: {}", e),
            )
        }
    };

    let status = upstream.status();
    let body = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            return common::error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to fetch from Bloxs: {}", e),
            )
        }
    };

    // 11. Upstream errors keep their status, wrapped in the error envelope
    if !status.is_success() {
        let envelope = error_mapper::upstream_error_body(status.as_u16(), &body, entity, &CATALOG);
        let status =
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return common::json_response(status, envelope);
    }

    // 12. Redact, then hand the body to the learner off the response path
    let body = match redact_body(&body, &FORBIDDEN_OWNERS) {
        Some(redacted) => Bytes::from(redacted),
        None => body,
    };

    if state.learner.is_active() && entity_name.is_some() {
        let learner = state.learner.clone();
        let entity = entity.to_string();
        let observed = body.clone();
        tokio::spawn(async move {
            learner.observe(&entity, &observed).await;
        });
    }

    common::passthrough_response(body)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::HeaderValue;
    use chrono::Utc;

    use crate::core::config::ProxyConfig;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_requires_the_scheme() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with("bearer abc")), None);
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Some("abc"));
    }

    /// The base URL points at a closed port, so any attempt to reach the
    /// auth endpoint or the feed surfaces as a 500/502 instead of the
    /// status under test.
    async fn test_state() -> Arc<AppState> {
        let config = ProxyConfig {
            proxy_api_key: "shortkey".to_string(),
            bloxs_api_key: String::new(),
            bloxs_api_secret: String::new(),
            bloxs_base_url: "http://127.0.0.1:9".to_string(),
            enable_learning: false,
            learning_kv: None,
        };
        Arc::new(AppState::new(config).await.unwrap())
    }

    async fn call(state: Arc<AppState>, method: Method, uri: &str, headers: HeaderMap) -> Response {
        handle_odata(State(state), method, uri.parse().unwrap(), headers).await
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_key_is_rejected_before_any_upstream_io() {
        let response = call(
            test_state().await,
            Method::GET,
            "/odatafeed/Units",
            HeaderMap::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_text(response).await;
        assert!(body.contains("Missing or invalid Authorization header"));
    }

    #[tokio::test]
    async fn wrong_key_is_rejected_before_any_upstream_io() {
        let response = call(
            test_state().await,
            Method::GET,
            "/odatafeed/Units",
            headers_with("Bearer wrong"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_text(response).await;
        assert!(body.contains("Invalid API key"));
    }

    #[tokio::test]
    async fn preflight_needs_no_credentials() {
        let response = call(
            test_state().await,
            Method::OPTIONS,
            "/odatafeed/Units",
            HeaderMap::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn write_methods_are_blocked() {
        let response = call(
            test_state().await,
            Method::POST,
            "/odatafeed/Units",
            headers_with("Bearer shortkey"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(body_text(response).await.contains("Method not allowed"));
    }

    #[tokio::test]
    async fn missing_mandatory_filter_fails_without_touching_the_feed() {
        let state = test_state().await;
        state
            .token_manager
            .prime("jwt", Utc::now().timestamp_millis() + 3_600_000)
            .await;
        let response = call(
            state,
            Method::GET,
            "/odatafeed/FinancialMutations?$top=10",
            headers_with("Bearer shortkey"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_text(response).await;
        assert!(body.contains("FinancialMutations"));
        assert!(body.contains("100"));
    }
}
