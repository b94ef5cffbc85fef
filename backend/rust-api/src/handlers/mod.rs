use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::content_service::QuestionBank;
use crate::services::AppState;

/// Degraded when the question bank cannot fill one quiz.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let questions = state.content.get_all().len();
    let sample_size = state.config.quiz.sample_size;
    let bank_ready = sample_size > 0 && questions >= sample_size;

    let mut content = serde_json::Map::new();
    content.insert(
        "status".to_string(),
        json!(if bank_ready { "healthy" } else { "unhealthy" }),
    );
    content.insert("questions".to_string(), json!(questions));
    content.insert("sample_size".to_string(), json!(sample_size));
    content.insert("terms".to_string(), json!(state.content.search_terms(None, None).len()));
    content.insert("videos".to_string(), json!(state.content.video_count()));

    let status_code = if bank_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if bank_ready { "healthy" } else { "degraded" },
            "service": "cyberaware-api",
            "version": env!("CARGO_PKG_VERSION"),
            "active_sessions": metrics::QUIZ_SESSIONS_ACTIVE.get(),
            "dependencies": { "content": content }
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects /metrics with HTTP Basic Auth (`METRICS_AUTH=user:password`).
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());
    if credentials != expected {
        tracing::warn!("Rejected /metrics request with wrong credentials");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

pub mod auth;
pub mod glossary;
pub mod quiz;
pub mod sse;
pub mod videos;
