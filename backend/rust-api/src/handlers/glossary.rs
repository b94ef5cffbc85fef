use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    models::content::{GlossaryListResponse, GlossaryQuery},
    services::AppState,
};

/// GET /api/v1/glossary?q=&category=
pub async fn list_terms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GlossaryQuery>,
) -> impl IntoResponse {
    let terms: Vec<_> = state
        .content
        .search_terms(query.q.as_deref(), query.category.as_deref())
        .into_iter()
        .cloned()
        .collect();

    Json(GlossaryListResponse {
        total: terms.len(),
        terms,
    })
}

/// GET /api/v1/glossary/categories
pub async fn list_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.content.term_categories())
}

/// GET /api/v1/glossary/{id}
pub async fn get_term(
    State(state): State<Arc<AppState>>,
    Path(term_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .content
        .term(&term_id)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("Term '{}' not found", term_id)))
}
