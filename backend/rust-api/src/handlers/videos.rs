use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    models::content::{VideoListResponse, VideoQuery},
    services::{
        identity_service::{Identity, IdentityProvider},
        AppState,
    },
};

/// GET /api/v1/videos?category=
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VideoQuery>,
) -> impl IntoResponse {
    let videos = state
        .content
        .videos(query.category.as_deref())
        .into_iter()
        .cloned()
        .collect();

    Json(VideoListResponse {
        videos,
        categories: state.content.video_categories(),
    })
}

/// GET /api/v1/videos/{id}
pub async fn get_video(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .content
        .video(&video_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| video_not_found(&video_id))
}

fn video_not_found(video_id: &str) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("Video '{}' not found", video_id),
    )
}

/// GET /api/v1/videos/progress (protected)
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> impl IntoResponse {
    let progress = state
        .progress
        .progress(&identity.current_subject_id(), &state.content)
        .await;
    Json(progress)
}

/// PUT /api/v1/videos/{id}/watched (protected)
pub async fn mark_watched(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.content.video(&video_id).is_none() {
        return Err(video_not_found(&video_id));
    }

    let subject = identity.current_subject_id();
    state.progress.mark_watched(&subject, &video_id).await;
    Ok(Json(state.progress.progress(&subject, &state.content).await))
}

/// DELETE /api/v1/videos/{id}/watched (protected)
pub async fn unmark_watched(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.content.video(&video_id).is_none() {
        return Err(video_not_found(&video_id));
    }

    let subject = identity.current_subject_id();
    state.progress.unmark_watched(&subject, &video_id).await;
    Ok(Json(state.progress.progress(&subject, &state.content).await))
}

/// POST /api/v1/videos/{id}/watched/toggle (protected)
pub async fn toggle_watched(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if state.content.video(&video_id).is_none() {
        return Err(video_not_found(&video_id));
    }

    let subject = identity.current_subject_id();
    let watched = state.progress.toggle_watched(&subject, &video_id).await;
    tracing::debug!("Video {} watched={} for {}", video_id, watched, subject);
    Ok(Json(state.progress.progress(&subject, &state.content).await))
}
