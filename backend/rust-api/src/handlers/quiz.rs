use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::QuizError,
    extractors::AppJson,
    models::{AdvanceResponse, RecordAnswerRequest, ResultReport, SessionViewQuery},
    services::{
        identity_service::{Identity, IdentityProvider},
        quiz_session::Advance,
        report::build_report,
        AppState,
    },
};

fn reject(action: &str, err: QuizError) -> (StatusCode, String) {
    match &err {
        QuizError::Configuration(_) | QuizError::DataIntegrity(_) => {
            tracing::error!("Failed to {}: {}", action, err)
        }
        _ => tracing::warn!("Failed to {}: {}", action, err),
    }
    err.into()
}

/// POST /api/v1/quiz/sessions
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .start(&identity)
        .await
        .map_err(|e| reject("start quiz", e))?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/quiz/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionViewQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let view = state
        .sessions
        .view(session_id, &identity.current_subject_id(), query.explain)
        .await
        .map_err(|e| reject("load session", e))?;

    Ok(Json(view))
}

/// PUT /api/v1/quiz/sessions/{id}/answer
pub async fn record_answer(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<Uuid>,
    AppJson(req): AppJson<RecordAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::debug!(
        "Recording answer for session {}: position={}, option={}",
        session_id,
        req.position,
        req.option_index
    );

    let view = state
        .sessions
        .record_answer(
            session_id,
            &identity.current_subject_id(),
            req.position,
            req.option_index,
        )
        .await
        .map_err(|e| reject("record answer", e))?;

    Ok(Json(view))
}

/// POST /api/v1/quiz/sessions/{id}/advance
pub async fn advance(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (step, session) = state
        .sessions
        .advance(session_id, &identity.current_subject_id())
        .await
        .map_err(|e| reject("advance", e))?;

    Ok(Json(AdvanceResponse {
        finished: step == Advance::Finished,
        session,
    }))
}

/// POST /api/v1/quiz/sessions/{id}/finish
pub async fn finish(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let attempt = state
        .sessions
        .finish(session_id, &identity.current_subject_id())
        .await
        .map_err(|e| reject("finish quiz", e))?;

    Ok(Json(build_report(
        &attempt,
        state.config.quiz.report_policy(),
        &state.content,
    )))
}

/// GET /api/v1/quiz/sessions/{id}/result
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let attempt = state
        .sessions
        .attempt(session_id, &identity.current_subject_id())
        .await
        .map_err(|e| reject("load result", e))?;

    Ok(Json(build_report(
        &attempt,
        state.config.quiz.report_policy(),
        &state.content,
    )))
}

/// DELETE /api/v1/quiz/sessions/{id}
pub async fn abandon(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .sessions
        .abandon(session_id, &identity.current_subject_id())
        .await
        .map_err(|e| reject("abandon quiz", e))?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/quiz/results
pub async fn list_results(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !identity.is_authenticated() {
        return Err(reject("list results", QuizError::NotAuthenticated));
    }

    let policy = state.config.quiz.report_policy();
    let reports: Vec<ResultReport> = state
        .results
        .history(&identity.current_subject_id())
        .await
        .iter()
        .map(|attempt| build_report(attempt, policy, &state.content))
        .collect();

    Ok(Json(reports))
}
