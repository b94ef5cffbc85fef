use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    extractors::ValidJson,
    metrics::track_identity_call,
    middlewares::auth::bearer_token,
    models::user::{SignInRequest, SignUpRequest, SignUpResponse, UserProfile},
    services::{
        identity_service::{Identity, IdentityError, SignUpOutcome},
        AppState,
    },
};

/// POST /api/v1/auth/signin
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<SignInRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Sign-in attempt for {}", req.email);

    match track_identity_call("signin", state.identity.sign_in(&req)).await {
        Ok(session) => Ok((StatusCode::OK, Json(session))),
        Err(IdentityError::Rejected { message, .. }) => {
            tracing::warn!("Sign-in rejected for {}: {}", req.email, message);
            Err((StatusCode::UNAUTHORIZED, message))
        }
        Err(e) => {
            tracing::error!("Sign-in failed: {}", e);
            Err(e.into())
        }
    }
}

/// POST /api/v1/auth/signup
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<SignUpRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Registering new user: {}", req.email);

    let outcome = track_identity_call("signup", state.identity.sign_up(&req))
        .await
        .map_err(|e| {
            tracing::warn!("Sign-up failed for {}: {}", req.email, e);
            <(StatusCode, String)>::from(e)
        })?;

    let (status, body) = match outcome {
        SignUpOutcome::SignedIn(session) => (
            StatusCode::CREATED,
            SignUpResponse {
                user: session.user.clone(),
                session: Some(session),
                confirmation_required: false,
            },
        ),
        SignUpOutcome::ConfirmationRequired(user) => (
            StatusCode::ACCEPTED,
            SignUpResponse {
                user,
                session: None,
                confirmation_required: true,
            },
        ),
    };

    Ok((status, Json(body)))
}

/// POST /api/v1/auth/signout (protected)
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = bearer_token(&headers).ok_or((
        StatusCode::UNAUTHORIZED,
        "Missing authorization token".to_string(),
    ))?;

    track_identity_call("signout", state.identity.sign_out(token))
        .await
        .map_err(|e| {
            tracing::error!("Sign-out failed: {}", e);
            <(StatusCode, String)>::from(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me (protected)
pub async fn get_current_user(
    identity: Identity,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let claims = identity
        .claims()
        .ok_or((StatusCode::UNAUTHORIZED, "Not signed in".to_string()))?;

    tracing::debug!("Getting current user profile for user_id: {}", claims.sub);

    Ok(Json(UserProfile::new(
        claims.sub.clone(),
        claims.email.clone().unwrap_or_default(),
        None,
    )))
}
