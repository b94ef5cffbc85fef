#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use cyberaware_api::{
    config::{Config, QuizSettings, DEFAULT_JWT_AUDIENCE},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::user::{AuthSession, SignInRequest, SignUpRequest, UserProfile},
    services::{
        content_service::ContentService,
        identity_service::{IdentityClient, IdentityError, SignUpOutcome},
        result_sink::InMemoryResultSink,
        AppState,
    },
};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const GOOD_PASSWORD: &str = "correct-horse";

pub fn content_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("content")
}

pub fn test_config(quiz: QuizSettings) -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        jwt_audience: DEFAULT_JWT_AUDIENCE.to_string(),
        identity_url: "http://identity.invalid".to_string(),
        identity_anon_key: "anon".to_string(),
        identity_max_attempts: 1,
        content_dir: content_dir(),
        quiz,
    }
}

/// Stands in for the external identity service.
pub struct StubIdentity;

#[async_trait]
impl IdentityClient for StubIdentity {
    async fn sign_in(&self, request: &SignInRequest) -> Result<AuthSession, IdentityError> {
        if request.password != GOOD_PASSWORD {
            return Err(IdentityError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        let user_id = user_id_for(&request.email);
        Ok(AuthSession {
            access_token: token_for(&user_id),
            refresh_token: Some("refresh".to_string()),
            expires_in: Some(3600),
            user: UserProfile::new(user_id, request.email.clone(), None),
        })
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, IdentityError> {
        if request.email.starts_with("taken@") {
            return Err(IdentityError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        if request.email.starts_with("down@") {
            return Err(IdentityError::Unavailable("connection refused".to_string()));
        }

        let user_id = user_id_for(&request.email);
        let user = UserProfile::new(
            user_id.clone(),
            request.email.clone(),
            request.username.clone(),
        );
        if request.email.starts_with("confirm@") {
            return Ok(SignUpOutcome::ConfirmationRequired(user));
        }
        Ok(SignUpOutcome::SignedIn(AuthSession {
            access_token: token_for(&user_id),
            refresh_token: None,
            expires_in: Some(3600),
            user,
        }))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
        Ok(())
    }
}

fn user_id_for(email: &str) -> String {
    format!("user-{}", email.split('@').next().unwrap_or(email))
}

/// Access token as the identity service would issue it for `user_id`.
pub fn token_for(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    JwtService::new(TEST_SECRET, DEFAULT_JWT_AUDIENCE)
        .generate_token(JwtClaims {
            sub: user_id.to_string(),
            email: Some(format!("{}@uni.edu", user_id)),
            role: Some("authenticated".to_string()),
            aud: Some(DEFAULT_JWT_AUDIENCE.to_string()),
            exp: (now + 3600) as usize,
            iat: now as usize,
        })
        .expect("test token")
}

pub fn create_state(quiz: QuizSettings) -> Arc<AppState> {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let content = ContentService::load_from_dir(&content_dir()).expect("bundled content");
    Arc::new(AppState::from_parts(
        test_config(quiz),
        content,
        Arc::new(StubIdentity),
        Arc::new(InMemoryResultSink::new()),
    ))
}

pub fn create_test_app_with(quiz: QuizSettings) -> Router {
    create_router(create_state(quiz))
}

pub fn create_test_app() -> Router {
    create_test_app_with(QuizSettings::default())
}

/// Sends one request and returns the status with the body parsed as JSON
/// (`Value::Null` for empty or non-JSON bodies).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
