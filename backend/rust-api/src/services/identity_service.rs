use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;

use crate::middlewares::auth::JwtClaims;
use crate::models::user::{AuthSession, SignInRequest, SignUpRequest, UserProfile};
use crate::models::SubjectId;
use crate::utils::retry::{retry_async_if, RetryConfig};

/// Who is asking. The quiz only needs these two answers.
pub trait IdentityProvider {
    fn current_subject_id(&self) -> SubjectId;
    fn is_authenticated(&self) -> bool;
}

/// Caller identity resolved by the auth middlewares. Anonymous when no valid
/// bearer token was presented.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    claims: Option<JwtClaims>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_claims(claims: JwtClaims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    pub fn claims(&self) -> Option<&JwtClaims> {
        self.claims.as_ref()
    }
}

impl IdentityProvider for Identity {
    fn current_subject_id(&self) -> SubjectId {
        match &self.claims {
            Some(claims) => SubjectId::User(claims.sub.clone()),
            None => SubjectId::Anonymous,
        }
    }

    fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The identity service refused the request (bad credentials, taken email).
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("identity service unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected identity service response: {0}")]
    InvalidResponse(String),
}

impl IdentityError {
    pub fn is_transient(&self) -> bool {
        matches!(self, IdentityError::Unavailable(_))
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode as Http;
        match self {
            IdentityError::Rejected { status, .. } => Http::from_u16(*status)
                .ok()
                .filter(|code| code.is_client_error())
                .unwrap_or(Http::BAD_REQUEST),
            IdentityError::Unavailable(_) => Http::SERVICE_UNAVAILABLE,
            IdentityError::InvalidResponse(_) => Http::BAD_GATEWAY,
        }
    }
}

impl From<IdentityError> for (axum::http::StatusCode, String) {
    fn from(err: IdentityError) -> Self {
        (err.status_code(), err.to_string())
    }
}

#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    /// The account exists but the email address must be confirmed first.
    ConfirmationRequired(UserProfile),
}

/// External account service. Sign-in, sign-up and sign-out are delegated to it.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn sign_in(&self, request: &SignInRequest) -> Result<AuthSession, IdentityError>;
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, IdentityError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl GoTrueUser {
    fn into_profile(self) -> UserProfile {
        let username = self
            .user_metadata
            .as_ref()
            .and_then(|meta| meta.get("username"))
            .and_then(|name| name.as_str())
            .map(str::to_string);
        UserProfile::new(self.id, self.email.unwrap_or_default(), username)
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    user: Option<GoTrueUser>,
    // Sign-up without auto-confirm returns the bare user
    id: Option<String>,
    email: Option<String>,
    user_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GoTrueErrorBody {
    #[serde(alias = "error_description", alias = "msg")]
    message: Option<String>,
    error: Option<String>,
}

/// Client for a GoTrue-compatible auth API (`{url}/auth/v1/...`).
pub struct GoTrueClient {
    http_client: Client,
    base_url: String,
    anon_key: String,
    retry: RetryConfig,
}

impl GoTrueClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, IdentityError> {
        let url = self.endpoint(path);

        retry_async_if(
            self.retry.clone(),
            || async {
                let mut request = self
                    .http_client
                    .post(&url)
                    .header("apikey", &self.anon_key)
                    .json(body)
                    .timeout(Duration::from_secs(5));
                if let Some(token) = bearer {
                    request = request.bearer_auth(token);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
                check_status(response).await
            },
            IdentityError::is_transient,
        )
        .await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GoTrueErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .unwrap_or_else(|| format!("identity service returned {}", status));

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(IdentityError::Unavailable(message))
    } else {
        Err(IdentityError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn into_auth_session(session: GoTrueSession) -> Result<SignUpOutcome, IdentityError> {
    match (session.access_token, session.user) {
        (Some(access_token), Some(user)) => Ok(SignUpOutcome::SignedIn(AuthSession {
            access_token,
            refresh_token: session.refresh_token,
            expires_in: session.expires_in,
            user: user.into_profile(),
        })),
        (None, Some(user)) => Ok(SignUpOutcome::ConfirmationRequired(user.into_profile())),
        (None, None) => match session.id {
            Some(id) => Ok(SignUpOutcome::ConfirmationRequired(
                GoTrueUser {
                    id,
                    email: session.email,
                    user_metadata: session.user_metadata,
                }
                .into_profile(),
            )),
            None => Err(IdentityError::InvalidResponse(
                "response carries neither a session nor a user".to_string(),
            )),
        },
        (Some(_), None) => Err(IdentityError::InvalidResponse(
            "session without user".to_string(),
        )),
    }
}

#[async_trait]
impl IdentityClient for GoTrueClient {
    async fn sign_in(&self, request: &SignInRequest) -> Result<AuthSession, IdentityError> {
        let body = json!({ "email": request.email, "password": request.password });
        let response = self
            .post_json("token?grant_type=password", &body, None)
            .await?;
        let session: GoTrueSession = response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        match into_auth_session(session)? {
            SignUpOutcome::SignedIn(session) => {
                tracing::info!("User {} signed in", session.user.id);
                Ok(session)
            }
            SignUpOutcome::ConfirmationRequired(_) => Err(IdentityError::InvalidResponse(
                "sign-in returned no access token".to_string(),
            )),
        }
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, IdentityError> {
        let username = request
            .username
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| crate::models::user::default_username(&request.email));
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": { "username": username },
        });

        let response = self.post_json("signup", &body, None).await?;
        let session: GoTrueSession = response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        let outcome = into_auth_session(session)?;
        match &outcome {
            SignUpOutcome::SignedIn(session) => {
                tracing::info!("User {} signed up", session.user.id)
            }
            SignUpOutcome::ConfirmationRequired(user) => {
                tracing::info!("User {} signed up, confirmation pending", user.id)
            }
        }
        Ok(outcome)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        self.post_json("logout", &json!({}), Some(access_token))
            .await?;
        Ok(())
    }
}
