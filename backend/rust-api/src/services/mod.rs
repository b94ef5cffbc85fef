use anyhow::Context;
use std::sync::Arc;

use crate::config::Config;
use crate::middlewares::auth::JwtService;
use content_service::ContentService;
use identity_service::{GoTrueClient, IdentityClient};
use progress_service::ProgressService;
use result_sink::{InMemoryResultSink, ResultSink};
use session_service::SessionService;

pub struct AppState {
    pub config: Config,
    pub content: Arc<ContentService>,
    pub sessions: SessionService,
    pub progress: ProgressService,
    pub results: Arc<dyn ResultSink>,
    pub identity: Arc<dyn IdentityClient>,
    pub jwt: JwtService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let content = ContentService::load_from_dir(&config.content_dir).with_context(|| {
            format!(
                "Failed to load learning content from {}",
                config.content_dir.display()
            )
        })?;

        if config.identity_anon_key.is_empty() {
            tracing::warn!("IDENTITY_ANON_KEY is not set, sign-in requests will be rejected");
        }
        let identity = GoTrueClient::new(&config.identity_url, &config.identity_anon_key)
            .with_retry(config.identity_retry());
        tracing::info!(
            "Identity service: {} (up to {} attempts per call)",
            config.identity_url,
            config.identity_max_attempts.max(1)
        );

        Ok(Self::from_parts(
            config,
            content,
            Arc::new(identity),
            Arc::new(InMemoryResultSink::new()),
        ))
    }

    /// Wires the state from already-built collaborators.
    pub fn from_parts(
        config: Config,
        content: ContentService,
        identity: Arc<dyn IdentityClient>,
        results: Arc<dyn ResultSink>,
    ) -> Self {
        let content = Arc::new(content);
        let sessions = SessionService::new(
            content.clone(),
            results.clone(),
            config.quiz.session_settings(),
            config.quiz.tick_interval(),
            config.quiz.retention(),
        );
        let jwt = JwtService::new(&config.jwt_secret, &config.jwt_audience);

        Self {
            config,
            content,
            sessions,
            progress: ProgressService::new(),
            results,
            identity,
            jwt,
        }
    }
}

pub mod content_service;
pub mod identity_service;
pub mod progress_service;
pub mod quiz_session;
pub mod report;
pub mod result_sink;
pub mod sampler;
pub mod scoring;
pub mod session_service;
pub mod ticker;
