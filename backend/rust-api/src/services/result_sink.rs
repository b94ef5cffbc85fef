use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::{CompletedAttempt, SubjectId};

/// Receives every finished attempt exactly once.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, attempt: CompletedAttempt);

    /// Attempts of one subject, most recent first.
    async fn history(&self, subject: &SubjectId) -> Vec<CompletedAttempt>;
}

/// Keeps results in process memory, grouped by subject.
#[derive(Debug, Default)]
pub struct InMemoryResultSink {
    attempts: RwLock<HashMap<SubjectId, Vec<CompletedAttempt>>>,
}

impl InMemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultSink for InMemoryResultSink {
    async fn deliver(&self, attempt: CompletedAttempt) {
        tracing::info!(
            "Storing result of session {} for {}: {}%",
            attempt.session_id,
            attempt.result.subject_id,
            attempt.result.score_percent
        );
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(attempt.result.subject_id.clone())
            .or_default()
            .push(attempt);
    }

    async fn history(&self, subject: &SubjectId) -> Vec<CompletedAttempt> {
        let attempts = self.attempts.read().await;
        let mut mine = attempts.get(subject).cloned().unwrap_or_default();
        mine.reverse();
        mine
    }
}
