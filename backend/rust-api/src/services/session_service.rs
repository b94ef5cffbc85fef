use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use super::content_service::QuestionBank;
use super::identity_service::IdentityProvider;
use super::quiz_session::{Advance, QuizSession, SessionSettings, TickOutcome};
use super::result_sink::ResultSink;
use super::ticker::{TickControl, Ticker};
use crate::error::QuizError;
use crate::metrics::{
    record_session_outcome, ANSWERS_RECORDED_TOTAL, QUIZ_SCORE_PERCENT, QUIZ_SESSIONS_ACTIVE,
};
use crate::models::timer::{QuizFinished, TimeExpired, TimerEvent, TimerTick};
use crate::models::{CompletedAttempt, SessionView, SubjectId};

const EVENT_BUFFER: usize = 16;

/// A registered session with its countdown and event fan-out.
pub struct SessionEntry {
    session: QuizSession,
    ticker: Option<Ticker>,
    events: broadcast::Sender<TimerEvent>,
    /// Set once the session can take no more transitions.
    closed_at: Option<Instant>,
}

impl SessionEntry {
    fn new(session: QuizSession) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            session,
            ticker: None,
            events,
            closed_at: None,
        }
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    fn publish(&self, event: TimerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn on_tick(&mut self) -> (TickControl, Option<CompletedAttempt>) {
        let id = self.session.id();
        match self.session.tick() {
            Ok(TickOutcome::Idle) => (TickControl::Stop, None),
            Ok(TickOutcome::Running { remaining_seconds }) => {
                let total_seconds = self.session.settings().duration_seconds;
                self.publish(TimerEvent::TimerTick(TimerTick {
                    session_id: id,
                    remaining_seconds,
                    elapsed_seconds: total_seconds.saturating_sub(remaining_seconds),
                    total_seconds,
                    timestamp: Utc::now(),
                }));
                (TickControl::Continue, None)
            }
            Ok(TickOutcome::Expired) => (TickControl::Stop, self.settle(true)),
            Err(e) => {
                tracing::error!("Quiz session {} could not be scored at timeout: {}", id, e);
                if self.closed_at.is_none() {
                    self.close();
                    record_session_outcome("failed");
                }
                (TickControl::Stop, None)
            }
        }
    }

    /// Hands out the finished attempt exactly once and stops the countdown.
    fn settle(&mut self, expired: bool) -> Option<CompletedAttempt> {
        if self.closed_at.is_some() {
            return None;
        }
        let attempt = self.completed_attempt()?;
        self.close();

        QUIZ_SCORE_PERCENT.observe(f64::from(attempt.result.score_percent));
        record_session_outcome(if expired { "expired" } else { "completed" });

        let event = if expired {
            TimerEvent::TimeExpired(TimeExpired {
                session_id: attempt.session_id,
                timestamp: Utc::now(),
                message: "Time limit exceeded".to_string(),
            })
        } else {
            TimerEvent::QuizFinished(QuizFinished {
                session_id: attempt.session_id,
                score_percent: attempt.result.score_percent,
                timestamp: Utc::now(),
            })
        };
        self.publish(event);

        Some(attempt)
    }

    fn close(&mut self) {
        self.closed_at = Some(Instant::now());
        self.ticker.take();
        QUIZ_SESSIONS_ACTIVE.dec();
    }

    fn is_stale(&self, retention: Duration) -> bool {
        self.closed_at
            .is_some_and(|closed_at| closed_at.elapsed() >= retention)
    }

    fn completed_attempt(&self) -> Option<CompletedAttempt> {
        let result = self.session.result()?;
        Some(CompletedAttempt {
            session_id: self.session.id(),
            completed_at: self.session.finished_at().unwrap_or_else(Utc::now),
            result: result.clone(),
        })
    }
}

type SharedEntry = Arc<Mutex<SessionEntry>>;
type Registry = RwLock<HashMap<Uuid, SharedEntry>>;

/// Registry of live and recently closed quiz sessions.
///
/// Each session sits behind its own mutex so a tick and a request never
/// interleave inside one transition. Sessions share nothing else. Closed
/// sessions are swept out once `retention` has passed; their results stay
/// reachable through the result sink.
pub struct SessionService {
    sessions: Arc<Registry>,
    bank: Arc<dyn QuestionBank>,
    results: Arc<dyn ResultSink>,
    settings: SessionSettings,
    tick_interval: Duration,
    retention: Duration,
    sweeper: OnceLock<Ticker>,
}

impl SessionService {
    pub fn new(
        bank: Arc<dyn QuestionBank>,
        results: Arc<dyn ResultSink>,
        settings: SessionSettings,
        tick_interval: Duration,
        retention: Duration,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            bank,
            results,
            settings,
            tick_interval,
            retention: retention.max(Duration::from_millis(1)),
            sweeper: OnceLock::new(),
        }
    }

    /// Starts a new attempt for a signed-in caller and its countdown.
    pub async fn start<I>(&self, identity: &I) -> Result<SessionView, QuizError>
    where
        I: IdentityProvider + ?Sized,
    {
        if !identity.is_authenticated() {
            return Err(QuizError::NotAuthenticated);
        }

        let mut session = QuizSession::new(identity.current_subject_id(), self.settings);
        {
            let mut rng = rand::rng();
            session.start(self.bank.get_all(), &mut rng)?;
        }
        let id = session.id();
        let view = session.view(false);

        let entry = Arc::new(Mutex::new(SessionEntry::new(session)));
        let ticker = self.spawn_ticker(id, Arc::downgrade(&entry));
        entry.lock().await.ticker = Some(ticker);

        self.sessions.write().await.insert(id, entry);
        QUIZ_SESSIONS_ACTIVE.inc();
        record_session_outcome("started");
        self.sweeper.get_or_init(|| self.spawn_sweeper());

        Ok(view)
    }

    fn spawn_ticker(&self, id: Uuid, entry: Weak<Mutex<SessionEntry>>) -> Ticker {
        let results = self.results.clone();

        Ticker::spawn(
            format!("quiz-session-{}", id),
            self.tick_interval,
            move || {
                let entry = entry.clone();
                let results = results.clone();
                async move {
                    // Abandoned sessions are gone from the registry
                    let Some(entry) = entry.upgrade() else {
                        return TickControl::Stop;
                    };
                    let (control, attempt) = entry.lock().await.on_tick();
                    if let Some(attempt) = attempt {
                        results.deliver(attempt).await;
                    }
                    control
                }
            },
        )
    }

    fn spawn_sweeper(&self) -> Ticker {
        let registry = Arc::downgrade(&self.sessions);
        let retention = self.retention;

        Ticker::spawn("quiz-session-sweeper".to_string(), retention, move || {
            let registry = registry.clone();
            async move {
                let Some(registry) = registry.upgrade() else {
                    return TickControl::Stop;
                };
                sweep(&registry, retention).await;
                TickControl::Continue
            }
        })
    }

    async fn entry(&self, id: Uuid, subject: &SubjectId) -> Result<SharedEntry, QuizError> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(QuizError::SessionNotFound)?;

        // Someone else's session looks exactly like a missing one
        if entry.lock().await.session.subject_id() != subject {
            tracing::warn!("Subject {} asked for foreign session {}", subject, id);
            return Err(QuizError::SessionNotFound);
        }
        Ok(entry)
    }

    pub async fn view(
        &self,
        id: Uuid,
        subject: &SubjectId,
        explain: bool,
    ) -> Result<SessionView, QuizError> {
        let entry = self.entry(id, subject).await?;
        let guard = entry.lock().await;
        Ok(guard.session.view(explain))
    }

    pub async fn record_answer(
        &self,
        id: Uuid,
        subject: &SubjectId,
        position: usize,
        option_index: usize,
    ) -> Result<SessionView, QuizError> {
        let entry = self.entry(id, subject).await?;
        let mut guard = entry.lock().await;
        guard.session.record_answer(position, option_index)?;
        ANSWERS_RECORDED_TOTAL.inc();
        Ok(guard.session.view(false))
    }

    pub async fn advance(
        &self,
        id: Uuid,
        subject: &SubjectId,
    ) -> Result<(Advance, SessionView), QuizError> {
        let entry = self.entry(id, subject).await?;
        let (step, view, attempt) = {
            let mut guard = entry.lock().await;
            let step = guard.session.advance()?;
            let attempt = match step {
                Advance::Finished => guard.settle(false),
                Advance::Next { .. } => None,
            };
            (step, guard.session.view(false), attempt)
        };

        if let Some(attempt) = attempt {
            self.results.deliver(attempt).await;
        }
        Ok((step, view))
    }

    /// Ends the attempt now. Repeated calls return the same attempt.
    pub async fn finish(
        &self,
        id: Uuid,
        subject: &SubjectId,
    ) -> Result<CompletedAttempt, QuizError> {
        let entry = match self.entry(id, subject).await {
            Ok(entry) => entry,
            Err(QuizError::SessionNotFound) => return self.archived(id, subject).await,
            Err(e) => return Err(e),
        };
        let (attempt, first) = {
            let mut guard = entry.lock().await;
            guard.session.finish()?;
            match guard.settle(false) {
                Some(attempt) => (attempt, true),
                None => (
                    guard
                        .completed_attempt()
                        .ok_or_else(|| QuizError::InvalidState("session has no result".into()))?,
                    false,
                ),
            }
        };

        if first {
            self.results.deliver(attempt.clone()).await;
        }
        Ok(attempt)
    }

    /// The scored attempt of a finished session.
    pub async fn attempt(
        &self,
        id: Uuid,
        subject: &SubjectId,
    ) -> Result<CompletedAttempt, QuizError> {
        let entry = match self.entry(id, subject).await {
            Ok(entry) => entry,
            Err(QuizError::SessionNotFound) => return self.archived(id, subject).await,
            Err(e) => return Err(e),
        };
        let guard = entry.lock().await;
        guard.completed_attempt().ok_or_else(|| {
            QuizError::InvalidState(format!(
                "session is {}, no result yet",
                guard.session.status().as_str()
            ))
        })
    }

    /// A swept session's attempt as the result sink recorded it.
    async fn archived(
        &self,
        id: Uuid,
        subject: &SubjectId,
    ) -> Result<CompletedAttempt, QuizError> {
        self.results
            .history(subject)
            .await
            .into_iter()
            .find(|attempt| attempt.session_id == id)
            .ok_or(QuizError::SessionNotFound)
    }

    /// Current view plus a receiver for the session's timer events.
    pub async fn subscribe(
        &self,
        id: Uuid,
        subject: &SubjectId,
    ) -> Result<(SessionView, broadcast::Receiver<TimerEvent>), QuizError> {
        let entry = self.entry(id, subject).await?;
        let guard = entry.lock().await;
        Ok((guard.session.view(false), guard.events.subscribe()))
    }

    /// Drops the session and stops its countdown. Nothing is scored.
    pub async fn abandon(&self, id: Uuid, subject: &SubjectId) -> Result<(), QuizError> {
        let entry = self.entry(id, subject).await?;
        self.sessions.write().await.remove(&id);

        let mut guard = entry.lock().await;
        if let Some(mut ticker) = guard.ticker.take() {
            ticker.cancel();
        }
        if guard.closed_at.is_none() {
            QUIZ_SESSIONS_ACTIVE.dec();
            record_session_outcome("abandoned");
        }

        tracing::info!("Quiz session {} abandoned by {}", id, subject);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Evicts sessions closed for at least `retention`.
async fn sweep(registry: &Registry, retention: Duration) {
    let entries: Vec<(Uuid, SharedEntry)> = registry
        .read()
        .await
        .iter()
        .map(|(id, entry)| (*id, entry.clone()))
        .collect();

    let mut stale = Vec::new();
    for (id, entry) in entries {
        if entry.lock().await.is_stale(retention) {
            stale.push(id);
        }
    }
    if stale.is_empty() {
        return;
    }

    let mut sessions = registry.write().await;
    for id in &stale {
        sessions.remove(id);
    }
    tracing::debug!(
        "Evicted {} closed quiz session(s), {} remain",
        stale.len(),
        sessions.len()
    );
}
