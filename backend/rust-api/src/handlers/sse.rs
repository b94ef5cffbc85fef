use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use chrono::Utc;
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::{
    error::QuizError,
    metrics::SSE_CONNECTIONS_ACTIVE,
    models::{
        timer::{QuizFinished, TimerEvent, TimerTick},
        SessionStatus, SessionView,
    },
    services::{
        identity_service::{Identity, IdentityProvider},
        AppState,
    },
};

/// SSE endpoint for the countdown of one session
/// GET /api/v1/quiz/sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let subject = identity.current_subject_id();
    let (view, events) = state
        .sessions
        .subscribe(session_id, &subject)
        .await
        .map_err(|e| {
            tracing::warn!("SSE subscription refused for {}: {}", session_id, e);
            <(StatusCode, String)>::from(e)
        })?;

    let initial = match view.status {
        SessionStatus::Finished => {
            let attempt = state
                .sessions
                .attempt(session_id, &subject)
                .await
                .map_err(<(StatusCode, String)>::from)?;
            TimerEvent::QuizFinished(QuizFinished {
                session_id,
                score_percent: attempt.result.score_percent,
                timestamp: Utc::now(),
            })
        }
        SessionStatus::InProgress => snapshot(&view),
        SessionStatus::NotStarted => {
            return Err(QuizError::InvalidState("session has not started".to_string()).into())
        }
    };

    tracing::info!(
        "Client connected to SSE stream: session={}, remaining={}s",
        session_id,
        view.remaining_seconds
    );

    Ok(Sse::new(event_stream(initial, events)).keep_alive(KeepAlive::default()))
}

/// Current countdown state, so clients do not wait a full tick for a value.
fn snapshot(view: &SessionView) -> TimerEvent {
    TimerEvent::TimerTick(TimerTick {
        session_id: view.session_id,
        remaining_seconds: view.remaining_seconds,
        elapsed_seconds: view.total_seconds.saturating_sub(view.remaining_seconds),
        total_seconds: view.total_seconds,
        timestamp: Utc::now(),
    })
}

fn to_sse(event: &TimerEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .data(event.to_sse_data())
}

/// Keeps `sse_connections_active` in step with open streams.
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// Emits `initial`, then forwards session events until a terminal one or
/// until the session is dropped.
fn event_stream(
    initial: TimerEvent,
    events: broadcast::Receiver<TimerEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(
        (Some(initial), Some(events), ConnectionGuard::new()),
        |(pending, events, guard)| async move {
            if let Some(event) = pending {
                let events = if event.is_terminal() { None } else { events };
                return Some((Ok(to_sse(&event)), (None, events, guard)));
            }

            let mut events = events?;
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        let sse = to_sse(&event);
                        let events = if terminal { None } else { Some(events) };
                        return Some((Ok(sse), (None, events, guard)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("SSE client lagged, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("SSE stream closed: session ended");
                        return None;
                    }
                }
            }
        },
    )
}
