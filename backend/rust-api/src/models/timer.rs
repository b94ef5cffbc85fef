use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    QuizFinished(QuizFinished),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimerTick {
    pub session_id: Uuid,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimeExpired {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Sent once when a session finishes by any path other than the timer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QuizFinished {
    pub session_id: Uuid,
    pub score_percent: u8,
    pub timestamp: DateTime<Utc>,
}

impl TimerEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            TimerEvent::TimerTick(_) => "timer-tick",
            TimerEvent::TimeExpired(_) => "time-expired",
            TimerEvent::QuizFinished(_) => "quiz-finished",
        }
    }

    /// Final events close the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TimerEvent::TimerTick(_))
    }
}
