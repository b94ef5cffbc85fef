use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod content;
pub mod quiz;
pub mod timer;
pub mod user;

pub use quiz::{CategoryScore, Difficulty, Grade, QuizItem, QuizResult, SubjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Finished,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Finished => "finished",
        }
    }
}

/// The focused question as the student sees it. The correct index is never
/// part of this view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub position: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub position: usize,
    pub total_questions: usize,
    pub answered: usize,
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub question: Option<QuestionView>,
    pub selected_option: Option<usize>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionViewQuery {
    /// Include the explanation of the focused question.
    #[serde(default)]
    pub explain: bool,
}

#[derive(Debug, Deserialize)]
pub struct RecordAnswerRequest {
    pub position: usize,
    pub option_index: usize,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub finished: bool,
    pub session: SessionView,
}

/// A finished attempt as handed to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedAttempt {
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub result: QuizResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub correct: u32,
    pub total: u32,
    pub percent: u8,
    pub weak: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendedVideo {
    pub id: String,
    pub title: String,
    pub category: String,
}

/// Everything the results screen shows for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultReport {
    pub session_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub score_percent: u8,
    pub grade: Grade,
    pub passed: bool,
    pub passing_score: u8,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub time_taken_seconds: u32,
    pub time_taken_display: String,
    pub average_seconds_per_question: u32,
    pub categories: Vec<CategoryBreakdown>,
    pub weak_areas: Vec<String>,
    pub recommended_videos: Vec<RecommendedVideo>,
    pub subject_id: SubjectId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged_items: Vec<String>,
}
