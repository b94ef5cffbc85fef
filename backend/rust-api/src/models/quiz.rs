use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One multiple-choice question of the bank.
///
/// Field names on the wire follow the content files (`question`,
/// `correctAnswer`, `explanation`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: String,
    #[serde(rename = "question")]
    pub prompt_text: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_option_index: usize,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(rename = "explanation")]
    pub explanation_text: String,
}

impl QuizItem {
    /// True when the correct index points at one of at least two options.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.correct_option_index < self.options.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// Who took the quiz. Serialized as a plain string, with `"anonymous"` as the
/// sentinel for callers without an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubjectId {
    User(String),
    Anonymous,
}

impl SubjectId {
    pub fn as_str(&self) -> &str {
        match self {
            SubjectId::User(id) => id,
            SubjectId::Anonymous => ANONYMOUS_SUBJECT,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, SubjectId::Anonymous)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        if value.is_empty() || value == ANONYMOUS_SUBJECT {
            SubjectId::Anonymous
        } else {
            SubjectId::User(value)
        }
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        match value {
            SubjectId::User(id) => id,
            SubjectId::Anonymous => ANONYMOUS_SUBJECT.to_string(),
        }
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub correct: u32,
    pub total: u32,
}

impl CategoryScore {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }

    pub fn percent(&self) -> u8 {
        round_half_up_percent(self.correct as usize, self.total as usize)
    }
}

/// Outcome of one finished session. Derived once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub score_percent: u8,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub category_scores: BTreeMap<String, CategoryScore>,
    pub time_taken_seconds: u32,
    pub subject_id: SubjectId,
    /// Ids of items left out of scoring because their correct index is invalid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged_items: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_percent(score_percent: u8) -> Self {
        match score_percent {
            90.. => Grade::A,
            80..=89 => Grade::B,
            70..=79 => Grade::C,
            60..=69 => Grade::D,
            _ => Grade::F,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

pub const DEFAULT_PASSING_SCORE: u8 = 70;

pub fn is_passing(score_percent: u8, passing_score: u8) -> bool {
    score_percent >= passing_score
}

/// `round(100 * part / whole)` with ties rounded up, in integer arithmetic.
/// Returns 0 when `whole` is 0.
pub fn round_half_up_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole) as u64;
    let whole = whole as u64;
    ((200 * part + whole) / (2 * whole)) as u8
}
