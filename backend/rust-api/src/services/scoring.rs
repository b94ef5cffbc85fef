use std::collections::BTreeMap;

use crate::error::QuizError;
use crate::models::quiz::round_half_up_percent;
use crate::models::{CategoryScore, QuizItem, QuizResult, SubjectId};

/// Timer reading captured when the session finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    pub total_seconds: u32,
    pub remaining_seconds: u32,
}

impl SessionClock {
    pub fn time_taken(&self) -> u32 {
        self.total_seconds.saturating_sub(self.remaining_seconds)
    }
}

/// Scores one attempt.
///
/// * an answer is correct iff it equals the item's correct index; a missing
///   answer counts as incorrect;
/// * `score_percent` is `100 * correct / scored` rounded half up;
/// * categories are grouped by exact string equality;
/// * items whose correct index is out of range are left out of both the
///   numerator and the denominator and reported in `flagged_items`.
///
/// Pure and deterministic. Fails on an empty item set, or when no item is
/// scorable.
pub fn score(
    items: &[QuizItem],
    answers: &BTreeMap<usize, usize>,
    clock: SessionClock,
    subject_id: SubjectId,
) -> Result<QuizResult, QuizError> {
    if items.is_empty() {
        return Err(QuizError::Configuration(
            "cannot score a session without questions".to_string(),
        ));
    }

    let mut correct_answers = 0usize;
    let mut scored = 0usize;
    let mut category_scores: BTreeMap<String, CategoryScore> = BTreeMap::new();
    let mut flagged_items = Vec::new();

    for (position, item) in items.iter().enumerate() {
        if item.correct_option_index >= item.options.len() {
            flagged_items.push(item.id.clone());
            continue;
        }

        let is_correct = answers.get(&position) == Some(&item.correct_option_index);

        scored += 1;
        let entry = category_scores.entry(item.category.clone()).or_default();
        entry.total += 1;
        if is_correct {
            correct_answers += 1;
            entry.correct += 1;
        }
    }

    if scored == 0 {
        return Err(QuizError::DataIntegrity(format!(
            "none of the {} questions has a valid correct option",
            items.len()
        )));
    }

    if !flagged_items.is_empty() {
        tracing::warn!(
            "Excluded {} question(s) with an invalid correct option from scoring: {:?}",
            flagged_items.len(),
            flagged_items
        );
    }

    Ok(QuizResult {
        score_percent: round_half_up_percent(correct_answers, scored),
        total_questions: items.len(),
        correct_answers,
        category_scores,
        time_taken_seconds: clock.time_taken(),
        subject_id,
        flagged_items,
    })
}
