use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::sampler;
use super::scoring::{self, SessionClock};
use crate::error::QuizError;
use crate::models::{QuestionView, QuizItem, QuizResult, SessionStatus, SessionView, SubjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub sample_size: usize,
    pub duration_seconds: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sample_size: 15,
            duration_seconds: 20 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The session is not running; nothing changed.
    Idle,
    Running { remaining_seconds: u32 },
    /// The countdown hit zero and the session finished.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next { position: usize },
    Finished,
}

/// One timed attempt: `NotStarted -> InProgress -> Finished`.
///
/// Every transition runs to completion on `&mut self`; the owner serializes
/// access. Once finished the session is frozen and a new attempt needs a new
/// value.
#[derive(Debug, Clone)]
pub struct QuizSession {
    id: Uuid,
    subject_id: SubjectId,
    settings: SessionSettings,
    status: SessionStatus,
    items: Vec<QuizItem>,
    answers: BTreeMap<usize, usize>,
    position: usize,
    remaining_seconds: u32,
    result: Option<QuizResult>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    pub fn new(subject_id: SubjectId, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            settings,
            status: SessionStatus::NotStarted,
            items: Vec::new(),
            answers: BTreeMap::new(),
            position: 0,
            remaining_seconds: settings.duration_seconds,
            result: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start<R>(&mut self, bank: &[QuizItem], rng: &mut R) -> Result<(), QuizError>
    where
        R: Rng + ?Sized,
    {
        if self.status != SessionStatus::NotStarted {
            return Err(self.invalid_transition("start"));
        }
        if self.settings.duration_seconds == 0 {
            return Err(QuizError::Configuration(
                "quiz duration must be positive".to_string(),
            ));
        }

        self.items = sampler::sample(bank, self.settings.sample_size, rng)?;
        self.answers.clear();
        self.position = 0;
        self.remaining_seconds = self.settings.duration_seconds;
        self.started_at = Some(Utc::now());
        self.status = SessionStatus::InProgress;

        tracing::info!(
            "Quiz session {} started for {} with {} questions, {}s",
            self.id,
            self.subject_id,
            self.items.len(),
            self.remaining_seconds
        );
        Ok(())
    }

    /// One second of the countdown. Finishes the session when it reaches 0.
    pub fn tick(&mut self) -> Result<TickOutcome, QuizError> {
        if self.status != SessionStatus::InProgress {
            return Ok(TickOutcome::Idle);
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds > 0 {
            return Ok(TickOutcome::Running {
                remaining_seconds: self.remaining_seconds,
            });
        }

        tracing::info!("Quiz session {} ran out of time", self.id);
        self.finish()?;
        Ok(TickOutcome::Expired)
    }

    /// Selects an option for the focused question, replacing any earlier
    /// selection for it.
    pub fn record_answer(
        &mut self,
        position: usize,
        option_index: usize,
    ) -> Result<(), QuizError> {
        if self.status != SessionStatus::InProgress {
            return Err(QuizError::InvalidState(format!(
                "cannot record an answer while {}",
                self.status.as_str()
            )));
        }
        if position >= self.items.len() {
            return Err(QuizError::InvalidState(format!(
                "position {} is outside the session (0..{})",
                position,
                self.items.len()
            )));
        }
        if position != self.position {
            return Err(QuizError::InvalidState(format!(
                "answers can only be recorded for the focused question {} (got {})",
                self.position, position
            )));
        }
        if option_index >= self.items[position].options.len() {
            return Err(QuizError::InvalidAnswer {
                position,
                option: option_index,
            });
        }

        self.answers.insert(position, option_index);
        Ok(())
    }

    /// Moves focus to the next question, or finishes after the last one.
    pub fn advance(&mut self) -> Result<Advance, QuizError> {
        if self.status != SessionStatus::InProgress {
            return Err(QuizError::InvalidState(format!(
                "cannot advance while {}",
                self.status.as_str()
            )));
        }
        if !self.answers.contains_key(&self.position) {
            return Err(QuizError::InvalidState(format!(
                "question {} has no selected answer",
                self.position
            )));
        }

        if self.position + 1 >= self.items.len() {
            self.finish()?;
            return Ok(Advance::Finished);
        }

        self.position += 1;
        Ok(Advance::Next {
            position: self.position,
        })
    }

    /// Scores the session once. Later calls return the stored result.
    pub fn finish(&mut self) -> Result<&QuizResult, QuizError> {
        match self.status {
            SessionStatus::NotStarted => Err(self.invalid_transition("finish")),
            SessionStatus::Finished => self.result.as_ref().ok_or_else(|| {
                QuizError::InvalidState("finished session has no result".to_string())
            }),
            SessionStatus::InProgress => {
                let clock = SessionClock {
                    total_seconds: self.settings.duration_seconds,
                    remaining_seconds: self.remaining_seconds,
                };
                let result =
                    scoring::score(&self.items, &self.answers, clock, self.subject_id.clone())?;

                tracing::info!(
                    "Quiz session {} finished: {}% ({}/{}) in {}s",
                    self.id,
                    result.score_percent,
                    result.correct_answers,
                    result.total_questions,
                    result.time_taken_seconds
                );

                self.status = SessionStatus::Finished;
                self.finished_at = Some(Utc::now());
                let stored = self.result.insert(result);
                Ok(&*stored)
            }
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    pub fn answers(&self) -> &BTreeMap<usize, usize> {
        &self.answers
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn current_item(&self) -> Option<&QuizItem> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        self.items.get(self.position)
    }

    pub fn view(&self, explain: bool) -> SessionView {
        let question = self.current_item().map(|item| QuestionView {
            id: item.id.clone(),
            position: self.position,
            prompt: item.prompt_text.clone(),
            options: item.options.clone(),
            category: item.category.clone(),
            difficulty: item.difficulty,
            explanation: explain.then(|| item.explanation_text.clone()),
        });

        SessionView {
            session_id: self.id,
            status: self.status,
            position: self.position,
            total_questions: self.items.len(),
            answered: self.answers.len(),
            remaining_seconds: self.remaining_seconds,
            total_seconds: self.settings.duration_seconds,
            selected_option: question
                .as_ref()
                .and_then(|_| self.answers.get(&self.position).copied()),
            question,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn invalid_transition(&self, action: &'static str) -> QuizError {
        QuizError::InvalidTransition {
            action,
            from: self.status.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bank(size: usize) -> Vec<QuizItem> {
        (0..size)
            .map(|i| QuizItem {
                id: format!("q{}", i),
                prompt_text: format!("Question {}", i),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_option_index: i % 4,
                category: if i % 2 == 0 { "Phishing" } else { "Malware" }.to_string(),
                difficulty: Difficulty::Easy,
                explanation_text: format!("Because {}", i),
            })
            .collect()
    }

    fn started(sample_size: usize, duration_seconds: u32) -> QuizSession {
        let mut session = QuizSession::new(
            SubjectId::User("student".to_string()),
            SessionSettings {
                sample_size,
                duration_seconds,
            },
        );
        let mut rng = StdRng::seed_from_u64(11);
        session.start(&bank(20), &mut rng).unwrap();
        session
    }

    fn correct_at(session: &QuizSession, position: usize) -> usize {
        session.items()[position].correct_option_index
    }

    fn wrong_at(session: &QuizSession, position: usize) -> usize {
        (correct_at(session, position) + 1) % 4
    }

    #[test]
    fn test_start_populates_session() {
        let session = started(15, 1200);
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.items().len(), 15);
        assert_eq!(session.remaining_seconds(), 1200);
        assert!(session.answers().is_empty());
        assert_eq!(session.position(), 0);
        assert!(session.started_at().is_some());
    }

    #[test]
    fn test_start_twice_is_invalid_transition() {
        let mut session = started(3, 60);
        let mut rng = StdRng::seed_from_u64(1);
        let err = session.start(&bank(20), &mut rng).unwrap_err();
        assert!(matches!(err, QuizError::InvalidTransition { action: "start", .. }));
    }

    #[test]
    fn test_start_with_oversized_sample_leaves_session_unstarted() {
        let mut session = QuizSession::new(
            SubjectId::User("s".into()),
            SessionSettings {
                sample_size: 25,
                duration_seconds: 60,
            },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let err = session.start(&bank(20), &mut rng).unwrap_err();
        assert!(matches!(err, QuizError::Configuration(_)));
        assert_eq!(session.status(), SessionStatus::NotStarted);
    }

    #[test]
    fn test_two_of_three_correct_via_state_machine() {
        let mut session = started(3, 60);

        session.record_answer(0, correct_at(&session, 0)).unwrap();
        assert_eq!(session.advance().unwrap(), Advance::Next { position: 1 });
        session.record_answer(1, wrong_at(&session, 1)).unwrap();
        session.advance().unwrap();
        session.record_answer(2, correct_at(&session, 2)).unwrap();
        assert_eq!(session.advance().unwrap(), Advance::Finished);

        assert!(session.is_finished());
        assert_eq!(session.result().unwrap().score_percent, 67);
    }

    #[test]
    fn test_reselect_overwrites_before_advancing() {
        let mut session = started(2, 60);
        session.record_answer(0, wrong_at(&session, 0)).unwrap();
        session.record_answer(0, correct_at(&session, 0)).unwrap();
        assert_eq!(session.answers()[&0], correct_at(&session, 0));
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn test_answer_only_for_focused_position() {
        let mut session = started(3, 60);
        let err = session.record_answer(1, 0).unwrap_err();
        assert!(matches!(err, QuizError::InvalidState(_)));
        let err = session.record_answer(7, 0).unwrap_err();
        assert!(matches!(err, QuizError::InvalidState(_)));
        let err = session.record_answer(0, 4).unwrap_err();
        assert_eq!(
            err,
            QuizError::InvalidAnswer {
                position: 0,
                option: 4
            }
        );
    }

    #[test]
    fn test_advance_requires_answer() {
        let mut session = started(3, 60);
        assert!(matches!(
            session.advance().unwrap_err(),
            QuizError::InvalidState(_)
        ));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut session = started(4, 60);
        session.record_answer(0, correct_at(&session, 0)).unwrap();

        let first = session.finish().unwrap().clone();
        let finished_at = session.finished_at();
        let second = session.finish().unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(session.finished_at(), finished_at);
        assert_eq!(first.score_percent, 25);
    }

    #[test]
    fn test_finish_before_start_is_invalid_transition() {
        let mut session = QuizSession::new(SubjectId::Anonymous, SessionSettings::default());
        assert!(matches!(
            session.finish().unwrap_err(),
            QuizError::InvalidTransition { action: "finish", .. }
        ));
    }

    #[test]
    fn test_record_after_finish_fails_and_keeps_result() {
        let mut session = started(3, 60);
        session.record_answer(0, correct_at(&session, 0)).unwrap();
        let result = session.finish().unwrap().clone();
        let answers = session.answers().clone();

        let err = session.record_answer(0, 1).unwrap_err();

        assert!(matches!(err, QuizError::InvalidState(_)));
        assert_eq!(session.answers(), &answers);
        assert_eq!(session.result(), Some(&result));
    }

    #[test]
    fn test_timeout_scores_unanswered_as_incorrect() {
        let mut session = started(1, 3);

        assert_eq!(
            session.tick().unwrap(),
            TickOutcome::Running {
                remaining_seconds: 2
            }
        );
        session.tick().unwrap();
        assert_eq!(session.tick().unwrap(), TickOutcome::Expired);

        assert!(session.is_finished());
        let result = session.result().unwrap();
        assert_eq!(result.score_percent, 0);
        assert_eq!(result.time_taken_seconds, 3);
        let category = &session.items()[0].category;
        assert_eq!(result.category_scores[category].total, 1);
        assert_eq!(result.category_scores[category].correct, 0);

        assert_eq!(session.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(session.remaining_seconds(), 0);
    }

    #[test]
    fn test_timeout_keeps_answers_recorded_so_far() {
        let mut session = started(4, 2);
        session.record_answer(0, correct_at(&session, 0)).unwrap();
        session.advance().unwrap();
        session.record_answer(1, correct_at(&session, 1)).unwrap();

        session.tick().unwrap();
        session.tick().unwrap();

        let result = session.result().unwrap();
        assert_eq!(result.correct_answers, 2);
        assert_eq!(result.score_percent, 50);
    }

    #[test]
    fn test_tick_before_start_is_noop() {
        let mut session = QuizSession::new(SubjectId::Anonymous, SessionSettings::default());
        assert_eq!(session.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(session.remaining_seconds(), 1200);
    }

    #[test]
    fn test_view_hides_correct_answer_and_shows_explanation_on_request() {
        let mut session = started(2, 60);
        session.record_answer(0, 1).unwrap();

        let view = session.view(false);
        assert_eq!(view.selected_option, Some(1));
        let question = view.question.unwrap();
        assert!(question.explanation.is_none());
        let json = serde_json::to_value(&question).unwrap();
        assert!(json.get("correctAnswer").is_none());

        let explained = session.view(true).question.unwrap();
        assert!(explained.explanation.unwrap().starts_with("Because"));

        session.finish().unwrap();
        assert!(session.view(true).question.is_none());
    }
}
