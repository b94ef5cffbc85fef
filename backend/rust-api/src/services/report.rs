use std::collections::BTreeMap;

use crate::models::quiz::{is_passing, DEFAULT_PASSING_SCORE};
use crate::models::{
    CategoryBreakdown, CategoryScore, CompletedAttempt, Grade, RecommendedVideo, ResultReport,
};
use crate::services::content_service::ContentService;
use crate::utils::time::format_clock;

pub const DEFAULT_WEAK_AREA_THRESHOLD: f64 = 0.70;

/// Thresholds applied on top of the raw scores. Kept apart from scoring so
/// pass mark and weak-area cut-off can be tuned independently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportPolicy {
    pub passing_score: u8,
    pub weak_area_threshold: f64,
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self {
            passing_score: DEFAULT_PASSING_SCORE,
            weak_area_threshold: DEFAULT_WEAK_AREA_THRESHOLD,
        }
    }
}

/// Categories answered correctly less often than `threshold` (a ratio).
pub fn weak_areas(scores: &BTreeMap<String, CategoryScore>, threshold: f64) -> Vec<String> {
    scores
        .iter()
        .filter(|(_, score)| score.total > 0 && score.ratio() < threshold)
        .map(|(category, _)| category.clone())
        .collect()
}

pub fn build_report(
    attempt: &CompletedAttempt,
    policy: ReportPolicy,
    content: &ContentService,
) -> ResultReport {
    let result = &attempt.result;
    let weak = weak_areas(&result.category_scores, policy.weak_area_threshold);
    let passed = is_passing(result.score_percent, policy.passing_score);

    let categories = result
        .category_scores
        .iter()
        .map(|(category, score)| CategoryBreakdown {
            category: category.clone(),
            correct: score.correct,
            total: score.total,
            percent: score.percent(),
            weak: weak.contains(category),
        })
        .collect();

    let recommended_videos = if !passed || !weak.is_empty() {
        content
            .videos_for_categories(&weak)
            .into_iter()
            .map(|video| RecommendedVideo {
                id: video.id.clone(),
                title: video.title.clone(),
                category: video.category.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ResultReport {
        session_id: attempt.session_id,
        completed_at: attempt.completed_at,
        score_percent: result.score_percent,
        grade: Grade::from_percent(result.score_percent),
        passed,
        passing_score: policy.passing_score,
        correct_answers: result.correct_answers,
        total_questions: result.total_questions,
        time_taken_seconds: result.time_taken_seconds,
        time_taken_display: format_clock(result.time_taken_seconds),
        average_seconds_per_question: average_seconds(
            result.time_taken_seconds,
            result.total_questions,
        ),
        categories,
        weak_areas: weak,
        recommended_videos,
        subject_id: result.subject_id.clone(),
        flagged_items: result.flagged_items.clone(),
    }
}

fn average_seconds(total_seconds: u32, questions: usize) -> u32 {
    if questions == 0 {
        return 0;
    }
    let n = questions as u64;
    ((2 * total_seconds as u64 + n) / (2 * n)) as u32
}
