use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use cyberaware_api::config::QuizSettings;
use cyberaware_api::services::content_service::{ContentService, QuestionBank};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tower::ServiceExt;

mod common;

use common::{send, token_for};

/// Correct option per question id, read from the bundled bank.
fn answer_key() -> HashMap<String, usize> {
    ContentService::load_from_dir(&common::content_dir())
        .unwrap()
        .get_all()
        .iter()
        .map(|item| (item.id.clone(), item.correct_option_index))
        .collect()
}

async fn start(app: &Router, token: &str) -> Value {
    let (status, body) = send(app, "POST", "/api/v1/quiz/sessions", Some(token), None).await;
    assert_eq!(status, StatusCode::CREATED, "start failed: {}", body);
    body
}

fn session_uri(session: &Value, suffix: &str) -> String {
    format!(
        "/api/v1/quiz/sessions/{}{}",
        session["session_id"].as_str().unwrap(),
        suffix
    )
}

/// Answers the focused question and advances; returns the advance response.
async fn answer_and_advance(app: &Router, token: &str, view: &Value, option: usize) -> Value {
    let position = view["position"].as_u64().unwrap();
    let (status, _) = send(
        app,
        "PUT",
        &session_uri(view, "/answer"),
        Some(token),
        Some(json!({ "position": position, "option_index": option })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, "POST", &session_uri(view, "/advance"), Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_anonymous_start_is_unauthorized() {
    let app = common::create_test_app();

    let (status, _) = send(&app, "POST", "/api/v1/quiz/sessions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/quiz/sessions",
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_start_returns_first_question_without_answer_key() {
    let app = common::create_test_app();
    let token = token_for("alice");

    let session = start(&app, &token).await;

    assert_eq!(session["status"], "in_progress");
    assert_eq!(session["total_questions"], 15);
    assert_eq!(session["remaining_seconds"], 1200);
    assert_eq!(session["position"], 0);
    let question = &session["question"];
    assert!(question["prompt"].is_string());
    assert!(question.get("correctAnswer").is_none());
    assert!(question.get("correct_option_index").is_none());
    assert!(question.get("explanation").is_none());

    let (status, view) = send(
        &app,
        "GET",
        &session_uri(&session, "?explain=true"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(view["question"]["explanation"].is_string());
}

#[tokio::test]
async fn test_complete_attempt_produces_report_and_history() {
    let app = common::create_test_app();
    let token = token_for("alice");
    let key = answer_key();

    let mut view = start(&app, &token).await;
    let mut seen = Vec::new();
    loop {
        let question_id = view["question"]["id"].as_str().unwrap().to_string();
        let correct = key[&question_id];
        // Miss the first question only
        let option = if seen.is_empty() { (correct + 1) % 4 } else { correct };
        seen.push(question_id);

        let step = answer_and_advance(&app, &token, &view, option).await;
        view = step["session"].clone();
        if step["finished"] == true {
            break;
        }
    }

    assert_eq!(seen.len(), 15);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 15, "questions must be distinct");
    assert_eq!(view["status"], "finished");
    assert!(view["question"].is_null());

    let (status, report) = send(&app, "GET", &session_uri(&view, "/result"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["score_percent"], 93);
    assert_eq!(report["correct_answers"], 14);
    assert_eq!(report["total_questions"], 15);
    assert_eq!(report["grade"], "A");
    assert_eq!(report["passed"], true);
    assert_eq!(report["subject_id"], "alice");
    let category_total: u64 = report["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["total"].as_u64().unwrap())
        .sum();
    assert_eq!(category_total, 15);

    // Finished sessions are frozen
    let (status, _) = send(
        &app,
        "PUT",
        &session_uri(&view, "/answer"),
        Some(&token),
        Some(json!({ "position": 0, "option_index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Finishing again returns the same report
    let (status, again) = send(&app, "POST", &session_uri(&view, "/finish"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["score_percent"], 93);

    let (status, history) = send(&app, "GET", "/api/v1/quiz/results", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["session_id"], view["session_id"]);
}

#[tokio::test]
async fn test_early_finish_counts_unanswered_as_incorrect() {
    let app = common::create_test_app_with(QuizSettings {
        sample_size: 4,
        ..QuizSettings::default()
    });
    let token = token_for("bob");
    let key = answer_key();

    let view = start(&app, &token).await;
    let correct = key[view["question"]["id"].as_str().unwrap()];
    let (status, _) = send(
        &app,
        "PUT",
        &session_uri(&view, "/answer"),
        Some(&token),
        Some(json!({ "position": 0, "option_index": correct })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, report) = send(&app, "POST", &session_uri(&view, "/finish"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["score_percent"], 25);
    assert_eq!(report["passed"], false);
    assert_eq!(report["grade"], "F");
    assert!(!report["weak_areas"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_answer_rules() {
    let app = common::create_test_app();
    let token = token_for("carol");
    let view = start(&app, &token).await;

    // Advancing needs a selection
    let (status, _) = send(&app, "POST", &session_uri(&view, "/advance"), Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Only the focused question accepts answers
    let (status, _) = send(
        &app,
        "PUT",
        &session_uri(&view, "/answer"),
        Some(&token),
        Some(json!({ "position": 3, "option_index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "PUT",
        &session_uri(&view, "/answer"),
        Some(&token),
        Some(json!({ "position": 0, "option_index": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Re-selecting replaces the earlier choice
    for option in [1, 2] {
        let (status, body) = send(
            &app,
            "PUT",
            &session_uri(&view, "/answer"),
            Some(&token),
            Some(json!({ "position": 0, "option_index": option })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected_option"], option);
        assert_eq!(body["answered"], 1);
    }

    // No result before the attempt ends
    let (status, _) = send(&app, "GET", &session_uri(&view, "/result"), Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_answer_body_is_bad_request() {
    let app = common::create_test_app();
    let token = token_for("dave");
    let view = start(&app, &token).await;

    let (status, body) = send(
        &app,
        "PUT",
        &session_uri(&view, "/answer"),
        Some(&token),
        Some(json!({ "position": "first" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_sessions_are_private_to_their_owner() {
    let app = common::create_test_app();
    let alice = token_for("alice");
    let mallory = token_for("mallory");
    let view = start(&app, &alice).await;

    let (status, _) = send(&app, "GET", &session_uri(&view, ""), Some(&mallory), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &session_uri(&view, ""), Some(&mallory), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &session_uri(&view, ""), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &session_uri(&view, ""), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_abandon_removes_session() {
    let app = common::create_test_app();
    let token = token_for("erin");
    let view = start(&app, &token).await;

    let (status, _) = send(&app, "DELETE", &session_uri(&view, ""), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &session_uri(&view, ""), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, history) = send(&app, "GET", "/api/v1/quiz/results", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_sample_is_service_unavailable() {
    let app = common::create_test_app_with(QuizSettings {
        sample_size: 25,
        ..QuizSettings::default()
    });

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/quiz/sessions",
        Some(&token_for("frank")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_and_malformed_session_ids() {
    let app = common::create_test_app();
    let token = token_for("grace");

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/quiz/sessions/550e8400-e29b-41d4-a716-446655440000",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/api/v1/quiz/sessions/nope", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_results_require_sign_in() {
    let app = common::create_test_app();
    let (status, _) = send(&app, "GET", "/api/v1/quiz/results", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_finishes_session_with_zero_score() {
    let app = common::create_test_app_with(QuizSettings {
        sample_size: 3,
        duration_seconds: 2,
        ..QuizSettings::default()
    });
    let token = token_for("heidi");
    let view = start(&app, &token).await;

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let (status, after) = send(&app, "GET", &session_uri(&view, ""), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["status"], "finished");
    assert_eq!(after["remaining_seconds"], 0);

    let (status, report) = send(&app, "GET", &session_uri(&view, "/result"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["score_percent"], 0);
    assert_eq!(report["time_taken_seconds"], 2);
    assert_eq!(report["time_taken_display"], "0:02");
}

#[tokio::test(start_paused = true)]
async fn test_result_outlives_evicted_session() {
    let app = common::create_test_app_with(QuizSettings {
        sample_size: 3,
        duration_seconds: 2,
        retention_seconds: 3,
        ..QuizSettings::default()
    });
    let token = token_for("olga");
    let view = start(&app, &token).await;

    // Expires at 2s, swept on the 6s pass
    tokio::time::sleep(Duration::from_millis(6500)).await;

    let (status, _) = send(&app, "GET", &session_uri(&view, ""), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let result_uri = session_uri(&view, "/result");
    let (status, report) = send(&app, "GET", &result_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["score_percent"], 0);
    assert_eq!(report["session_id"], view["session_id"]);

    let finish_uri = session_uri(&view, "/finish");
    let (status, again) = send(&app, "POST", &finish_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["completed_at"], report["completed_at"]);

    let (status, _) = send(&app, "GET", &result_uri, Some(&token_for("mallory")), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, history) = send(&app, "GET", "/api/v1/quiz/results", Some(&token), None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stream_emits_ticks_until_expiry() {
    let app = common::create_test_app_with(QuizSettings {
        sample_size: 3,
        duration_seconds: 2,
        ..QuizSettings::default()
    });
    let token = token_for("ivan");
    let view = start(&app, &token).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(session_uri(&view, "/stream"))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&body);

    assert_eq!(text.matches("event: timer-tick").count(), 2);
    assert_eq!(text.matches("event: time-expired").count(), 1);
    assert!(text.contains("\"remaining_seconds\":1"));
}
