use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Quiz Metrics
    pub static ref QUIZ_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_sessions_total",
        "Quiz sessions by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref QUIZ_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "quiz_sessions_active",
        "Number of quiz sessions currently in progress"
    )
    .unwrap();

    pub static ref ANSWERS_RECORDED_TOTAL: IntCounter = register_int_counter!(
        "quiz_answers_recorded_total",
        "Total number of answers recorded"
    )
    .unwrap();

    pub static ref QUIZ_SCORE_PERCENT: Histogram = register_histogram!(
        "quiz_score_percent",
        "Distribution of final quiz scores",
        vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
    )
    .unwrap();

    // Learning content
    pub static ref VIDEOS_WATCHED_TOTAL: IntCounter = register_int_counter!(
        "videos_watched_total",
        "Total number of videos marked as watched"
    )
    .unwrap();

    // Identity service
    pub static ref IDENTITY_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "identity_requests_total",
        "Calls proxied to the identity service",
        &["operation", "status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Session lifecycle events counted under `quiz_sessions_total`.
pub fn record_session_outcome(outcome: &str) {
    QUIZ_SESSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper: track a call to the identity service
pub async fn track_identity_call<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };

    IDENTITY_REQUESTS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    result
}
