use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency per normalized route.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapses per-entity path segments into `{id}` so label cardinality stays
/// bounded. Content slugs (`/glossary/phishing`) are entity ids too.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();

    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let parent = if i > 0 { segments[i - 1] } else { "" };
            if is_uuid_like(segment) || is_numeric_id(segment) || is_content_slug(parent, segment)
            {
                "{id}"
            } else {
                *segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Segment directly below a content collection, other than its fixed routes.
fn is_content_slug(parent: &str, segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    match parent {
        "glossary" => segment != "categories",
        "videos" => segment != "progress",
        _ => false,
    }
}

/// Check if string looks like a UUID
fn is_uuid_like(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

/// Check if string is a numeric ID
fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
