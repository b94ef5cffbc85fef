use serde::{Deserialize, Serialize};

/// Glossary entry shown in the cyber terms section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub id: String,
    pub title: String,
    pub definition: String,
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub prevention: Vec<String>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub category: String,
    /// Display length, e.g. `8:45`.
    pub duration: String,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GlossaryQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoQuery {
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchProgress {
    pub watched: usize,
    pub total: usize,
    pub percent: u8,
    pub all_completed: bool,
    pub watched_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<Video>,
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GlossaryListResponse {
    pub terms: Vec<GlossaryTerm>,
    pub total: usize,
}
