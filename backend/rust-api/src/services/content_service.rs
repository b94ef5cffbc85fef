use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;

use crate::error::QuizError;
use crate::models::content::{GlossaryTerm, Video};
use crate::models::QuizItem;

const QUESTIONS_FILE: &str = "quiz_questions.json";
const TERMS_FILE: &str = "cyber_terms.json";
const VIDEOS_FILE: &str = "videos.json";

/// Category filter value meaning "no filter".
pub const ALL_CATEGORIES: &str = "all";

/// Read-only pool of quiz items, loaded once at startup.
pub trait QuestionBank: Send + Sync {
    fn get_all(&self) -> &[QuizItem];
}

/// Static learning content: question bank, glossary and video library.
#[derive(Debug, Clone, Default)]
pub struct ContentService {
    questions: Vec<QuizItem>,
    terms: Vec<GlossaryTerm>,
    videos: Vec<Video>,
}

impl ContentService {
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let questions: Vec<QuizItem> = read_json(&dir.join(QUESTIONS_FILE))?;
        let terms: Vec<GlossaryTerm> = read_json(&dir.join(TERMS_FILE))?;
        let videos: Vec<Video> = read_json(&dir.join(VIDEOS_FILE))?;

        let service = Self::from_parts(questions, terms, videos)?;
        tracing::info!(
            "Content loaded from {}: {} questions, {} terms, {} videos",
            dir.display(),
            service.questions.len(),
            service.terms.len(),
            service.videos.len()
        );
        Ok(service)
    }

    pub fn from_parts(
        questions: Vec<QuizItem>,
        terms: Vec<GlossaryTerm>,
        videos: Vec<Video>,
    ) -> Result<Self, QuizError> {
        Ok(Self {
            questions: validate_bank(questions)?,
            terms,
            videos,
        })
    }

    /// Terms whose title or definition contains `query` (case-insensitive),
    /// limited to `category` unless it is empty or `"all"`.
    pub fn search_terms(
        &self,
        query: Option<&str>,
        category: Option<&str>,
    ) -> Vec<&GlossaryTerm> {
        let needle = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();

        self.terms
            .iter()
            .filter(|term| category_matches(&term.category, category))
            .filter(|term| {
                needle.is_empty()
                    || term.title.to_lowercase().contains(&needle)
                    || term.definition.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn term(&self, id: &str) -> Option<&GlossaryTerm> {
        self.terms.iter().find(|term| term.id == id)
    }

    pub fn term_categories(&self) -> Vec<String> {
        distinct(self.terms.iter().map(|term| term.category.as_str()))
    }

    pub fn videos(&self, category: Option<&str>) -> Vec<&Video> {
        self.videos
            .iter()
            .filter(|video| category_matches(&video.category, category))
            .collect()
    }

    pub fn video(&self, id: &str) -> Option<&Video> {
        self.videos.iter().find(|video| video.id == id)
    }

    pub fn video_count(&self) -> usize {
        self.videos.len()
    }

    pub fn video_categories(&self) -> Vec<String> {
        distinct(self.videos.iter().map(|video| video.category.as_str()))
    }

    /// Videos covering any of the given categories, in library order.
    pub fn videos_for_categories(&self, categories: &[String]) -> Vec<&Video> {
        self.videos
            .iter()
            .filter(|video| categories.iter().any(|c| *c == video.category))
            .collect()
    }
}

impl QuestionBank for ContentService {
    fn get_all(&self) -> &[QuizItem] {
        &self.questions
    }
}

/// Drops malformed items with a warning; duplicate ids are rejected.
pub fn validate_bank(items: Vec<QuizItem>) -> Result<Vec<QuizItem>, QuizError> {
    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(items.len());

    for item in items {
        if !seen.insert(item.id.clone()) {
            return Err(QuizError::DataIntegrity(format!(
                "duplicate question id '{}'",
                item.id
            )));
        }
        if !item.is_well_formed() {
            tracing::warn!(
                "Skipping question '{}': {} option(s), correct index {}",
                item.id,
                item.options.len(),
                item.correct_option_index
            );
            continue;
        }
        valid.push(item);
    }

    Ok(valid)
}

fn category_matches(value: &str, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(f) if f.is_empty() || f == ALL_CATEGORIES => true,
        Some(f) => value == f,
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read content file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse content file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use std::path::PathBuf;

    fn question(id: &str, options: usize, correct: usize) -> QuizItem {
        QuizItem {
            id: id.to_string(),
            prompt_text: "?".to_string(),
            options: (0..options).map(|i| format!("option {}", i)).collect(),
            correct_option_index: correct,
            category: "Phishing".to_string(),
            difficulty: Difficulty::Hard,
            explanation_text: String::new(),
        }
    }

    fn term(id: &str, title: &str, definition: &str, category: &str) -> GlossaryTerm {
        GlossaryTerm {
            id: id.to_string(),
            title: title.to_string(),
            definition: definition.to_string(),
            description: String::new(),
            examples: vec![],
            prevention: vec![],
            category: category.to_string(),
        }
    }

    fn video(id: &str, category: &str) -> Video {
        Video {
            id: id.to_string(),
            title: format!("Video {}", id),
            description: String::new(),
            video_url: format!("https://example.com/{}", id),
            category: category.to_string(),
            duration: "5:00".to_string(),
            summary: String::new(),
            key_points: vec![],
        }
    }

    fn library() -> ContentService {
        ContentService::from_parts(
            vec![question("q1", 4, 1)],
            vec![
                term(
                    "phishing",
                    "Phishing",
                    "Impersonating trusted senders",
                    "Social Engineering",
                ),
                term(
                    "malware",
                    "Malware",
                    "Malicious software",
                    "Malicious Software",
                ),
                term(
                    "ransomware",
                    "Ransomware",
                    "Malware that encrypts files",
                    "Malicious Software",
                ),
            ],
            vec![
                video("v1", "Phishing"),
                video("v2", "Malware"),
                video("v3", "Phishing"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_validate_bank_skips_malformed_items() {
        let bank = validate_bank(vec![
            question("ok", 4, 3),
            question("out-of-range", 4, 4),
            question("single-option", 1, 0),
        ])
        .unwrap();

        assert_eq!(bank.len(), 1);
        assert_eq!(bank[0].id, "ok");
    }

    #[test]
    fn test_validate_bank_rejects_duplicate_ids() {
        let err = validate_bank(vec![question("q1", 2, 0), question("q1", 2, 1)]).unwrap_err();
        assert!(matches!(err, QuizError::DataIntegrity(_)));
    }

    #[test]
    fn test_search_matches_title_or_definition_case_insensitive() {
        let lib = library();

        let hits: Vec<_> = lib
            .search_terms(Some("MALWARE"), None)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        assert_eq!(hits, vec!["malware", "ransomware"]);

        let hits = lib.search_terms(Some("trusted"), None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "phishing");
    }

    #[test]
    fn test_search_combines_query_and_category() {
        let lib = library();
        assert_eq!(lib.search_terms(None, Some("all")).len(), 3);
        assert_eq!(lib.search_terms(Some(""), Some("Malicious Software")).len(), 2);
        assert_eq!(lib.search_terms(Some("phish"), Some("Malicious Software")).len(), 0);
        assert_eq!(lib.search_terms(None, Some("malicious software")).len(), 0);
    }

    #[test]
    fn test_categories_keep_first_seen_order() {
        let lib = library();
        assert_eq!(
            lib.term_categories(),
            vec!["Social Engineering".to_string(), "Malicious Software".to_string()]
        );
        assert_eq!(
            lib.video_categories(),
            vec!["Phishing".to_string(), "Malware".to_string()]
        );
    }

    #[test]
    fn test_video_filters() {
        let lib = library();
        assert_eq!(lib.videos(Some("Phishing")).len(), 2);
        assert_eq!(lib.videos(None).len(), 3);
        assert!(lib.video("v2").is_some());
        assert!(lib.video("nope").is_none());

        let recommended = lib.videos_for_categories(&["Malware".to_string()]);
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].id, "v2");
    }

    #[test]
    fn test_bundled_content_loads() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("content");
        let lib = ContentService::load_from_dir(&dir).unwrap();

        assert_eq!(lib.get_all().len(), 20);
        assert!(lib.get_all().iter().all(QuizItem::is_well_formed));
        assert_eq!(lib.video_count(), 8);
        assert!(lib.term("phishing").is_some());
    }
}
