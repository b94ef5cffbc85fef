use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::metrics::VIDEOS_WATCHED_TOTAL;
use crate::models::content::WatchProgress;
use crate::models::quiz::round_half_up_percent;
use crate::models::SubjectId;
use crate::services::content_service::ContentService;

/// Watched-video sets, one per signed-in student. Lives for the process.
#[derive(Debug, Default)]
pub struct ProgressService {
    watched: RwLock<HashMap<String, HashSet<String>>>,
}

impl ProgressService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the video was not marked before.
    pub async fn mark_watched(&self, subject: &SubjectId, video_id: &str) -> bool {
        let mut watched = self.watched.write().await;
        let newly = watched
            .entry(subject.as_str().to_string())
            .or_default()
            .insert(video_id.to_string());

        if newly {
            VIDEOS_WATCHED_TOTAL.inc();
            tracing::debug!("Video {} marked watched by {}", video_id, subject);
        }
        newly
    }

    /// Returns `true` when the video was marked before.
    pub async fn unmark_watched(&self, subject: &SubjectId, video_id: &str) -> bool {
        let mut watched = self.watched.write().await;
        watched
            .get_mut(subject.as_str())
            .map(|set| set.remove(video_id))
            .unwrap_or(false)
    }

    /// Flips the watched flag and returns the new value.
    pub async fn toggle_watched(&self, subject: &SubjectId, video_id: &str) -> bool {
        if self.unmark_watched(subject, video_id).await {
            false
        } else {
            self.mark_watched(subject, video_id).await
        }
    }

    pub async fn progress(&self, subject: &SubjectId, content: &ContentService) -> WatchProgress {
        let watched = self.watched.read().await;
        let empty = HashSet::new();
        let mine = watched.get(subject.as_str()).unwrap_or(&empty);

        // Library order; ids no longer in the library are ignored
        let watched_ids: Vec<String> = content
            .videos(None)
            .into_iter()
            .filter(|video| mine.contains(&video.id))
            .map(|video| video.id.clone())
            .collect();

        let total = content.video_count();
        let count = watched_ids.len();

        WatchProgress {
            watched: count,
            total,
            percent: round_half_up_percent(count, total),
            all_completed: total > 0 && count == total,
            watched_ids,
        }
    }
}
