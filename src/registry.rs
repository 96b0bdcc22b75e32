use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::identity::Identity;
use crate::video::{VideoId, VideoMeta};

/// How a list of videos is ordered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortOrder {
    /// Most recently uploaded first.
    Recent,

    /// Most liked first, then most recent.
    Trending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Recent
    }
}

struct Entry {
    video: VideoMeta,
    sequence: u64,
}

#[derive(Default)]
struct Inner {
    videos: HashMap<VideoId, Entry>,
    inserted: u64,
}

/// The videos uploaded during this session, keyed by ID. Lives as long
/// as the process; nothing is ever removed.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a video whose upload the backend acknowledged. An entry
    /// with the same ID is replaced but keeps its place among ties.
    pub(crate) fn insert(&self, video: VideoMeta) {
        let mut inner = self.write();
        inner.inserted += 1;
        let next = inner.inserted;

        let sequence = inner
            .videos
            .get(&video.id)
            .map_or(next, |existing| existing.sequence);

        inner.videos.insert(video.id.clone(), Entry { video, sequence });
    }

    pub fn get(&self, id: &VideoId) -> Option<VideoMeta> {
        self.read().videos.get(id).map(|entry| entry.video.clone())
    }

    pub fn len(&self) -> usize {
        self.read().videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every video, most recent first. Ties keep insertion order.
    pub fn list(&self) -> Vec<VideoMeta> {
        self.list_by(SortOrder::Recent)
    }

    pub fn list_by(&self, order: SortOrder) -> Vec<VideoMeta> {
        let inner = self.read();
        let mut entries = inner.videos.values().collect::<Vec<_>>();

        match order {
            SortOrder::Recent => entries.sort_by_key(|entry| {
                (Reverse(entry.video.upload_timestamp), entry.sequence)
            }),
            SortOrder::Trending => entries.sort_by_key(|entry| {
                (
                    Reverse(entry.video.like_count),
                    Reverse(entry.video.upload_timestamp),
                    entry.sequence,
                )
            }),
        }

        entries.into_iter().map(|entry| entry.video.clone()).collect()
    }

    /// Videos uploaded by `uploader`, most recent first.
    pub fn filter_by_uploader(&self, uploader: &Identity) -> Vec<VideoMeta> {
        self.list()
            .into_iter()
            .filter(|video| &video.uploader == uploader)
            .collect()
    }

    /// Videos whose title or description contains `query`, ignoring
    /// case, most recent first. A blank query matches everything.
    pub fn filter_by_text(&self, query: &str) -> Vec<VideoMeta> {
        filter_by_text(self.list(), query)
    }
}

/// Keeps the videos whose title or description contains `query`,
/// ignoring case. A blank query keeps everything.
pub fn filter_by_text(videos: Vec<VideoMeta>, query: &str) -> Vec<VideoMeta> {
    if query.trim().is_empty() {
        return videos;
    }

    let needle = query.to_lowercase();

    videos
        .into_iter()
        .filter(|video| video.matches_lowercase(&needle))
        .collect()
}

impl Registry {
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use url::Url;

    use super::*;
    use crate::video::Timestamp;

    pub(crate) fn video(id: &str, uploader: &str, timestamp: Timestamp) -> VideoMeta {
        VideoMeta {
            id: VideoId::new(id),
            title: format!("Title of {}", id),
            description: String::new(),
            uploader: Identity::new(uploader),
            upload_timestamp: timestamp,
            duration_seconds: 30,
            like_count: 0,
            comment_count: 0,
            video_url: Url::parse("https://media.example.com/videos/")
                .unwrap()
                .join(id)
                .unwrap(),
        }
    }

    fn ids(videos: &[VideoMeta]) -> Vec<&str> {
        videos.iter().map(|video| video.id.as_str()).collect()
    }

    #[test]
    fn list_is_most_recent_first() {
        let registry = Registry::new();
        registry.insert(video("five", "a", 5));
        registry.insert(video("one", "a", 1));
        registry.insert(video("three", "a", 3));

        let timestamps = registry
            .list()
            .iter()
            .map(|video| video.upload_timestamp)
            .collect::<Vec<_>>();

        assert_eq!(timestamps, vec![5, 3, 1]);
    }

    #[test]
    fn ties_keep_insertion_order_across_upserts() {
        let registry = Registry::new();
        registry.insert(video("a", "x", 7));
        registry.insert(video("b", "x", 7));

        let mut replacement = video("a", "x", 7);
        replacement.title = String::from("Replaced");
        registry.insert(replacement);

        let list = registry.list();
        assert_eq!(ids(&list), vec!["a", "b"]);
        assert_eq!(list[0].title, "Replaced");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn uploader_filter_only_keeps_their_videos() {
        let registry = Registry::new();
        registry.insert(video("a", "alice", 1));
        registry.insert(video("b", "bob", 2));
        registry.insert(video("c", "alice", 3));

        assert_eq!(ids(&registry.filter_by_uploader(&Identity::new("alice"))), vec!["c", "a"]);
        assert!(registry.filter_by_uploader(&Identity::new("carol")).is_empty());
    }

    #[test]
    fn text_filter_ignores_case_and_checks_descriptions() {
        let registry = Registry::new();
        let mut sunset = video("sunset", "a", 1);
        sunset.title = String::from("Golden SUNSET");
        let mut surf = video("surf", "a", 2);
        surf.description = String::from("Catching waves at sunset");
        registry.insert(sunset);
        registry.insert(surf);
        registry.insert(video("other", "a", 3));

        assert_eq!(ids(&registry.filter_by_text("Sunset")), vec!["surf", "sunset"]);
        assert_eq!(registry.filter_by_text("  ").len(), 3);
        assert!(registry.filter_by_text("mountain").is_empty());
    }

    #[test]
    fn text_filter_matches_surrounding_spaces_literally() {
        let registry = Registry::new();
        let mut cats = video("cats", "a", 1);
        cats.title = String::from("Cats on a keyboard");
        registry.insert(cats);

        assert!(registry.filter_by_text(" cats").is_empty());
        assert_eq!(ids(&registry.filter_by_text("on a ")), vec!["cats"]);
    }

    #[test]
    fn trending_orders_by_likes() {
        let registry = Registry::new();
        let mut liked = video("liked", "a", 1);
        liked.like_count = 9;
        registry.insert(liked);
        registry.insert(video("new", "a", 2));

        assert_eq!(ids(&registry.list_by(SortOrder::Trending)), vec!["liked", "new"]);
        assert_eq!(ids(&registry.list_by(SortOrder::Recent)), vec!["new", "liked"]);
    }
}
