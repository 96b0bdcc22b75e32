use crate::environment::Environment;
use crate::queries::Queries;
use crate::video::VideoMeta;

/// The home feed: one video at a time, swiped vertically, most recent
/// first.
pub struct FeedView {
    queries: Queries,
    videos: Vec<VideoMeta>,
    index: usize,
}

impl FeedView {
    pub fn new(environment: &Environment) -> Self {
        let queries = environment.queries.clone();
        let videos = queries.videos();

        Self {
            queries,
            videos,
            index: 0,
        }
    }

    /// Re-reads the videos, staying on the current one if it's still there.
    pub fn refresh(&mut self) {
        let current = self.current().map(|video| video.id.clone());
        self.videos = self.queries.videos();

        self.index = current
            .and_then(|id| self.videos.iter().position(|video| video.id == id))
            .unwrap_or(0);
    }

    pub fn videos(&self) -> &[VideoMeta] {
        &self.videos
    }

    pub fn current(&self) -> Option<&VideoMeta> {
        self.videos.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    /// Moves to the next video. Returns `false` at the end of the feed.
    pub fn next(&mut self) -> bool {
        if self.index + 1 < self.videos.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    /// Moves to the previous video. Returns `false` at the top.
    pub fn previous(&mut self) -> bool {
        if self.index > 0 {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Makes the video at `index` the active one, if there is one.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.videos.len() {
            self.index = index;
            true
        } else {
            false
        }
    }
}
