use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::StreamExt;
use log::{debug, o, Logger};
use tokio::task::JoinHandle;

use crate::auth::AuthGuard;
use crate::comment::Comment;
use crate::environment::Environment;
use crate::normalization::truncate_chars;
use crate::profile::UserProfile;
use crate::queries::{Queries, QueryStatus};
use crate::video::VideoId;
use crate::views::format::format_count;
use crate::views::ViewError;

const SHORT_AUTHOR_CHARS: usize = 8;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The name shown above a comment: the author's username if their
/// profile is known, else a shortened identity.
pub fn display_name(comment: &Comment, profile: Option<&UserProfile>) -> String {
    match profile {
        Some(profile) => profile.username.clone(),
        None => format!(
            "{}...",
            truncate_chars(comment.author.as_str(), SHORT_AUTHOR_CHARS)
        ),
    }
}

/// The drawer listing a video's comments. While open it re-reads them
/// on a fixed interval.
pub struct CommentsPanel {
    logger: Arc<Logger>,
    queries: Queries,
    video_id: VideoId,
    comment_count: u64,
    poll_interval: Duration,
    comments: Arc<Mutex<QueryStatus<Vec<Comment>>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
    input: CommentInput,
}

impl CommentsPanel {
    pub fn new(environment: &Environment, video_id: VideoId, comment_count: u64) -> Self {
        let logger = environment
            .logger
            .new(o!("view" => "comments", "video_id" => video_id.to_string()));

        Self {
            logger: Arc::new(logger),
            queries: environment.queries.clone(),
            poll_interval: environment.config.comments_poll_interval,
            comments: Arc::new(Mutex::new(QueryStatus::Disabled)),
            poller: Mutex::new(None),
            input: CommentInput::new(environment, video_id.clone()),
            video_id,
            comment_count,
        }
    }

    /// Opens the panel and starts polling. Must be called from within a
    /// tokio runtime.
    pub fn open(&self) {
        let mut poller = lock(&self.poller);

        if poller.is_some() {
            return;
        }

        {
            let mut comments = lock(&self.comments);

            if comments.ready().is_none() {
                *comments = QueryStatus::Loading;
            }
        }

        let mut stream = self
            .queries
            .comments_stream(self.video_id.clone(), self.poll_interval);
        let comments = self.comments.clone();
        let logger = self.logger.clone();

        debug!(logger, "Polling comments"; "interval_ms" => self.poll_interval.as_millis() as u64);

        *poller = Some(tokio::spawn(async move {
            while let Some(status) = stream.next().await {
                let mut current = lock(&comments);

                if let (QueryStatus::Failed(e), Some(_)) = (&status, current.ready()) {
                    debug!(logger, "Keeping comments after a failed poll"; "error" => %e);
                    continue;
                }

                *current = status;
            }
        }));
    }

    /// Closes the panel and stops polling.
    pub fn close(&self) {
        if let Some(poller) = lock(&self.poller).take() {
            poller.abort();
            debug!(self.logger, "Stopped polling comments");
        }
    }

    pub fn is_open(&self) -> bool {
        lock(&self.poller).is_some()
    }

    pub fn comments(&self) -> QueryStatus<Vec<Comment>> {
        lock(&self.comments).clone()
    }

    pub fn header(&self) -> String {
        format!("{} Comments", format_count(self.comment_count))
    }

    pub fn input(&self) -> &CommentInput {
        &self.input
    }

    /// Reads the comments through the cache, fetching them if a write
    /// has invalidated it.
    pub async fn refresh(&self) {
        let status = self.queries.comments(Some(&self.video_id)).await;
        *lock(&self.comments) = status;
    }

    /// Posts the pending comment, then re-reads the list.
    pub async fn submit_comment(&self) -> Result<(), ViewError> {
        self.input.submit().await?;
        self.refresh().await;

        Ok(())
    }
}

impl Drop for CommentsPanel {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Default)]
struct InputState {
    text: String,
    pending: bool,
}

/// The text box at the bottom of the comments panel.
pub struct CommentInput {
    queries: Queries,
    video_id: VideoId,
    limit: usize,
    state: Mutex<InputState>,
}

impl CommentInput {
    pub fn new(environment: &Environment, video_id: VideoId) -> Self {
        Self {
            queries: environment.queries.clone(),
            video_id,
            limit: environment.config.limits.comment_chars,
            state: Mutex::new(InputState::default()),
        }
    }

    pub fn set_text(&self, text: &str) {
        lock(&self.state).text = truncate_chars(text, self.limit);
    }

    pub fn text(&self) -> String {
        lock(&self.state).text.clone()
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending
    }

    pub fn can_submit(&self) -> bool {
        let state = lock(&self.state);
        !state.pending && !state.text.trim().is_empty()
    }

    /// Posts the trimmed text. Only one submission runs at a time; the
    /// text is cleared once the backend accepts it.
    pub async fn submit(&self) -> Result<(), ViewError> {
        AuthGuard::require(self.queries.session(), "post a comment")?;

        let text = {
            let mut state = lock(&self.state);

            if state.pending {
                return Err(ViewError::Busy);
            }

            let text = state.text.trim().to_owned();

            if text.is_empty() {
                return Err(ViewError::invalid("Comment cannot be empty"));
            }

            state.pending = true;
            text
        };

        let result = self.queries.add_comment(&self.video_id, text).await;
        let mut state = lock(&self.state);
        state.pending = false;

        result?;
        state.text.clear();

        Ok(())
    }
}
