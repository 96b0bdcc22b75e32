use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, o, Logger};
use url::Url;

use crate::auth::AuthGuard;
use crate::environment::Environment;
use crate::queries::Queries;
use crate::video::VideoMeta;
use crate::views::format::format_count;
use crate::views::ViewError;

#[derive(Default)]
struct ActionState {
    liked: bool,
    like_count: u64,
    like_pending: bool,
    following: bool,
    follow_pending: bool,
}

/// The like, comment, share and follow buttons beside a video. Likes
/// and follows show immediately and are rolled back if the backend
/// refuses them.
pub struct ActionButtons {
    logger: Arc<Logger>,
    queries: Queries,
    video: VideoMeta,
    state: Mutex<ActionState>,
}

impl ActionButtons {
    pub fn new(environment: &Environment, video: VideoMeta, following: bool) -> Self {
        let logger = environment
            .logger
            .new(o!("view" => "actions", "video_id" => video.id.to_string()));

        Self {
            logger: Arc::new(logger),
            queries: environment.queries.clone(),
            state: Mutex::new(ActionState {
                like_count: video.like_count,
                following,
                ..Default::default()
            }),
            video,
        }
    }

    /// Likes the video, once per view. Does nothing if already liked or
    /// while a like is pending.
    pub async fn like(&self) -> Result<(), ViewError> {
        AuthGuard::require(self.queries.session(), "like this video")?;

        {
            let mut state = self.lock();

            if state.liked || state.like_pending {
                return Ok(());
            }

            state.liked = true;
            state.like_count += 1;
            state.like_pending = true;
        }

        let result = self.queries.like_video(&self.video.id).await;
        let mut state = self.lock();
        state.like_pending = false;

        if let Err(e) = result {
            debug!(self.logger, "Rolling back like");
            state.liked = false;
            state.like_count = state.like_count.saturating_sub(1);
            return Err(e.into());
        }

        Ok(())
    }

    /// Follows the uploader. Does nothing if already following.
    pub async fn follow(&self) -> Result<(), ViewError> {
        AuthGuard::require(self.queries.session(), "follow this creator")?;

        {
            let mut state = self.lock();

            if state.following || state.follow_pending {
                return Ok(());
            }

            state.following = true;
            state.follow_pending = true;
        }

        let result = self.queries.follow(&self.video.uploader).await;
        let mut state = self.lock();
        state.follow_pending = false;

        if let Err(e) = result {
            debug!(self.logger, "Rolling back follow");
            state.following = false;
            return Err(e.into());
        }

        Ok(())
    }

    /// The text handed to the share sheet for the page at `page`.
    pub fn share_text(&self, page: &Url) -> String {
        format!("{} {}", self.video.title, page)
    }

    pub fn video(&self) -> &VideoMeta {
        &self.video
    }

    pub fn liked(&self) -> bool {
        self.lock().liked
    }

    pub fn like_count(&self) -> u64 {
        self.lock().like_count
    }

    pub fn like_label(&self) -> String {
        format_count(self.like_count())
    }

    pub fn comment_label(&self) -> String {
        format_count(self.video.comment_count)
    }

    pub fn is_like_pending(&self) -> bool {
        self.lock().like_pending
    }

    pub fn following(&self) -> bool {
        self.lock().following
    }

    pub fn is_follow_pending(&self) -> bool {
        self.lock().follow_pending
    }

    fn lock(&self) -> MutexGuard<'_, ActionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LoginRequired;
    use crate::backend::mock::Operation;
    use crate::errors::ClientError;
    use crate::identity::{Identity, Session};
    use crate::registry::tests::video;
    use crate::views::tests::environment;

    fn signed_in() -> (Arc<crate::backend::mock::MockBackend>, Environment) {
        environment(Session::signed_in(Identity::new("alice-principal")))
    }

    #[tokio::test]
    async fn likes_show_before_the_backend_answers() {
        let (backend, environment) = signed_in();
        let mut clip = video("clip", "bob-principal", 1);
        clip.like_count = 4;
        let buttons = ActionButtons::new(&environment, clip, false);

        let watch = async {
            tokio::task::yield_now().await;
            (buttons.liked(), buttons.like_count(), buttons.is_like_pending())
        };

        let (during, result) = tokio::join!(watch, buttons.like());

        assert_eq!(result, Ok(()));
        assert_eq!(during, (true, 5, true));
        assert_eq!(buttons.like_count(), 5);
        assert!(!buttons.is_like_pending());
        assert_eq!(backend.likes(&buttons.video().id), 1);
    }

    #[tokio::test]
    async fn failed_likes_roll_back() {
        let (backend, environment) = signed_in();
        let mut clip = video("clip", "bob-principal", 1);
        clip.like_count = 4;
        let buttons = ActionButtons::new(&environment, clip, false);
        backend.fail(Operation::LikeVideo, ClientError::Unavailable);

        let result = buttons.like().await;

        assert_eq!(result, Err(ViewError::Remote(ClientError::Unavailable)));
        assert!(!buttons.liked());
        assert_eq!(buttons.like_count(), 4);
    }

    #[tokio::test]
    async fn liking_twice_counts_once() {
        let (backend, environment) = signed_in();
        let buttons = ActionButtons::new(&environment, video("clip", "bob-principal", 1), false);

        buttons.like().await.unwrap();
        buttons.like().await.unwrap();

        assert_eq!(buttons.like_count(), 1);
        assert_eq!(backend.calls(Operation::LikeVideo), 1);
    }

    #[tokio::test]
    async fn anonymous_callers_are_asked_to_log_in() {
        let (backend, environment) = environment(Session::anonymous());
        let buttons = ActionButtons::new(&environment, video("clip", "bob-principal", 1), false);

        assert_eq!(
            buttons.like().await,
            Err(ViewError::LoginRequired(LoginRequired {
                action: String::from("like this video")
            }))
        );
        assert!(matches!(buttons.follow().await, Err(ViewError::LoginRequired(_))));
        assert_eq!(buttons.like_count(), 0);
        assert_eq!(backend.calls(Operation::LikeVideo), 0);
    }

    #[tokio::test]
    async fn refused_follows_roll_back() {
        let (_backend, environment) = signed_in();
        let own = ActionButtons::new(&environment, video("clip", "alice-principal", 1), false);

        assert!(own.follow().await.is_err());
        assert!(!own.following());

        let other = ActionButtons::new(&environment, video("clip", "bob-principal", 1), false);
        other.follow().await.unwrap();
        assert!(other.following());
    }

    #[test]
    fn share_text_names_the_video() {
        let (_backend, environment) = environment(Session::anonymous());
        let buttons = ActionButtons::new(&environment, video("clip", "bob-principal", 1), false);
        let page = Url::parse("https://vibe.example.com/").unwrap();

        assert_eq!(buttons.share_text(&page), "Title of clip https://vibe.example.com/");
        assert_eq!(buttons.comment_label(), "0");
    }
}
