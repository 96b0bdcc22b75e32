use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use futures::future::{BoxFuture, FutureExt};

use crate::blob::MediaBlob;
use crate::comment::Comment;
use crate::errors::ClientError;
use crate::identity::{Identity, Session};
use crate::profile::{UserProfile, UserRole};
use crate::video::{self, UploadRequest, VideoId};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
const MAX_DURATION_SECONDS: u64 = 600;

/// Names the remote operations, for counting calls and injecting failures.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    GetCallerUserProfile,
    SaveCallerUserProfile,
    GetUserProfile,
    IsCallerAdmin,
    GetCallerUserRole,
    AssignCallerUserRole,
    LikeVideo,
    Follow,
    GetComments,
    AddComment,
    UploadVideo,
}

#[derive(Default)]
struct State {
    profiles: HashMap<Identity, UserProfile>,
    roles: HashMap<Identity, UserRole>,
    comments: HashMap<VideoId, Vec<Comment>>,
    likes: HashMap<VideoId, HashSet<Identity>>,
    follows: HashMap<Identity, HashSet<Identity>>,
    videos: HashMap<VideoId, (UploadRequest, Identity)>,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, ClientError>,
    comments_created: u64,
}

/// An in-memory backend bound to a session, with call counting and
/// failure injection.
pub struct MockBackend {
    session: Session,
    state: RwLock<State>,
    chunk_size: usize,
}

impl MockBackend {
    pub fn new(session: Session) -> Self {
        MockBackend {
            session,
            state: RwLock::new(State::default()),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets how many bytes are sent between progress reports.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Makes every call to `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: Operation, error: ClientError) {
        self.state().failures.insert(operation, error);
    }

    pub fn clear_failure(&self, operation: Operation) {
        self.state().failures.remove(&operation);
    }

    /// Number of times `operation` has been called.
    pub fn calls(&self, operation: Operation) -> usize {
        self.state().calls.get(&operation).copied().unwrap_or(0)
    }

    pub fn insert_profile(&self, user: Identity, profile: UserProfile) {
        self.state().profiles.insert(user, profile);
    }

    pub fn set_role(&self, user: Identity, role: UserRole) {
        self.state().roles.insert(user, role);
    }

    pub fn uploaded(&self, id: &VideoId) -> Option<UploadRequest> {
        self.state().videos.get(id).map(|(request, _)| request.clone())
    }

    pub fn likes(&self, id: &VideoId) -> usize {
        self.state().likes.get(id).map_or(0, HashSet::len)
    }

    pub fn comments(&self, id: &VideoId) -> Vec<Comment> {
        self.state().comments.get(id).cloned().unwrap_or_default()
    }

    fn state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counts the call and returns any injected failure.
    fn begin(&self, operation: Operation) -> Result<(), ClientError> {
        let mut state = self.state();
        *state.calls.entry(operation).or_insert(0) += 1;

        match state.failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn caller(&self, action: &str) -> Result<Identity, ClientError> {
        self.session
            .identity()
            .ok_or_else(|| ClientError::unauthorized(format!("Only users can {}", action)))
    }

    fn role_of(&self, user: &Identity) -> UserRole {
        self.state()
            .roles
            .get(user)
            .copied()
            .unwrap_or(UserRole::User)
    }

    async fn upload(&self, request: UploadRequest, video: MediaBlob) -> Result<(), ClientError> {
        self.state()
            .calls
            .entry(Operation::UploadVideo)
            .and_modify(|count| *count += 1)
            .or_insert(1);

        let caller = self.caller("upload videos")?;

        if request.duration_seconds > MAX_DURATION_SECONDS {
            return Err(ClientError::rejected(format!(
                "Video duration exceeds maximum of {} seconds",
                MAX_DURATION_SECONDS
            )));
        }

        let total = video.len();
        let mut sent = 0;

        while sent < total {
            sent = (sent + self.chunk_size).min(total);
            video.report_progress(sent as f64 * 100.0 / total as f64);
            tokio::task::yield_now().await;
        }

        video.report_progress(100.0);
        video.report_transferred();
        tokio::task::yield_now().await;

        let mut state = self.state();

        if let Some(error) = state.failures.get(&Operation::UploadVideo) {
            return Err(error.clone());
        }

        if state.videos.contains_key(&request.id) {
            return Err(ClientError::rejected("Video id already exists"));
        }

        state.videos.insert(request.id.clone(), (request, caller));

        Ok(())
    }
}

// these can be simplified once async functions in traits are stabilized
impl super::Backend for MockBackend {
    fn get_caller_user_profile(&self) -> BoxFuture<Result<UserProfile, ClientError>> {
        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::GetCallerUserProfile)?;
            let caller = self.caller("view their profile")?;

            self.state()
                .profiles
                .get(&caller)
                .cloned()
                .ok_or_else(|| ClientError::not_found(format!("profile for {}", caller)))
        }
        .boxed()
    }

    fn save_caller_user_profile(&self, profile: UserProfile) -> BoxFuture<Result<(), ClientError>> {
        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::SaveCallerUserProfile)?;
            let caller = self.caller("save profiles")?;

            self.state().profiles.insert(caller, profile);

            Ok(())
        }
        .boxed()
    }

    fn get_user_profile(&self, user: &Identity) -> BoxFuture<Result<Option<UserProfile>, ClientError>> {
        let user = user.clone();

        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::GetUserProfile)?;

            Ok(self.state().profiles.get(&user).cloned())
        }
        .boxed()
    }

    fn is_caller_admin(&self) -> BoxFuture<Result<bool, ClientError>> {
        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::IsCallerAdmin)?;

            Ok(match self.session.identity() {
                Some(caller) => self.role_of(&caller) == UserRole::Admin,
                None => false,
            })
        }
        .boxed()
    }

    fn get_caller_user_role(&self) -> BoxFuture<Result<UserRole, ClientError>> {
        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::GetCallerUserRole)?;

            Ok(match self.session.identity() {
                Some(caller) => self.role_of(&caller),
                None => UserRole::Guest,
            })
        }
        .boxed()
    }

    fn assign_caller_user_role(&self, user: &Identity, role: UserRole) -> BoxFuture<Result<(), ClientError>> {
        let user = user.clone();

        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::AssignCallerUserRole)?;
            let caller = self.caller("assign roles")?;

            if self.role_of(&caller) != UserRole::Admin {
                return Err(ClientError::unauthorized("Only admins can assign user roles"));
            }

            self.state().roles.insert(user, role);

            Ok(())
        }
        .boxed()
    }

    fn like_video(&self, video_id: &VideoId) -> BoxFuture<Result<(), ClientError>> {
        let video_id = video_id.clone();

        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::LikeVideo)?;
            let caller = self.caller("like videos")?;

            self.state().likes.entry(video_id).or_default().insert(caller);

            Ok(())
        }
        .boxed()
    }

    fn follow(&self, user: &Identity) -> BoxFuture<Result<(), ClientError>> {
        let user = user.clone();

        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::Follow)?;
            let caller = self.caller("follow other users")?;

            if caller == user {
                return Err(ClientError::rejected("Cannot follow yourself"));
            }

            let mut state = self.state();

            if state.follows.entry(caller.clone()).or_default().insert(user.clone()) {
                if let Some(profile) = state.profiles.get_mut(&user) {
                    profile.follower_count += 1;
                }

                if let Some(profile) = state.profiles.get_mut(&caller) {
                    profile.following_count += 1;
                }
            }

            Ok(())
        }
        .boxed()
    }

    fn get_comments(&self, video_id: &VideoId) -> BoxFuture<Result<Vec<Comment>, ClientError>> {
        let video_id = video_id.clone();

        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::GetComments)?;

            Ok(self.comments(&video_id))
        }
        .boxed()
    }

    fn add_comment(&self, video_id: &VideoId, text: String) -> BoxFuture<Result<(), ClientError>> {
        let video_id = video_id.clone();

        async move {
            tokio::task::yield_now().await;
            self.begin(Operation::AddComment)?;
            let caller = self.caller("comment")?;

            let mut state = self.state();
            state.comments_created += 1;

            let comment = Comment {
                id: format!("comment_{}", state.comments_created),
                text,
                author: caller,
                timestamp: video::now(),
                video_id: video_id.clone(),
            };

            state.comments.entry(video_id).or_default().push(comment);

            Ok(())
        }
        .boxed()
    }

    fn upload_video(&self, request: UploadRequest, video: MediaBlob) -> BoxFuture<Result<(), ClientError>> {
        self.upload(request, video).boxed()
    }
}
