use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{BoxStream, StreamExt};
use log::{debug, o, trace, warn, Logger};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;

use crate::backend::Backend;
use crate::blob::{MediaBlob, UploadObserver};
use crate::comment::Comment;
use crate::errors::ClientError;
use crate::identity::{Identity, Session};
use crate::profile::{CallerProfile, UserProfile, UserRole};
use crate::registry::Registry;
use crate::urls::Urls;
use crate::video::{self, UploadRequest, VideoId, VideoMeta};

/// Identifies a cached read: the operation plus whatever it's about.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum QueryKey {
    CallerProfile(Identity),
    UserProfile(Identity),
    CallerRole(Identity),
    CallerIsAdmin(Identity),
    Comments(VideoId),
    Videos,
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::CallerProfile(caller) => write!(f, "currentUserProfile/{}", caller),
            QueryKey::UserProfile(user) => write!(f, "userProfile/{}", user),
            QueryKey::CallerRole(caller) => write!(f, "callerRole/{}", caller),
            QueryKey::CallerIsAdmin(caller) => write!(f, "isCallerAdmin/{}", caller),
            QueryKey::Comments(video_id) => write!(f, "comments/{}", video_id),
            QueryKey::Videos => f.write_str("videos"),
        }
    }
}

/// What a view sees of a read.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryStatus<T> {
    /// The read's preconditions aren't met, so it wasn't issued.
    Disabled,
    Loading,
    Ready(T),
    Failed(ClientError),
}

impl<T> QueryStatus<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            QueryStatus::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_ready(self) -> Option<T> {
        match self {
            QueryStatus::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, QueryStatus::Loading)
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            QueryStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryStatus<U> {
        match self {
            QueryStatus::Disabled => QueryStatus::Disabled,
            QueryStatus::Loading => QueryStatus::Loading,
            QueryStatus::Ready(value) => QueryStatus::Ready(f(value)),
            QueryStatus::Failed(e) => QueryStatus::Failed(e),
        }
    }
}

impl<T> From<Result<T, ClientError>> for QueryStatus<T> {
    fn from(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(value) => QueryStatus::Ready(value),
            Err(e) => QueryStatus::Failed(e),
        }
    }
}

#[derive(Clone, Debug)]
enum Value {
    CallerProfile(CallerProfile),
    UserProfile(Option<UserProfile>),
    Role(UserRole),
    Admin(bool),
    Comments(Vec<Comment>),
    Videos(Vec<VideoMeta>),
}

/// Results that can live in the cache.
trait Cached: Clone + Sized {
    fn into_value(self) -> Value;
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! cached {
    ($type:ty, $variant:ident) => {
        impl Cached for $type {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

cached!(CallerProfile, CallerProfile);
cached!(Option<UserProfile>, UserProfile);
cached!(UserRole, Role);
cached!(bool, Admin);
cached!(Vec<Comment>, Comments);
cached!(Vec<VideoMeta>, Videos);

type Fetch = Shared<BoxFuture<'static, Result<Value, ClientError>>>;

/// A fetch other readers of the same key can wait on.
#[derive(Clone)]
struct Pending {
    generation: u64,
    ticket: u64,
    fetch: Fetch,
}

#[derive(Default)]
struct Slot {
    value: Option<Value>,
    failure: Option<ClientError>,

    /// Bumped on every invalidation. A fetch that started under an older
    /// generation doesn't get to fill the slot.
    generation: u64,

    /// Numbers the fetches started for this slot.
    tickets: u64,

    /// Ticket of the fetch whose result is in the slot. Older fetches
    /// finishing late don't overwrite it.
    stored: u64,
    pending: Option<Pending>,
}

enum Lookup<T> {
    Hit(T),
    Started(Pending),
    Joined(Pending),
}

#[derive(Default)]
struct Cache {
    slots: Mutex<HashMap<QueryKey, Slot>>,
}

impl Cache {
    fn slots(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serves `key` from the slot unless `refresh` is set, otherwise
    /// joins the fetch in flight or starts one with `start`.
    fn begin<T: Cached>(&self, key: &QueryKey, refresh: bool, start: impl FnOnce() -> Fetch) -> Lookup<T> {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_default();

        if !refresh {
            if let Some(value) = slot.value.clone().and_then(T::from_value) {
                return Lookup::Hit(value);
            }
        }

        if let Some(pending) = &slot.pending {
            return Lookup::Joined(pending.clone());
        }

        slot.tickets += 1;
        let pending = Pending {
            generation: slot.generation,
            ticket: slot.tickets,
            fetch: start(),
        };
        slot.pending = Some(pending.clone());

        Lookup::Started(pending)
    }

    /// Stores the outcome of a fetch. A failure keeps any previous value.
    /// Returns `false` if the slot was invalidated or refreshed by a newer
    /// fetch while this one was running.
    fn finish(&self, key: &QueryKey, pending: &Pending, result: Result<Value, ClientError>) -> bool {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_default();

        if slot.generation != pending.generation || pending.ticket < slot.stored {
            return false;
        }

        if slot.pending.as_ref().map(|p| p.ticket) == Some(pending.ticket) {
            slot.pending = None;
        }

        slot.stored = pending.ticket;
        match result {
            Ok(value) => {
                slot.value = Some(value);
                slot.failure = None;
            }
            Err(e) => slot.failure = Some(e),
        }

        true
    }

    fn peek(&self, key: &QueryKey) -> Option<Value> {
        self.slots().get(key).and_then(|slot| slot.value.clone())
    }

    fn store(&self, key: &QueryKey, value: Value) {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_default();
        slot.value = Some(value);
        slot.failure = None;
    }

    fn invalidate(&self, logger: &Logger, key: &QueryKey) {
        if let Some(slot) = self.slots().get_mut(key) {
            Self::clear(slot);
            trace!(logger, "Invalidated query"; "query" => %key);
        }
    }

    fn invalidate_where(&self, logger: &Logger, predicate: impl Fn(&QueryKey) -> bool) {
        for (key, slot) in self.slots().iter_mut().filter(|(key, _)| predicate(key)) {
            Self::clear(slot);
            trace!(logger, "Invalidated query"; "query" => %key);
        }
    }

    fn clear(slot: &mut Slot) {
        slot.generation += 1;
        slot.value = None;
        slot.failure = None;
        slot.pending = None;
    }

    fn status(&self, key: &QueryKey) -> QueryStatus<()> {
        match self.slots().get(key) {
            Some(Slot { value: Some(_), .. }) => QueryStatus::Ready(()),
            Some(Slot { pending: Some(_), .. }) => QueryStatus::Loading,
            Some(Slot {
                failure: Some(e), ..
            }) => QueryStatus::Failed(e.clone()),
            _ => QueryStatus::Disabled,
        }
    }
}

/// Wraps the backend: reads are cached per [`QueryKey`], writes
/// invalidate the reads they could have changed once the backend has
/// acknowledged them. Nothing is merged into the cache locally.
#[derive(Clone)]
pub struct Queries {
    logger: Arc<Logger>,
    backend: Arc<dyn Backend>,
    session: Session,
    registry: Registry,
    urls: Arc<Urls>,
    cache: Arc<Cache>,
}

impl Queries {
    pub fn new(
        logger: Arc<Logger>,
        backend: Arc<dyn Backend>,
        session: Session,
        registry: Registry,
        urls: Arc<Urls>,
    ) -> Self {
        Self {
            logger,
            backend,
            session,
            registry,
            urls,
            cache: Arc::new(Cache::default()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether `key` currently holds a result.
    pub fn is_cached(&self, key: &QueryKey) -> bool {
        matches!(self.cache.status(key), QueryStatus::Ready(()))
    }

    /// Whether a fetch for `key` is running.
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.cache.status(key).is_loading()
    }

    /// The state of `key` without issuing a read. `Disabled` means
    /// nothing has been fetched yet.
    pub fn status(&self, key: &QueryKey) -> QueryStatus<()> {
        self.cache.status(key)
    }

    /// Reads the caller's profile. Disabled without a session. A profile
    /// that doesn't exist yet comes back as [`CallerProfile::Absent`];
    /// any other failure is reported as such.
    pub async fn caller_profile(&self) -> QueryStatus<CallerProfile> {
        let caller = match self.session.identity() {
            Some(caller) => caller,
            None => return QueryStatus::Disabled,
        };

        self.read(QueryKey::CallerProfile(caller), |backend: Arc<dyn Backend>| {
            async move {
                match backend.get_caller_user_profile().await {
                    Ok(profile) => Ok(CallerProfile::Present(profile)),
                    Err(ClientError::NotFound { .. }) => Ok(CallerProfile::Absent),
                    Err(e) => Err(e),
                }
            }
            .boxed()
        })
        .await
    }

    /// Reads someone's profile. Disabled until there is someone to read.
    pub async fn user_profile(&self, user: Option<&Identity>) -> QueryStatus<Option<UserProfile>> {
        let user = match user {
            Some(user) => user.clone(),
            None => return QueryStatus::Disabled,
        };

        let key = QueryKey::UserProfile(user.clone());
        self.read(key, move |backend: Arc<dyn Backend>| {
            async move { backend.get_user_profile(&user).await }.boxed()
        })
        .await
    }

    pub async fn caller_role(&self) -> QueryStatus<UserRole> {
        let caller = match self.session.identity() {
            Some(caller) => caller,
            None => return QueryStatus::Disabled,
        };

        self.read(QueryKey::CallerRole(caller), |backend: Arc<dyn Backend>| {
            async move { backend.get_caller_user_role().await }.boxed()
        })
        .await
    }

    pub async fn is_caller_admin(&self) -> QueryStatus<bool> {
        let caller = match self.session.identity() {
            Some(caller) => caller,
            None => return QueryStatus::Disabled,
        };

        self.read(QueryKey::CallerIsAdmin(caller), |backend: Arc<dyn Backend>| {
            async move { backend.is_caller_admin().await }.boxed()
        })
        .await
    }

    /// Reads the comments on a video. Disabled without a video.
    pub async fn comments(&self, video_id: Option<&VideoId>) -> QueryStatus<Vec<Comment>> {
        let video_id = match video_id {
            Some(video_id) => video_id.clone(),
            None => return QueryStatus::Disabled,
        };

        self.read_comments(video_id, false).await
    }

    /// Reads the comments on a video again. The cached comments stay
    /// visible until the new ones replace them, and survive a failed read.
    pub async fn refetch_comments(&self, video_id: &VideoId) -> QueryStatus<Vec<Comment>> {
        self.read_comments(video_id.clone(), true).await
    }

    async fn read_comments(&self, video_id: VideoId, refresh: bool) -> QueryStatus<Vec<Comment>> {
        let key = QueryKey::Comments(video_id.clone());
        self.query(key, refresh, move |backend: Arc<dyn Backend>| {
            async move { backend.get_comments(&video_id).await }.boxed()
        })
        .await
    }

    /// Polls the comments on a video, yielding a fresh snapshot every
    /// `period`, starting immediately. Polling stops when the stream is
    /// dropped. Must be called from within a tokio runtime.
    pub fn comments_stream(
        &self,
        video_id: VideoId,
        period: Duration,
    ) -> BoxStream<'static, QueryStatus<Vec<Comment>>> {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let queries = self.clone();

        IntervalStream::new(interval)
            .then(move |_| {
                let queries = queries.clone();
                let video_id = video_id.clone();

                async move { queries.refetch_comments(&video_id).await }
            })
            .boxed()
    }

    /// The videos uploaded in this session, most recent first.
    pub fn videos(&self) -> Vec<VideoMeta> {
        if let Some(videos) = self.cached::<Vec<VideoMeta>>(&QueryKey::Videos) {
            return videos;
        }

        let videos = self.registry.list();
        self.cache
            .store(&QueryKey::Videos, videos.clone().into_value());
        videos
    }

    pub async fn save_caller_profile(&self, profile: UserProfile) -> Result<(), ClientError> {
        let logger = self.logger.new(o!("mutation" => "saveCallerUserProfile"));
        let result = self.backend.save_caller_user_profile(profile).await;
        self.acknowledge(&logger, result)?;

        if let Some(caller) = self.session.identity() {
            self.cache
                .invalidate(&logger, &QueryKey::CallerProfile(caller.clone()));
            self.cache.invalidate(&logger, &QueryKey::UserProfile(caller));
        }

        Ok(())
    }

    pub async fn like_video(&self, video_id: &VideoId) -> Result<(), ClientError> {
        let logger = self.logger.new(o!("mutation" => "likeVideo", "video_id" => video_id.to_string()));
        let result = self.backend.like_video(video_id).await;
        self.acknowledge(&logger, result)?;

        self.cache.invalidate(&logger, &QueryKey::Videos);
        Ok(())
    }

    pub async fn follow(&self, user: &Identity) -> Result<(), ClientError> {
        let logger = self.logger.new(o!("mutation" => "follow", "identity" => user.to_string()));
        let result = self.backend.follow(user).await;
        self.acknowledge(&logger, result)?;

        self.cache
            .invalidate(&logger, &QueryKey::UserProfile(user.clone()));

        if let Some(caller) = self.session.identity() {
            self.cache
                .invalidate(&logger, &QueryKey::CallerProfile(caller.clone()));
            self.cache.invalidate(&logger, &QueryKey::UserProfile(caller));
        }

        Ok(())
    }

    pub async fn add_comment(&self, video_id: &VideoId, text: String) -> Result<(), ClientError> {
        let logger = self.logger.new(o!("mutation" => "addComment", "video_id" => video_id.to_string()));
        let result = self.backend.add_comment(video_id, text).await;
        self.acknowledge(&logger, result)?;

        self.cache
            .invalidate(&logger, &QueryKey::Comments(video_id.clone()));
        self.cache.invalidate(&logger, &QueryKey::Videos);
        Ok(())
    }

    pub async fn assign_role(&self, user: &Identity, role: UserRole) -> Result<(), ClientError> {
        let logger = self.logger.new(o!("mutation" => "assignCallerUserRole", "identity" => user.to_string()));
        let result = self.backend.assign_caller_user_role(user, role).await;
        self.acknowledge(&logger, result)?;

        self.cache.invalidate_where(&logger, |key| {
            matches!(key, QueryKey::CallerRole(_) | QueryKey::CallerIsAdmin(_))
        });
        Ok(())
    }

    /// Uploads a video, relaying transport progress to `observer`. Once
    /// the backend acknowledges the write the video is added to the
    /// registry and returned.
    pub async fn upload_video(
        &self,
        request: UploadRequest,
        media: MediaBlob,
        observer: Arc<dyn UploadObserver>,
    ) -> Result<VideoMeta, ClientError> {
        let logger = self.logger.new(o!("mutation" => "uploadVideo", "video_id" => request.id.to_string()));
        debug!(logger, "Uploading video"; "size" => media.len(), "duration" => request.duration_seconds);

        let uploader = self.session.identity().unwrap_or_else(Identity::anonymous);
        let media = media.with_upload_progress(observer);

        let result = self.backend.upload_video(request.clone(), media).await;
        self.acknowledge(&logger, result)?;

        let video_url = self.urls.video(&request.id);
        let video = VideoMeta {
            id: request.id,
            title: request.title,
            description: request.description,
            uploader,
            upload_timestamp: video::now(),
            duration_seconds: request.duration_seconds,
            like_count: 0,
            comment_count: 0,
            video_url,
        };

        self.registry.insert(video.clone());
        self.cache.invalidate(&logger, &QueryKey::Videos);
        debug!(logger, "Video registered");

        Ok(video)
    }
}

impl Queries {
    async fn read<T, F>(&self, key: QueryKey, fetch: F) -> QueryStatus<T>
    where
        T: Cached + Send + 'static,
        F: FnOnce(Arc<dyn Backend>) -> BoxFuture<'static, Result<T, ClientError>> + Send,
    {
        self.query(key, false, fetch).await
    }

    /// Concurrent readers of a key share one backend call.
    async fn query<T, F>(&self, key: QueryKey, refresh: bool, fetch: F) -> QueryStatus<T>
    where
        T: Cached + Send + 'static,
        F: FnOnce(Arc<dyn Backend>) -> BoxFuture<'static, Result<T, ClientError>> + Send,
    {
        let logger = self.logger.new(o!("query" => key.to_string()));
        let backend = self.backend.clone();
        let start = move || {
            fetch(backend)
                .map(|result| result.map(Cached::into_value))
                .boxed()
                .shared()
        };

        let pending = match self.cache.begin(&key, refresh, start) {
            Lookup::Hit(value) => {
                trace!(logger, "Cache hit");
                return QueryStatus::Ready(value);
            }
            Lookup::Joined(pending) => {
                trace!(logger, "Waiting on fetch in flight");
                pending
            }
            Lookup::Started(pending) => {
                debug!(logger, "Fetching"; "refresh" => refresh);
                pending
            }
        };

        let result = pending.fetch.clone().await;

        if let Err(e) = &result {
            warn!(logger, "Read failed"; "error" => %e);
        }

        if !self.cache.finish(&key, &pending, result.clone()) {
            debug!(logger, "Discarding result superseded while fetching");
        }

        match result {
            Ok(value) => match T::from_value(value) {
                Some(value) => QueryStatus::Ready(value),
                None => QueryStatus::Failed(ClientError::rejected(format!("Unexpected result for {}", key))),
            },
            Err(e) => QueryStatus::Failed(e),
        }
    }

    fn cached<T: Cached>(&self, key: &QueryKey) -> Option<T> {
        self.cache.peek(key).and_then(T::from_value)
    }

    fn acknowledge(&self, logger: &Logger, result: Result<(), ClientError>) -> Result<(), ClientError> {
        match result {
            Ok(()) => {
                debug!(logger, "Mutation acknowledged");
                Ok(())
            }
            Err(e) => {
                warn!(logger, "Mutation failed"; "error" => %e);
                Err(e)
            }
        }
    }
}
