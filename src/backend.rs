use futures::future::BoxFuture;

use crate::blob::MediaBlob;
use crate::comment::Comment;
use crate::errors::ClientError;
use crate::identity::Identity;
use crate::profile::{UserProfile, UserRole};
use crate::video::{UploadRequest, VideoId};

pub mod mock;

/// The remote operations the backend exposes. Implementations act on
/// behalf of whichever identity their transport is bound to; calls that
/// need an identity fail with [`ClientError::Unauthorized`] without one.
pub trait Backend: Send + Sync {
    /// Fails with [`ClientError::NotFound`] if the caller has no profile.
    fn get_caller_user_profile(&self) -> BoxFuture<Result<UserProfile, ClientError>>;

    fn save_caller_user_profile(&self, profile: UserProfile) -> BoxFuture<Result<(), ClientError>>;

    fn get_user_profile(&self, user: &Identity) -> BoxFuture<Result<Option<UserProfile>, ClientError>>;

    fn is_caller_admin(&self) -> BoxFuture<Result<bool, ClientError>>;

    fn get_caller_user_role(&self) -> BoxFuture<Result<UserRole, ClientError>>;

    fn assign_caller_user_role(&self, user: &Identity, role: UserRole) -> BoxFuture<Result<(), ClientError>>;

    fn like_video(&self, video_id: &VideoId) -> BoxFuture<Result<(), ClientError>>;

    fn follow(&self, user: &Identity) -> BoxFuture<Result<(), ClientError>>;

    fn get_comments(&self, video_id: &VideoId) -> BoxFuture<Result<Vec<Comment>, ClientError>>;

    fn add_comment(&self, video_id: &VideoId, text: String) -> BoxFuture<Result<(), ClientError>>;

    /// Sends `video` and records the upload. Progress goes to the
    /// observer attached to the blob; `transferred` fires once the bytes
    /// are sent, before the write is acknowledged.
    fn upload_video(&self, request: UploadRequest, video: MediaBlob) -> BoxFuture<Result<(), ClientError>>;
}
