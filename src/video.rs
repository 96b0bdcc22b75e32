use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::identity::Identity;

/// Nanoseconds since the Unix epoch.
pub type Timestamp = i128;

const ID_SUFFIX_LEN: usize = 7;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Returns the current time as a [`Timestamp`].
pub fn now() -> Timestamp {
    OffsetDateTime::now_utc().unix_timestamp_nanos()
}

/// A client-generated video identifier.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        VideoId(id.into())
    }

    /// Generates an identifier of the form `video_<millis>_<suffix>`.
    pub fn generate() -> Self {
        let millis = now() / 1_000_000;
        let mut random = Uuid::new_v4().as_u128();

        let suffix = (0..ID_SUFFIX_LEN)
            .map(|_| {
                let digit = BASE36[(random % 36) as usize] as char;
                random /= 36;
                digit
            })
            .collect::<String>();

        VideoId(format!("video_{}_{}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        VideoId::new(id)
    }
}

/// Metadata for a video uploaded during this session.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMeta {
    /// The ID of the video. Unique within the registry.
    pub id: VideoId,

    pub title: String,
    pub description: String,

    /// Who uploaded it.
    pub uploader: Identity,

    /// When the upload was acknowledged.
    pub upload_timestamp: Timestamp,

    /// Whole seconds, rounded down.
    pub duration_seconds: u64,
    pub like_count: u64,
    pub comment_count: u64,

    /// Where the video can be played from.
    pub video_url: Url,
}

impl VideoMeta {
    /// Whether `needle` (already lowercased) occurs in the title or
    /// description, ignoring case.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

/// The serialisable part of an upload. The media itself travels
/// separately, together with its progress observer.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub id: VideoId,
    pub title: String,
    pub description: String,
    pub duration_seconds: u64,
}
