use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::video::{Timestamp, VideoId};

/// A single comment on a video.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author: Identity,

    /// Nanoseconds since the Unix epoch.
    pub timestamp: Timestamp,
    pub video_id: VideoId,
}
