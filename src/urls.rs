use url::Url;

use crate::config::get_variable;
use crate::video::VideoId;

/// Convenience wrapper for media URL generation.
#[derive(Clone, Debug)]
pub struct Urls {
    /// Top-level URL, including trailing slash.
    base: Url,

    /// Path under which uploaded videos are served.
    pub(crate) media_path: String,

    /// Prefix for all media URLs.
    media_prefix: String,
}

impl Urls {
    /// Create a new instance. `media_prefix` should *not* include a trailing slash.
    pub fn new(base: impl AsRef<str>, media_prefix: impl Into<String>) -> Self {
        let base =
            Url::parse(base.as_ref()).unwrap_or_else(|_| panic!("parse {} as URL", base.as_ref()));
        let media_path = media_prefix.into();
        let media_prefix = format!("{}/", media_path);

        Urls {
            base,
            media_path,
            media_prefix,
        }
    }

    pub fn from_env() -> Self {
        let media_path =
            std::env::var("CLIENT_MEDIA_PATH").unwrap_or_else(|_| String::from("videos"));

        Urls::new(get_variable("CLIENT_MEDIA_BASE_URL"), media_path)
    }

    pub fn media(&self) -> Url {
        self.base.join(&self.media_prefix).expect("get media URL")
    }

    /// Returns the directly playable URL of an uploaded video.
    pub fn video(&self, id: &VideoId) -> Url {
        self.media()
            .join(id.as_str())
            .unwrap_or_else(|_| panic!("get URL for video {}", id))
    }
}
