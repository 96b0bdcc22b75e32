use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use url::Url;

/// Receives progress from the transport while a blob is uploaded.
pub trait UploadObserver: Send + Sync {
    /// Called with the share of bytes sent so far, from 0 to 100.
    fn progress(&self, percentage: f64);

    /// Called once every byte has been sent, before the backend has
    /// acknowledged the write.
    fn transferred(&self) {}
}

#[derive(Clone)]
enum Content {
    Bytes(Bytes),
    Url(Url),
}

/// Media handed to the backend, either as raw bytes or as a reference
/// to already stored content.
#[derive(Clone)]
pub struct MediaBlob {
    content: Content,
    observer: Option<Arc<dyn UploadObserver>>,
}

impl MediaBlob {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            content: Content::Bytes(bytes.into()),
            observer: None,
        }
    }

    pub fn from_url(url: Url) -> Self {
        Self {
            content: Content::Url(url),
            observer: None,
        }
    }

    /// Attaches the observer the transport reports progress to.
    pub fn with_upload_progress(mut self, observer: Arc<dyn UploadObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the raw bytes, if this blob holds them.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.content {
            Content::Bytes(bytes) => Some(bytes),
            Content::Url(_) => None,
        }
    }

    /// Returns a URL the content can be played from directly, if known.
    pub fn direct_url(&self) -> Option<&Url> {
        match &self.content {
            Content::Url(url) => Some(url),
            Content::Bytes(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes().map_or(0, Bytes::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn report_progress(&self, percentage: f64) {
        if let Some(observer) = &self.observer {
            observer.progress(percentage.max(0.0).min(100.0));
        }
    }

    pub fn report_transferred(&self) {
        if let Some(observer) = &self.observer {
            observer.transferred();
        }
    }
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("MediaBlob");

        match &self.content {
            Content::Bytes(bytes) => debug.field("len", &bytes.len()),
            Content::Url(url) => debug.field("url", &url.as_str()),
        };

        debug
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
