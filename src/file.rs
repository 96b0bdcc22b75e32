use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use mime::Mime;
use uuid::Uuid;

/// Where the contents of a selected file can be read from.
#[derive(Clone, Debug)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Bytes),
}

/// A file the user picked for upload.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    /// The file name shown to the user.
    pub name: String,

    /// The declared media type, as reported by the file picker.
    pub media_type: String,

    /// The size in bytes.
    pub size: u64,

    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();

        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            source: FileSource::Bytes(bytes),
        }
    }

    /// Describes a file on disk, declaring its type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            name,
            media_type: media_type_for(path).to_owned(),
            size: metadata.len(),
            source: FileSource::Path(path.to_owned()),
        })
    }

    pub fn mime(&self) -> Option<Mime> {
        self.media_type.parse().ok()
    }

    /// Whether the declared type is any `video/*` type.
    pub fn is_video(&self) -> bool {
        self.mime()
            .map_or(false, |mime| mime.type_() == mime::VIDEO)
    }

    pub async fn read_bytes(&self) -> io::Result<Bytes> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
            FileSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_lowercase());

    match extension.as_deref() {
        Some("mp4") => "video/mp4",
        Some("m4v") => "video/x-m4v",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("ogv") => "video/ogg",
        _ => "application/octet-stream",
    }
}

/// Tracks the local `blob:` URLs bound to selected files.
#[derive(Clone, Debug, Default)]
pub struct ObjectUrls {
    live: Arc<Mutex<HashSet<String>>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new URL to `file`. The URL stays live until the returned
    /// handle is revoked or dropped.
    pub fn create(&self, file: &SelectedFile) -> ObjectUrl {
        let url = format!("blob:{}", Uuid::new_v4());
        self.lock().insert(url.clone());

        ObjectUrl {
            url,
            source: file.source.clone(),
            urls: self.clone(),
            revoked: false,
        }
    }

    /// Number of URLs that haven't been revoked.
    pub fn live(&self) -> usize {
        self.lock().len()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.lock().contains(url)
    }

    fn revoke(&self, url: &str) {
        self.lock().remove(url);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live object URL. Revoked exactly once, explicitly or on drop.
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    source: FileSource,
    urls: ObjectUrls,
    revoked: bool,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn revoke(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.revoked {
            self.revoked = true;
            self.urls.revoke(&self.url);
        }
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(media_type: &str) -> SelectedFile {
        SelectedFile::from_bytes("clip", media_type, vec![1u8, 2, 3])
    }

    #[test]
    fn only_video_types_count_as_video() {
        assert!(clip("video/mp4").is_video());
        assert!(clip("video/quicktime").is_video());
        assert!(!clip("image/png").is_video());
        assert!(!clip("").is_video());
        assert!(!clip("videos").is_video());
    }

    #[test]
    fn object_urls_are_released_once() {
        let urls = ObjectUrls::new();
        let file = clip("video/mp4");

        let first = urls.create(&file);
        let second = urls.create(&file);
        let first_url = first.as_str().to_owned();
        assert_eq!(urls.live(), 2);

        first.revoke();
        assert!(!urls.is_live(&first_url));
        assert_eq!(urls.live(), 1);

        drop(second);
        assert_eq!(urls.live(), 0);
    }

    #[test]
    fn extensions_declare_media_types() {
        assert_eq!(media_type_for(Path::new("a/b/clip.MP4")), "video/mp4");
        assert_eq!(media_type_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(media_type_for(Path::new("notes.txt")), "application/octet-stream");
    }

    #[tokio::test]
    async fn files_on_disk_are_described_and_read() {
        use std::io::Write;

        let mut temp = tempfile::Builder::new()
            .suffix(".webm")
            .tempfile()
            .expect("create temporary file");
        temp.write_all(b"webm bytes").expect("write temporary file");

        let file = SelectedFile::from_path(temp.path()).await.expect("describe file");

        assert_eq!(file.media_type, "video/webm");
        assert_eq!(file.size, 10);
        assert_eq!(&file.read_bytes().await.expect("read file")[..], b"webm bytes");
    }
}
