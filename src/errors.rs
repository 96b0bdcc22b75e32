use thiserror::Error;

/// Shown when an upload fails because the caller has no session or role.
pub const LOGIN_REQUIRED_MESSAGE: &str =
    "You must be logged in to upload videos. Please log in and try again.";

/// Shown when the backend refuses an upload for exceeding its duration limit.
pub const DURATION_LIMIT_MESSAGE: &str = "Video duration exceeds the 10-minute limit.";

/// Shown when the backend cannot be reached.
pub const CONNECTIVITY_MESSAGE: &str = "Connection error. Please refresh the page and try again.";

/// Enumerates errors returned by the remote interface and the query
/// layer wrapped around it.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ClientError {
    /// Represents a transport failure or a backend that isn't ready.
    #[error("Service not available")]
    Unavailable,

    /// Represents a call refused for lack of a session or role.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// Represents a lookup for a record that doesn't exist.
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Represents any other failure reported by the backend.
    #[error("{message}")]
    Rejected { message: String },

    /// Represents a local file that couldn't be read before uploading.
    #[error("Could not read the selected file: {message}")]
    UnreadableFile { message: String },
}

impl ClientError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ClientError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ClientError::NotFound { what: what.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ClientError::Rejected {
            message: message.into(),
        }
    }
}

/// Enumerates errors returned while probing a media file.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Could not write temporary file")]
    TemporaryFileError(#[source] std::io::Error),

    #[error("Could not run ffprobe")]
    FfprobeFailed(#[source] std::io::Error),

    #[error("ffprobe exited with {0}")]
    FfprobeExited(std::process::ExitStatus),

    #[error("Malformed ffprobe output")]
    MalformedFfprobeOutput(#[source] serde_json::Error),

    #[error("Object URL {0} has been revoked")]
    Revoked(String),

    #[error("Could not decode media")]
    Undecodable,
}

/// Enumerates errors returned while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not parse {name}={value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("Could not find ffprobe; set CLIENT_FFPROBE_PATH")]
    MissingFfprobe,
}

/// Maps a failed upload to the message shown on the upload form.
pub fn describe_upload_failure(error: &ClientError) -> String {
    use ClientError::*;

    match error {
        Unauthorized { .. } => LOGIN_REQUIRED_MESSAGE.to_owned(),
        Unavailable => CONNECTIVITY_MESSAGE.to_owned(),
        Rejected { message } if is_authorization_message(message) => {
            LOGIN_REQUIRED_MESSAGE.to_owned()
        }
        Rejected { message } if message.contains("duration exceeds") => {
            DURATION_LIMIT_MESSAGE.to_owned()
        }
        other => other.to_string(),
    }
}

// the backend reports role failures as plain trap messages
fn is_authorization_message(message: &str) -> bool {
    message.contains("Unauthorized") || message.contains("Only users")
}
