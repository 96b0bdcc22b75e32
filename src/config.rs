use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

const MIB: u64 = 1024 * 1024;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the parsed value of the named environment variable, if it's set.
pub fn get_optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(None),
    }
}

/// Like [`get_optional`], but also rejects values that fail `accept`.
pub fn get_checked<T: FromStr>(
    name: &'static str,
    accept: impl FnOnce(&T) -> bool,
) -> Result<Option<T>, ConfigError> {
    match get_optional(name)? {
        Some(value) if !accept(&value) => Err(ConfigError::Invalid {
            name,
            value: env::var(name).unwrap_or_default(),
        }),
        value => Ok(value),
    }
}

#[cfg(feature = "which")]
pub fn get_ffprobe(env: Option<String>) -> Option<PathBuf> {
    use which::which;

    which("ffprobe")
        .ok()
        .or_else(move || env.map(PathBuf::from))
}

#[cfg(not(feature = "which"))]
pub fn get_ffprobe(env: Option<String>) -> Option<PathBuf> {
    env.map(PathBuf::from)
}

/// Size, duration and length limits enforced before anything reaches
/// the backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    /// Largest accepted video file, in bytes.
    pub max_upload_bytes: u64,

    /// Longest accepted video, in seconds.
    pub max_duration_seconds: f64,

    pub title_chars: usize,
    pub description_chars: usize,
    pub comment_chars: usize,
    pub username_chars: usize,
    pub bio_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 500 * MIB,
            max_duration_seconds: 600.0,
            title_chars: 100,
            description_chars: 500,
            comment_chars: 300,
            username_chars: 30,
            bio_chars: 150,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    pub limits: Limits,

    /// How long the upload form waits after a success before leaving.
    pub success_redirect_delay: Duration,

    /// How often an open comments panel re-reads its comments.
    pub comments_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            success_redirect_delay: Duration::from_millis(1800),
            comments_poll_interval: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn new(limits: Limits, success_redirect_delay: Duration, comments_poll_interval: Duration) -> Self {
        Self {
            limits,
            success_redirect_delay,
            comments_poll_interval,
        }
    }

    /// Reads the optional `CLIENT_*` overrides on top of the defaults.
    /// Sizes, durations and intervals must be positive.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(bytes) = get_checked("CLIENT_MAX_UPLOAD_BYTES", |bytes: &u64| *bytes > 0)? {
            config.limits.max_upload_bytes = bytes;
        }

        if let Some(seconds) = get_checked("CLIENT_MAX_DURATION_SECONDS", |seconds: &f64| {
            seconds.is_finite() && *seconds > 0.0
        })? {
            config.limits.max_duration_seconds = seconds;
        }

        if let Some(ms) = get_checked("CLIENT_SUCCESS_REDIRECT_DELAY_MS", |ms: &u64| *ms > 0)? {
            config.success_redirect_delay = Duration::from_millis(ms);
        }

        if let Some(ms) = get_checked("CLIENT_COMMENTS_POLL_INTERVAL_MS", |ms: &u64| *ms > 0)? {
            config.comments_poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // tests in this module share the process environment
    static ENVIRONMENT: Mutex<()> = Mutex::new(());

    fn rejected(name: &'static str, value: &str) -> bool {
        let _guard = ENVIRONMENT.lock().unwrap_or_else(|e| e.into_inner());

        env::set_var(name, value);
        let result = Config::from_env();
        env::remove_var(name);

        match result {
            Err(ConfigError::Invalid { name: invalid, value: shown }) => invalid == name && shown == value,
            _ => false,
        }
    }

    #[test]
    fn defaults_match_upload_rules() {
        let config = Config::default();

        assert_eq!(config.limits.max_upload_bytes, 524_288_000);
        assert_eq!(config.limits.max_duration_seconds, 600.0);
        assert_eq!(config.success_redirect_delay, Duration::from_millis(1800));
        assert_eq!(config.comments_poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn environment_overrides_defaults() {
        let _guard = ENVIRONMENT.lock().unwrap_or_else(|e| e.into_inner());

        env::set_var("CLIENT_COMMENTS_POLL_INTERVAL_MS", "2500");
        env::set_var("CLIENT_MAX_DURATION_SECONDS", "nope");

        let result = Config::from_env();

        env::remove_var("CLIENT_MAX_DURATION_SECONDS");
        let config = Config::from_env().expect("read config");
        env::remove_var("CLIENT_COMMENTS_POLL_INTERVAL_MS");

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "CLIENT_MAX_DURATION_SECONDS",
                ..
            })
        ));
        assert_eq!(config.comments_poll_interval, Duration::from_millis(2500));
    }

    #[test]
    fn duration_limit_must_be_a_positive_number() {
        assert!(rejected("CLIENT_MAX_DURATION_SECONDS", "NaN"));
        assert!(rejected("CLIENT_MAX_DURATION_SECONDS", "inf"));
        assert!(rejected("CLIENT_MAX_DURATION_SECONDS", "0"));
        assert!(rejected("CLIENT_MAX_DURATION_SECONDS", "-600"));
    }

    #[test]
    fn upload_size_must_be_positive() {
        assert!(rejected("CLIENT_MAX_UPLOAD_BYTES", "0"));
        assert!(rejected("CLIENT_MAX_UPLOAD_BYTES", "-1"));
    }

    #[test]
    fn timings_must_be_positive() {
        assert!(rejected("CLIENT_COMMENTS_POLL_INTERVAL_MS", "0"));
        assert!(rejected("CLIENT_SUCCESS_REDIRECT_DELAY_MS", "0"));
    }
}
