use std::sync::Arc;

use log::{debug, o, Logger};
use thiserror::Error;

use crate::config::Limits;
use crate::file::{ObjectUrls, SelectedFile};
use crate::media::MediaProbe;

const MIB: u64 = 1024 * 1024;

/// The outcome of checking a selected file before upload.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationResult {
    /// The file may be uploaded. `duration` is in seconds, finite and
    /// positive.
    Valid { duration: f64 },
    Invalid(Rejection),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    pub fn duration(&self) -> Option<f64> {
        match self {
            ValidationResult::Valid { duration } => Some(*duration),
            ValidationResult::Invalid(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ValidationResult::Invalid(rejection) => Some(rejection),
            ValidationResult::Valid { .. } => None,
        }
    }
}

/// Why a selected file can't be uploaded.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Rejection {
    #[error("Please select a valid video file.")]
    NotAVideo,

    #[error("File size must be under {}MB.", .limit / MIB)]
    TooLarge { size: u64, limit: u64 },

    #[error("Could not read video file. Please try a different file.")]
    Unreadable,

    #[error("Could not determine video duration.")]
    UndeterminableDuration,

    #[error(
        "Video is {}m {}s long. Maximum allowed duration is {} minutes ({} seconds).",
        whole_minutes(.duration),
        remaining_seconds(.duration),
        whole_minutes(.limit),
        .limit
    )]
    TooLong { duration: f64, limit: f64 },
}

impl Rejection {
    /// The measured length of an overlong video as whole minutes and
    /// remaining whole seconds.
    pub fn minutes_and_seconds(&self) -> Option<(u64, u64)> {
        match self {
            Rejection::TooLong { duration, .. } => {
                Some((whole_minutes(duration), remaining_seconds(duration)))
            }
            _ => None,
        }
    }
}

fn whole_minutes(seconds: &f64) -> u64 {
    (seconds / 60.0).floor() as u64
}

fn remaining_seconds(seconds: &f64) -> u64 {
    (seconds % 60.0).floor() as u64
}

/// Checks a selected file's type, size and duration, in that order,
/// stopping at the first failure. The object URL created for probing is
/// revoked whatever the outcome.
pub async fn validate_video_file(
    logger: Arc<Logger>,
    probe: &dyn MediaProbe,
    object_urls: &ObjectUrls,
    file: &SelectedFile,
    limits: &Limits,
) -> ValidationResult {
    let logger = Arc::new(logger.new(o!("file" => file.name.clone())));

    if !file.is_video() {
        debug!(logger, "Rejecting non-video file"; "media_type" => &file.media_type);
        return ValidationResult::Invalid(Rejection::NotAVideo);
    }

    if file.size > limits.max_upload_bytes {
        debug!(logger, "Rejecting oversized file"; "size" => file.size);
        return ValidationResult::Invalid(Rejection::TooLarge {
            size: file.size,
            limit: limits.max_upload_bytes,
        });
    }

    let url = object_urls.create(file);
    let probed = probe.probe_duration(logger.clone(), &url).await;
    url.revoke();

    let duration = match probed {
        Ok(duration) => duration,
        Err(e) => {
            debug!(logger, "Could not probe file"; "error" => %e);
            return ValidationResult::Invalid(Rejection::Unreadable);
        }
    };

    if !duration.is_finite() || duration <= 0.0 {
        debug!(logger, "Probed duration is unusable"; "duration" => duration);
        return ValidationResult::Invalid(Rejection::UndeterminableDuration);
    }

    if duration > limits.max_duration_seconds {
        debug!(logger, "Rejecting overlong file"; "duration" => duration);
        return ValidationResult::Invalid(Rejection::TooLong {
            duration,
            limit: limits.max_duration_seconds,
        });
    }

    debug!(logger, "File accepted"; "duration" => duration);
    ValidationResult::Valid { duration }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::executor::block_on;
    use futures::future::{BoxFuture, FutureExt};
    use proptest::prelude::*;

    use super::*;
    use crate::errors::ProbeError;
    use crate::file::ObjectUrl;

    /// A probe that reports a fixed duration, or fails to decode when
    /// given `None`.
    pub(crate) struct FixedProbe {
        duration: Option<f64>,
        pub(crate) calls: AtomicUsize,
    }

    impl FixedProbe {
        pub(crate) fn new(duration: Option<f64>) -> Self {
            Self {
                duration,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl MediaProbe for FixedProbe {
        fn probe_duration<'a>(
            &'a self,
            _logger: Arc<Logger>,
            url: &'a ObjectUrl,
        ) -> BoxFuture<'a, Result<f64, ProbeError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let live = !url.is_revoked();
            let duration = self.duration;

            async move {
                assert!(live, "probed a revoked URL");
                duration.ok_or(ProbeError::Undecodable)
            }
            .boxed()
        }
    }

    fn validate(file: &SelectedFile, probe: &FixedProbe, urls: &ObjectUrls) -> ValidationResult {
        block_on(validate_video_file(
            Arc::new(log::discard()),
            probe,
            urls,
            file,
            &Limits::default(),
        ))
    }

    fn file_of(media_type: &str, size: u64) -> SelectedFile {
        let mut file = SelectedFile::from_bytes("clip", media_type, vec![0u8; 8]);
        file.size = size;
        file
    }

    #[test]
    fn unreadable_files_are_rejected_and_released() {
        let urls = ObjectUrls::new();
        let result = validate(&file_of("video/mp4", 8), &FixedProbe::new(None), &urls);

        assert_eq!(result, ValidationResult::Invalid(Rejection::Unreadable));
        assert_eq!(urls.live(), 0);
    }

    #[test]
    fn unusable_durations_are_rejected() {
        let urls = ObjectUrls::new();

        for duration in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = validate(&file_of("video/mp4", 8), &FixedProbe::new(Some(duration)), &urls);

            assert_eq!(result, ValidationResult::Invalid(Rejection::UndeterminableDuration));
        }

        assert_eq!(urls.live(), 0);
    }

    #[test]
    fn oversized_files_are_rejected_before_probing() {
        let urls = ObjectUrls::new();
        let probe = FixedProbe::new(Some(10.0));
        let result = validate(&file_of("video/mp4", 500 * MIB + 1), &probe, &urls);

        assert_eq!(result.rejection().unwrap().to_string(), "File size must be under 500MB.");
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn overlong_message_names_the_limit() {
        let rejection = Rejection::TooLong {
            duration: 754.9,
            limit: 600.0,
        };

        assert_eq!(
            rejection.to_string(),
            "Video is 12m 34s long. Maximum allowed duration is 10 minutes (600 seconds)."
        );
    }

    proptest! {
        #[test]
        fn non_video_types_are_always_rejected(
            media_type in "(image|audio|text|application)/[a-z0-9.+-]{1,12}",
            size in any::<u64>(),
            duration in proptest::option::of(-10.0f64..10_000.0),
        ) {
            let urls = ObjectUrls::new();
            let probe = FixedProbe::new(duration);
            let result = validate(&file_of(&media_type, size), &probe, &urls);

            prop_assert_eq!(result, ValidationResult::Invalid(Rejection::NotAVideo));
            prop_assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        }

        #[test]
        fn acceptable_videos_keep_their_duration(
            size in 0..=500 * MIB,
            duration in 0.001f64..=600.0,
        ) {
            let urls = ObjectUrls::new();
            let result = validate(&file_of("video/webm", size), &FixedProbe::new(Some(duration)), &urls);

            prop_assert_eq!(result, ValidationResult::Valid { duration });
            prop_assert_eq!(urls.live(), 0);
        }

        #[test]
        fn overlong_videos_report_minutes_and_seconds(duration in 600.001f64..100_000.0) {
            let urls = ObjectUrls::new();
            let result = validate(&file_of("video/mp4", 1024), &FixedProbe::new(Some(duration)), &urls);
            let rejection = result.rejection().cloned();

            let is_too_long = matches!(rejection, Some(Rejection::TooLong { .. }));
            prop_assert!(is_too_long);
            prop_assert_eq!(
                rejection.unwrap().minutes_and_seconds(),
                Some(((duration / 60.0).floor() as u64, (duration % 60.0).floor() as u64))
            );
        }
    }
}
