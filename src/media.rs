use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use log::Logger;

use crate::errors::ProbeError;
use crate::file::ObjectUrl;

/// Discovers the duration of a selected media file.
pub trait MediaProbe: Send + Sync {
    /// Loads the media metadata behind `url` and returns its duration
    /// in seconds. Makes a single attempt.
    fn probe_duration<'a>(
        &'a self,
        logger: Arc<Logger>,
        url: &'a ObjectUrl,
    ) -> BoxFuture<'a, Result<f64, ProbeError>>;
}

pub use inner::FfprobeProbe;

/// Builds a probe that shells out to `ffprobe`, preferring an explicit
/// path, then one found on `PATH`, then `CLIENT_FFPROBE_PATH`.
pub fn make_probe(explicit: Option<PathBuf>) -> Option<FfprobeProbe> {
    use crate::config::get_ffprobe;

    explicit
        .or_else(|| get_ffprobe(std::env::var("CLIENT_FFPROBE_PATH").ok()))
        .map(|path| FfprobeProbe::new(path))
}

mod inner {
    use std::ffi::OsString;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use futures::future::{BoxFuture, FutureExt};
    use lazy_static::lazy_static;
    use log::{debug, Logger};
    use serde::Deserialize;

    use crate::errors::ProbeError;
    use crate::file::{FileSource, ObjectUrl};

    lazy_static! {
        static ref FFPROBE_ARGS: Vec<OsString> = vec![
            OsString::from("-hide_banner"),
            OsString::from("-v"),
            OsString::from("error"),
            OsString::from("-of"),
            OsString::from("json"),
            OsString::from("-show_format"),
        ];
    }

    #[derive(Debug)]
    pub struct FfprobeProbe {
        ffprobe: PathBuf,
    }

    #[derive(Deserialize)]
    struct FfprobeOutput {
        format: FfprobeFormat,
    }

    #[derive(Deserialize)]
    struct FfprobeFormat {
        duration: Option<String>,
    }

    impl FfprobeProbe {
        pub fn new(path: impl AsRef<Path>) -> Self {
            FfprobeProbe {
                ffprobe: path.as_ref().to_owned(),
            }
        }

        async fn run(&self, logger: Arc<Logger>, url: &ObjectUrl) -> Result<f64, ProbeError> {
            use std::io::Write;

            use tempfile::NamedTempFile;
            use tokio::process::Command;

            if url.is_revoked() {
                return Err(ProbeError::Revoked(url.as_str().to_owned()));
            }

            // held until ffprobe exits; the file is removed on drop
            let (input, _temporary) = match url.source() {
                FileSource::Path(path) => (path.clone(), None),
                FileSource::Bytes(bytes) => {
                    let mut output =
                        NamedTempFile::new().map_err(ProbeError::TemporaryFileError)?;
                    output
                        .write_all(bytes)
                        .map_err(ProbeError::TemporaryFileError)?;
                    let path = output.into_temp_path();

                    (path.to_path_buf(), Some(path))
                }
            };

            debug!(logger, "Running ffprobe..."; "input" => %input.display(), "url" => url.as_str());

            let output = Command::new(&self.ffprobe)
                .args(&[FFPROBE_ARGS.clone(), vec![OsString::from(&input)]].concat())
                .output()
                .await
                .map_err(ProbeError::FfprobeFailed)?;

            if !output.status.success() {
                return Err(ProbeError::FfprobeExited(output.status));
            }

            parse_duration(&output.stdout)
        }
    }

    impl super::MediaProbe for FfprobeProbe {
        fn probe_duration<'a>(
            &'a self,
            logger: Arc<Logger>,
            url: &'a ObjectUrl,
        ) -> BoxFuture<'a, Result<f64, ProbeError>> {
            self.run(logger, url).boxed()
        }
    }

    /// Extracts the container duration from `ffprobe -show_format` JSON.
    /// A missing or unparseable duration is reported as NaN so callers
    /// can tell "no duration" apart from "unreadable file".
    pub(super) fn parse_duration(stdout: &[u8]) -> Result<f64, ProbeError> {
        let parsed: FfprobeOutput =
            serde_json::from_slice(stdout).map_err(ProbeError::MalformedFfprobeOutput)?;

        Ok(parsed
            .format
            .duration
            .and_then(|duration| duration.trim().parse().ok())
            .unwrap_or(f64::NAN))
    }
}
