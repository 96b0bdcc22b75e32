use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, o, warn, Logger};
use thiserror::Error;

use crate::blob::{MediaBlob, UploadObserver};
use crate::config::Config;
use crate::environment::Environment;
use crate::errors::{describe_upload_failure, ClientError};
use crate::file::{ObjectUrl, ObjectUrls, SelectedFile};
use crate::media::MediaProbe;
use crate::normalization::{normalize_text, truncate_chars};
use crate::queries::Queries;
use crate::routes::{Navigator, Route};
use crate::validation::{validate_video_file, Rejection, ValidationResult};
use crate::video::{UploadRequest, VideoId, VideoMeta};

/// Where the upload form is in its lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub enum UploadState {
    Idle,
    Validating,

    /// Bytes are being sent. Progress runs from 0 to 100 and never
    /// decreases.
    Uploading {
        progress: f64,
    },

    /// Every byte has been sent and the backend hasn't acknowledged the
    /// write yet.
    Processing,
    Success,
    Error {
        message: String,
    },
}

impl UploadState {
    /// The status line shown under the form, if any.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            UploadState::Idle => None,
            UploadState::Validating => Some("Validating video..."),
            UploadState::Uploading { .. } => Some("Uploading video..."),
            UploadState::Processing => Some("Processing on chain..."),
            UploadState::Success => Some("Upload complete!"),
            UploadState::Error { .. } => Some("Upload failed"),
        }
    }
}

/// Reasons the form refused an action.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SubmitError {
    #[error("An upload is already in progress")]
    Busy,

    #[error("Please select a video file")]
    NoFile,

    #[error("Please enter a title")]
    MissingTitle,

    #[error("This video has already been uploaded")]
    AlreadyCompleted,

    #[error("A newer file was selected")]
    Superseded,

    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The upload itself failed; carries the message shown to the user.
    #[error("{message}")]
    Failed { message: String },
}

struct Selection {
    file: SelectedFile,
    duration: f64,
    preview: ObjectUrl,
}

struct FormState {
    state: UploadState,
    selection: Option<Selection>,
    file_error: Option<String>,
    title: String,
    description: String,

    /// Bumped on every file selection, so a slow validation can't
    /// overwrite a newer one.
    selections: u64,
    pending: bool,
    mounted: bool,
    uploaded: Option<VideoMeta>,
}

impl FormState {
    fn new() -> Self {
        Self {
            state: UploadState::Idle,
            selection: None,
            file_error: None,
            title: String::new(),
            description: String::new(),
            selections: 0,
            pending: false,
            mounted: true,
            uploaded: None,
        }
    }

    fn release_selection(&mut self) {
        if let Some(selection) = self.selection.take() {
            selection.preview.revoke();
        }
    }
}

fn lock(state: &Mutex<FormState>) -> MutexGuard<'_, FormState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Relays transport progress into the form state.
struct FormObserver {
    state: Arc<Mutex<FormState>>,
}

impl UploadObserver for FormObserver {
    fn progress(&self, percentage: f64) {
        if let UploadState::Uploading { progress } = &mut lock(&self.state).state {
            if percentage > *progress {
                *progress = percentage;
            }
        }
    }

    fn transferred(&self) {
        let mut form = lock(&self.state);

        if let UploadState::Uploading { .. } = form.state {
            form.state = UploadState::Processing;
        }
    }
}

/// The upload page: one file, one title, one upload at a time.
#[derive(Clone)]
pub struct UploadForm {
    logger: Arc<Logger>,
    queries: Queries,
    probe: Arc<dyn MediaProbe>,
    object_urls: ObjectUrls,
    navigator: Arc<dyn Navigator>,
    config: Config,
    state: Arc<Mutex<FormState>>,
}

impl UploadForm {
    pub fn new(environment: &Environment, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            logger: Arc::new(environment.logger.new(o!("view" => "upload"))),
            queries: environment.queries.clone(),
            probe: environment.probe.clone(),
            object_urls: environment.object_urls.clone(),
            navigator,
            config: environment.config,
            state: Arc::new(Mutex::new(FormState::new())),
        }
    }

    /// Validates `file` and, if it passes, makes it the selection. A
    /// rejected file leaves any earlier selection in place.
    pub async fn select_file(&self, file: SelectedFile) -> Result<f64, SubmitError> {
        let generation = {
            let mut form = self.lock();

            if form.pending {
                return Err(SubmitError::Busy);
            }

            form.selections += 1;
            form.state = UploadState::Validating;
            form.file_error = None;
            form.uploaded = None;
            form.selections
        };

        let result = validate_video_file(
            self.logger.clone(),
            self.probe.as_ref(),
            &self.object_urls,
            &file,
            &self.config.limits,
        )
        .await;

        let mut form = self.lock();

        if form.selections != generation {
            debug!(self.logger, "Ignoring superseded selection"; "file" => &file.name);
            return Err(SubmitError::Superseded);
        }

        form.state = UploadState::Idle;

        match result {
            ValidationResult::Valid { duration } => {
                let preview = self.object_urls.create(&file);
                form.release_selection();
                form.selection = Some(Selection {
                    file,
                    duration,
                    preview,
                });

                Ok(duration)
            }
            ValidationResult::Invalid(rejection) => {
                form.file_error = Some(rejection.to_string());
                Err(rejection.into())
            }
        }
    }

    /// Clears the selection and anything said about it.
    pub fn remove_file(&self) -> Result<(), SubmitError> {
        let mut form = self.lock();

        if form.pending {
            return Err(SubmitError::Busy);
        }

        form.release_selection();
        form.selections += 1;
        form.file_error = None;
        form.state = UploadState::Idle;

        Ok(())
    }

    pub fn set_title(&self, title: &str) -> Result<(), SubmitError> {
        let limit = self.config.limits.title_chars;
        self.edit(|form| form.title = truncate_chars(title, limit))
    }

    pub fn set_description(&self, description: &str) -> Result<(), SubmitError> {
        let limit = self.config.limits.description_chars;
        self.edit(|form| form.description = truncate_chars(description, limit))
    }

    /// Uploads the selected file. Refused while another upload is
    /// pending. On success the video is registered and, unless the form
    /// has been unmounted by then, the application returns home after
    /// the configured delay.
    pub async fn submit(&self) -> Result<VideoMeta, SubmitError> {
        let (request, file) = {
            let mut form = self.lock();

            match form.state {
                _ if form.pending => return Err(SubmitError::Busy),
                UploadState::Validating => return Err(SubmitError::Busy),
                UploadState::Success => return Err(SubmitError::AlreadyCompleted),
                _ => {}
            }

            let selection = form.selection.as_ref().ok_or(SubmitError::NoFile)?;
            let title = normalize_text(&form.title);

            if title.is_empty() {
                return Err(SubmitError::MissingTitle);
            }

            let request = UploadRequest {
                id: VideoId::generate(),
                title,
                description: normalize_text(&form.description),
                duration_seconds: selection.duration.floor() as u64,
            };
            let file = selection.file.clone();

            form.pending = true;
            form.state = UploadState::Uploading { progress: 0.0 };

            (request, file)
        };

        let logger = self.logger.new(o!("video_id" => request.id.to_string()));
        debug!(logger, "Submitting upload"; "file" => &file.name, "size" => file.size);

        let observer = Arc::new(FormObserver {
            state: self.state.clone(),
        });

        let result = match file.read_bytes().await {
            Ok(bytes) => {
                self.queries
                    .upload_video(request, MediaBlob::from_bytes(bytes), observer)
                    .await
            }
            Err(e) => Err(ClientError::UnreadableFile {
                message: e.to_string(),
            }),
        };

        let mut form = self.lock();
        form.pending = false;

        match result {
            Ok(video) => {
                debug!(logger, "Upload complete");
                form.state = UploadState::Success;
                form.uploaded = Some(video.clone());
                drop(form);

                self.schedule_redirect();
                Ok(video)
            }
            Err(e) => {
                let message = describe_upload_failure(&e);
                warn!(logger, "Upload failed"; "error" => %e);
                form.state = UploadState::Error {
                    message: message.clone(),
                };

                Err(SubmitError::Failed { message })
            }
        }
    }

    /// Detaches the form from the page. Uploads still in flight run to
    /// completion but no longer navigate anywhere.
    pub fn unmount(&self) {
        let mut form = self.lock();
        form.mounted = false;
        form.release_selection();
    }

    pub fn state(&self) -> UploadState {
        self.lock().state.clone()
    }

    /// Upload progress from 0 to 100.
    pub fn progress(&self) -> f64 {
        match self.lock().state {
            UploadState::Uploading { progress } => progress,
            UploadState::Processing | UploadState::Success => 100.0,
            _ => 0.0,
        }
    }

    /// The message explaining why the last upload failed.
    pub fn error(&self) -> Option<String> {
        match &self.lock().state {
            UploadState::Error { message } => Some(message.clone()),
            _ => None,
        }
    }

    /// The message explaining why the last selected file was rejected.
    pub fn file_error(&self) -> Option<String> {
        self.lock().file_error.clone()
    }

    pub fn status_label(&self) -> Option<&'static str> {
        self.lock().state.label()
    }

    pub fn can_submit(&self) -> bool {
        let form = self.lock();

        !form.pending
            && form.selection.is_some()
            && !normalize_text(&form.title).is_empty()
            && !matches!(form.state, UploadState::Validating | UploadState::Success)
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    /// Whether the caller has to log in before uploading.
    pub fn requires_login(&self) -> bool {
        !self.queries.session().is_authenticated()
    }

    pub fn title(&self) -> String {
        self.lock().title.clone()
    }

    pub fn description(&self) -> String {
        self.lock().description.clone()
    }

    /// The selected file and its probed duration.
    pub fn selected_file(&self) -> Option<(SelectedFile, f64)> {
        self.lock()
            .selection
            .as_ref()
            .map(|selection| (selection.file.clone(), selection.duration))
    }

    /// The local URL the selected file can be previewed from.
    pub fn preview_url(&self) -> Option<String> {
        self.lock()
            .selection
            .as_ref()
            .map(|selection| selection.preview.as_str().to_owned())
    }

    /// The video registered by the last successful upload.
    pub fn uploaded(&self) -> Option<VideoMeta> {
        self.lock().uploaded.clone()
    }
}

impl UploadForm {
    fn lock(&self) -> MutexGuard<'_, FormState> {
        lock(&self.state)
    }

    fn edit(&self, f: impl FnOnce(&mut FormState)) -> Result<(), SubmitError> {
        let mut form = self.lock();

        if form.pending {
            return Err(SubmitError::Busy);
        }

        f(&mut form);
        Ok(())
    }

    fn schedule_redirect(&self) {
        let state = self.state.clone();
        let navigator = self.navigator.clone();
        let delay = self.config.success_redirect_delay;
        let logger = self.logger.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if lock(&state).mounted {
                navigator.navigate(Route::Home);
            } else {
                debug!(logger, "Form unmounted before redirect");
            }
        });
    }
}
