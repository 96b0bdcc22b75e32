use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};

use client::auth::AuthState;
use client::backend::mock::{MockBackend, Operation};
use client::config::Config;
use client::environment::Environment;
use client::errors::{ProbeError, LOGIN_REQUIRED_MESSAGE};
use client::file::{ObjectUrl, SelectedFile};
use client::identity::{Identity, LoginStatus, Session};
use client::media::MediaProbe;
use client::queries::QueryStatus;
use client::routes::{History, Route};
use client::upload::{SubmitError, UploadForm, UploadState};
use client::urls::Urls;
use client::validation::Rejection;
use client::views::actions::ActionButtons;
use client::views::comments::CommentsPanel;
use client::views::feed::FeedView;
use client::views::profile::{ProfileSetup, ProfileView};

/// Reports the same duration for every file.
struct ConstantProbe(f64);

impl MediaProbe for ConstantProbe {
    fn probe_duration<'a>(
        &'a self,
        _logger: Arc<log::Logger>,
        _url: &'a ObjectUrl,
    ) -> BoxFuture<'a, Result<f64, ProbeError>> {
        let duration = self.0;
        async move { Ok(duration) }.boxed()
    }
}

fn make_environment(duration: f64) -> (Session, Arc<MockBackend>, Environment) {
    let session = Session::anonymous();
    let backend = Arc::new(MockBackend::new(session.clone()).with_chunk_size(1024));

    let environment = Environment::new(
        Arc::new(log::discard()),
        session.clone(),
        backend.clone(),
        Arc::new(ConstantProbe(duration)),
        Arc::new(Urls::new("https://media.example.com/", "videos")),
        Config::default(),
    );

    (session, backend, environment)
}

fn clip() -> SelectedFile {
    SelectedFile::from_bytes("beach.mp4", "video/mp4", vec![3u8; 4096])
}

#[tokio::test(start_paused = true)]
async fn new_user_uploads_and_sees_their_video() {
    let (session, backend, environment) = make_environment(95.4);
    let alice = Identity::new("rdmx6-jaaaa-aaaaa-aaadq-cai");

    session.begin_login();
    assert!(AuthState::load(&environment.queries).await.is_logging_in());
    session.complete_login(alice.clone());
    assert_eq!(session.status(), LoginStatus::Success);

    let auth = AuthState::load(&environment.queries).await;
    assert!(auth.needs_profile_setup());

    let mut setup = ProfileSetup::new(&environment);
    setup.set_username("alice");
    setup.submit().await.expect("create profile");
    assert!(!AuthState::load(&environment.queries).await.needs_profile_setup());

    let history = History::new();
    let form = UploadForm::new(&environment, Arc::new(history.clone()));
    assert_eq!(form.select_file(clip()).await, Ok(95.4));
    form.set_title("Beach day").unwrap();

    let video = form.submit().await.expect("upload");
    assert_eq!(video.duration_seconds, 95);
    assert_eq!(video.uploader, alice);
    assert_eq!(form.state(), UploadState::Success);

    tokio::time::sleep(Duration::from_millis(1800)).await;
    tokio::task::yield_now().await;
    assert_eq!(history.current(), Some(Route::Home));

    let feed = FeedView::new(&environment);
    assert_eq!(feed.current().map(|v| &v.id), Some(&video.id));

    let buttons = ActionButtons::new(&environment, video.clone(), false);
    buttons.like().await.expect("like");
    assert_eq!(buttons.like_count(), 1);
    assert_eq!(backend.likes(&video.id), 1);

    let panel = CommentsPanel::new(&environment, video.id.clone(), video.comment_count);
    panel.open();
    panel.input().set_text("What a view");
    panel.submit_comment().await.expect("comment");

    let comments = panel.comments().into_ready().expect("comments");
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author, alice);
    panel.close();

    let profile = ProfileView::load(&environment, Some(alice.clone())).await;
    assert!(profile.is_own_profile());
    assert_eq!(profile.display_profile().map(|p| p.username.as_str()), Some("alice"));
    assert_eq!(profile.videos(), vec![video]);
}

#[tokio::test]
async fn overlong_videos_never_reach_the_backend() {
    let (session, backend, environment) = make_environment(725.0);
    session.complete_login(Identity::new("rdmx6-jaaaa-aaaaa-aaadq-cai"));

    let form = UploadForm::new(&environment, Arc::new(History::new()));
    let result = form.select_file(clip()).await;

    match result {
        Err(SubmitError::Rejected(rejection @ Rejection::TooLong { .. })) => {
            assert_eq!(rejection.minutes_and_seconds(), Some((12, 5)));
            assert_eq!(
                form.file_error().as_deref(),
                Some("Video is 12m 5s long. Maximum allowed duration is 10 minutes (600 seconds).")
            );
        }
        other => panic!("expected a duration rejection, got {:?}", other),
    }

    assert_eq!(form.submit().await, Err(SubmitError::NoFile));
    assert_eq!(backend.calls(Operation::UploadVideo), 0);
    assert_eq!(environment.object_urls.live(), 0);
}

#[tokio::test]
async fn logged_out_uploads_fail_with_a_login_prompt() {
    let (_session, _backend, environment) = make_environment(30.0);

    let form = UploadForm::new(&environment, Arc::new(History::new()));
    form.select_file(clip()).await.unwrap();
    form.set_title("Anonymous").unwrap();

    assert!(form.submit().await.is_err());
    assert_eq!(form.error().as_deref(), Some(LOGIN_REQUIRED_MESSAGE));
    assert!(environment.registry.is_empty());
    assert_eq!(environment.queries.caller_profile().await, QueryStatus::Disabled);
}
