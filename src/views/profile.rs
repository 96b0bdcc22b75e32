use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, o, Logger};

use crate::auth::AuthGuard;
use crate::config::Limits;
use crate::environment::Environment;
use crate::identity::Identity;
use crate::normalization::{normalize_text, truncate_chars};
use crate::profile::{CallerProfile, UserProfile};
use crate::queries::{Queries, QueryStatus};
use crate::registry::Registry;
use crate::video::VideoMeta;
use crate::views::ViewError;

/// A profile page, either someone else's or the caller's own.
pub struct ProfileView {
    logger: Arc<Logger>,
    queries: Queries,
    registry: Registry,
    limits: Limits,
    caller: Option<Identity>,
    target: Option<Identity>,
    profile: QueryStatus<Option<UserProfile>>,
    caller_profile: Option<UserProfile>,
    following: AtomicBool,
    follow_pending: AtomicBool,
}

/// Changes to the caller's own profile.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileEdit {
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
}

impl ProfileView {
    /// Loads the profile of `target`, or the caller's own without one.
    pub async fn load(environment: &Environment, target: Option<Identity>) -> Self {
        let caller = environment.session.identity();
        let target = target.or_else(|| caller.clone());

        let logger = environment.logger.new(o!(
            "view" => "profile",
            "identity" => target.as_ref().map(Identity::to_string)
        ));

        let mut view = Self {
            logger: Arc::new(logger),
            queries: environment.queries.clone(),
            registry: environment.registry.clone(),
            limits: environment.config.limits,
            caller,
            target,
            profile: QueryStatus::Loading,
            caller_profile: None,
            following: AtomicBool::new(false),
            follow_pending: AtomicBool::new(false),
        };

        view.reload().await;
        view
    }

    /// Re-reads the profile, and the caller's own when it's their page.
    pub async fn reload(&mut self) {
        self.profile = self.queries.user_profile(self.target.as_ref()).await;

        self.caller_profile = if self.is_own_profile() {
            self.queries
                .caller_profile()
                .await
                .into_ready()
                .and_then(|caller| match caller {
                    CallerProfile::Present(profile) => Some(profile),
                    CallerProfile::Absent => None,
                })
        } else {
            None
        };
    }

    pub fn target(&self) -> Option<&Identity> {
        self.target.as_ref()
    }

    pub fn is_own_profile(&self) -> bool {
        self.target.is_some() && self.target == self.caller
    }

    pub fn status(&self) -> &QueryStatus<Option<UserProfile>> {
        &self.profile
    }

    /// The profile to render. On their own page callers see their own
    /// read, which tracks their edits.
    pub fn display_profile(&self) -> Option<&UserProfile> {
        let profile = self.profile.ready().and_then(Option::as_ref)?;

        match &self.caller_profile {
            Some(own) if self.is_own_profile() => Some(own),
            _ => Some(profile),
        }
    }

    /// The target's uploads from this session, most recent first.
    pub fn videos(&self) -> Vec<VideoMeta> {
        match &self.target {
            Some(target) => self.registry.filter_by_uploader(target),
            None => Vec::new(),
        }
    }

    pub fn empty_message(&self) -> &'static str {
        if self.is_own_profile() {
            "You haven't uploaded any videos yet"
        } else {
            "No videos yet"
        }
    }

    pub fn following(&self) -> bool {
        self.following.load(Ordering::SeqCst)
    }

    pub fn is_follow_pending(&self) -> bool {
        self.follow_pending.load(Ordering::SeqCst)
    }

    /// Follows the profile's owner, showing it at once and rolling back
    /// if the backend refuses. Does nothing if already following.
    pub async fn follow(&self) -> Result<(), ViewError> {
        AuthGuard::require(self.queries.session(), "follow this creator")?;

        let target = match &self.target {
            Some(target) => target,
            None => return Ok(()),
        };

        if self.following() {
            return Ok(());
        }

        if self.follow_pending.swap(true, Ordering::SeqCst) {
            return Err(ViewError::Busy);
        }

        self.following.store(true, Ordering::SeqCst);
        let result = self.queries.follow(target).await;
        self.follow_pending.store(false, Ordering::SeqCst);

        if let Err(e) = result {
            debug!(self.logger, "Rolling back follow");
            self.following.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        Ok(())
    }

    /// Saves changes to the caller's own profile, keeping their counts.
    pub async fn edit_profile(&mut self, edit: ProfileEdit) -> Result<(), ViewError> {
        AuthGuard::require(self.queries.session(), "edit your profile")?;

        let current = match (&self.caller_profile, self.is_own_profile()) {
            (Some(current), true) => current.clone(),
            _ => return Err(ViewError::invalid("Only your own profile can be edited")),
        };

        let username = normalize_text(truncate_chars(&edit.username, self.limits.username_chars));

        if username.is_empty() {
            return Err(ViewError::invalid("Please choose a username"));
        }

        let profile = UserProfile {
            username,
            bio: normalize_text(truncate_chars(&edit.bio, self.limits.bio_chars)),
            avatar_url: normalize_text(&edit.avatar_url),
            follower_count: current.follower_count,
            following_count: current.following_count,
        };

        self.queries.save_caller_profile(profile).await?;
        self.reload().await;

        Ok(())
    }
}

/// The dialog a newly signed-in caller fills in to create a profile.
pub struct ProfileSetup {
    queries: Queries,
    limits: Limits,
    username: String,
    bio: String,
}

impl ProfileSetup {
    pub fn new(environment: &Environment) -> Self {
        Self {
            queries: environment.queries.clone(),
            limits: environment.config.limits,
            username: String::new(),
            bio: String::new(),
        }
    }

    pub fn set_username(&mut self, username: &str) {
        self.username = truncate_chars(username, self.limits.username_chars);
    }

    pub fn set_bio(&mut self, bio: &str) {
        self.bio = truncate_chars(bio, self.limits.bio_chars);
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn bio(&self) -> &str {
        &self.bio
    }

    pub fn can_submit(&self) -> bool {
        !self.username.trim().is_empty()
    }

    /// Creates the caller's profile with zero follower counts.
    pub async fn submit(&mut self) -> Result<UserProfile, ViewError> {
        AuthGuard::require(self.queries.session(), "create a profile")?;

        let username = normalize_text(&self.username);

        if username.is_empty() {
            return Err(ViewError::invalid("Please choose a username"));
        }

        let profile = UserProfile::new(username, normalize_text(&self.bio));
        self.queries.save_caller_profile(profile.clone()).await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthState;
    use crate::backend::mock::{MockBackend, Operation};
    use crate::errors::ClientError;
    use crate::identity::Session;
    use crate::registry::tests::video;
    use crate::views::tests::environment;

    fn alice() -> Identity {
        Identity::new("alice-principal")
    }

    fn bob() -> Identity {
        Identity::new("bob-principal")
    }

    fn with_profiles() -> (Arc<MockBackend>, Environment) {
        let (backend, environment) = environment(Session::signed_in(alice()));
        backend.insert_profile(alice(), UserProfile::new(String::from("alice"), String::from("hi")));
        backend.insert_profile(bob(), UserProfile::new(String::from("bob"), String::new()));

        (backend, environment)
    }

    #[tokio::test]
    async fn own_profile_is_the_default() {
        let (_backend, environment) = with_profiles();
        environment.registry.insert(video("mine", "alice-principal", 1));
        environment.registry.insert(video("theirs", "bob-principal", 2));

        let view = ProfileView::load(&environment, None).await;

        assert!(view.is_own_profile());
        assert_eq!(view.display_profile().map(|p| p.username.as_str()), Some("alice"));
        assert_eq!(view.videos().len(), 1);
        assert_eq!(view.empty_message(), "You haven't uploaded any videos yet");
    }

    #[tokio::test]
    async fn other_profiles_show_their_uploads() {
        let (_backend, environment) = with_profiles();
        environment.registry.insert(video("theirs", "bob-principal", 2));

        let view = ProfileView::load(&environment, Some(bob())).await;

        assert!(!view.is_own_profile());
        assert_eq!(view.display_profile().map(|p| p.username.as_str()), Some("bob"));
        assert_eq!(view.videos()[0].id.as_str(), "theirs");
        assert_eq!(view.empty_message(), "No videos yet");
    }

    #[tokio::test]
    async fn anonymous_visitors_without_a_target_see_nothing() {
        let (_backend, environment) = environment(Session::anonymous());

        let view = ProfileView::load(&environment, None).await;

        assert_eq!(view.status(), &QueryStatus::Disabled);
        assert!(view.display_profile().is_none());
        assert!(view.videos().is_empty());
    }

    #[tokio::test]
    async fn following_rolls_back_on_failure() {
        let (backend, environment) = with_profiles();
        let view = ProfileView::load(&environment, Some(bob())).await;
        backend.fail(Operation::Follow, ClientError::Unavailable);

        assert!(view.follow().await.is_err());
        assert!(!view.following());

        backend.clear_failure(Operation::Follow);
        view.follow().await.unwrap();
        assert!(view.following());

        let view = ProfileView::load(&environment, Some(bob())).await;
        assert_eq!(view.display_profile().map(|p| p.follower_count), Some(1));
    }

    #[tokio::test]
    async fn following_twice_calls_the_backend_once() {
        let (backend, environment) = with_profiles();
        let view = ProfileView::load(&environment, Some(bob())).await;

        view.follow().await.unwrap();
        view.follow().await.unwrap();

        assert!(view.following());
        assert_eq!(backend.calls(Operation::Follow), 1);
    }

    #[tokio::test]
    async fn edits_keep_the_counts() {
        let (backend, environment) = with_profiles();
        backend.insert_profile(
            alice(),
            UserProfile {
                follower_count: 7,
                following_count: 2,
                ..UserProfile::new(String::from("alice"), String::new())
            },
        );
        let mut view = ProfileView::load(&environment, None).await;

        view.edit_profile(ProfileEdit {
            username: String::from("  alice_new "),
            bio: "b".repeat(200),
            avatar_url: String::new(),
        })
        .await
        .unwrap();

        let profile = view.display_profile().unwrap();
        assert_eq!(profile.username, "alice_new");
        assert_eq!(profile.bio.chars().count(), 150);
        assert_eq!((profile.follower_count, profile.following_count), (7, 2));
    }

    #[tokio::test]
    async fn others_profiles_cannot_be_edited() {
        let (_backend, environment) = with_profiles();
        let mut view = ProfileView::load(&environment, Some(bob())).await;

        let result = view
            .edit_profile(ProfileEdit {
                username: String::from("mallory"),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(ViewError::Invalid { .. })));
    }

    #[tokio::test]
    async fn setup_creates_a_fresh_profile() {
        let (backend, environment) = environment(Session::signed_in(alice()));

        assert!(AuthState::load(&environment.queries).await.needs_profile_setup());

        let mut setup = ProfileSetup::new(&environment);
        setup.set_username(&"a".repeat(40));
        setup.set_bio("  Filming sunsets ");

        let profile = setup.submit().await.unwrap();

        assert_eq!(profile.username.chars().count(), 30);
        assert_eq!(profile.bio, "Filming sunsets");
        assert_eq!((profile.follower_count, profile.following_count), (0, 0));
        assert_eq!(backend.calls(Operation::SaveCallerUserProfile), 1);
        assert!(!AuthState::load(&environment.queries).await.needs_profile_setup());
    }

    #[tokio::test]
    async fn setup_needs_a_username() {
        let (backend, environment) = environment(Session::signed_in(alice()));
        let mut setup = ProfileSetup::new(&environment);
        setup.set_username("   ");

        assert!(!setup.can_submit());
        assert!(matches!(setup.submit().await, Err(ViewError::Invalid { .. })));
        assert_eq!(backend.calls(Operation::SaveCallerUserProfile), 0);
    }
}
