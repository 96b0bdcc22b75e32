use thiserror::Error;

use crate::identity::{Identity, LoginStatus, Session};
use crate::profile::{CallerProfile, UserProfile};
use crate::queries::{Queries, QueryStatus};

/// Returned in place of an action that needs a signed-in caller. The
/// view shows it as a login prompt.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("You need to be logged in to {action}.")]
pub struct LoginRequired {
    pub action: String,
}

/// Gates actions on there being a signed-in caller.
pub struct AuthGuard;

impl AuthGuard {
    /// Returns the caller, or a prompt naming `action` if nobody is
    /// signed in.
    pub fn require(session: &Session, action: &str) -> Result<Identity, LoginRequired> {
        session.identity().ok_or_else(|| LoginRequired {
            action: action.to_owned(),
        })
    }
}

/// A snapshot of who the caller is and whether they have a profile.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthState {
    pub identity: Option<Identity>,
    pub login_status: LoginStatus,
    pub profile: QueryStatus<CallerProfile>,
}

impl AuthState {
    pub async fn load(queries: &Queries) -> Self {
        let session = queries.session();

        Self {
            identity: session.identity(),
            login_status: session.status(),
            profile: queries.caller_profile().await,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_logging_in(&self) -> bool {
        self.login_status == LoginStatus::LoggingIn
    }

    /// The caller's profile, once it has been read and exists.
    pub fn user_profile(&self) -> Option<&UserProfile> {
        self.profile.ready().and_then(CallerProfile::profile)
    }

    /// Whether the caller should be asked to create a profile. Only a
    /// read that completed and found nothing counts; a failed read
    /// doesn't.
    pub fn needs_profile_setup(&self) -> bool {
        self.is_authenticated() && matches!(self.profile, QueryStatus::Ready(CallerProfile::Absent))
    }
}
