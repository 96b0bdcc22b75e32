use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Textual form of the principal used for callers without a session.
pub const ANONYMOUS: &str = "2vxsx-fae";

/// An opaque identity handed out by the authentication provider.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(text: impl Into<String>) -> Self {
        Identity(text.into())
    }

    pub fn anonymous() -> Self {
        Identity(ANONYMOUS.to_owned())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Progress of the current login attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoginStatus {
    Idle,
    LoggingIn,
    Success,
    LoginError,
}

#[derive(Debug)]
struct SessionState {
    identity: Option<Identity>,
    status: LoginStatus,
}

/// The caller's session, shared by every component that needs to know
/// who is signed in.
#[derive(Clone, Debug)]
pub struct Session {
    state: Arc<RwLock<SessionState>>,
}

impl Default for Session {
    fn default() -> Self {
        Session::anonymous()
    }
}

impl Session {
    /// Creates a session nobody has signed in to yet.
    pub fn anonymous() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState {
                identity: None,
                status: LoginStatus::Idle,
            })),
        }
    }

    /// Creates a session that's already signed in.
    pub fn signed_in(identity: Identity) -> Self {
        let session = Session::anonymous();
        session.complete_login(identity);
        session
    }

    pub fn identity(&self) -> Option<Identity> {
        self.read(|state| state.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|state| state.identity.is_some())
    }

    pub fn status(&self) -> LoginStatus {
        self.read(|state| state.status)
    }

    pub fn begin_login(&self) {
        self.write(|state| state.status = LoginStatus::LoggingIn);
    }

    pub fn complete_login(&self, identity: Identity) {
        self.write(|state| {
            state.identity = Some(identity);
            state.status = LoginStatus::Success;
        });
    }

    pub fn fail_login(&self) {
        self.write(|state| state.status = LoginStatus::LoginError);
    }

    pub fn logout(&self) {
        self.write(|state| {
            state.identity = None;
            state.status = LoginStatus::Idle;
        });
    }

    fn read<T>(&self, f: impl FnOnce(&SessionState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self, f: impl FnOnce(&mut SessionState)) {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}
