use serde::{Deserialize, Serialize};

/// A user's public profile as stored by the backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
    pub follower_count: u64,
    pub following_count: u64,
}

impl UserProfile {
    /// Builds the profile a new user starts with.
    pub fn new(username: String, bio: String) -> Self {
        UserProfile {
            username,
            bio,
            ..Default::default()
        }
    }
}

/// The role the backend grants a caller.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

/// Outcome of reading the caller's own profile.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CallerProfile {
    /// The caller hasn't created a profile yet.
    Absent,
    Present(UserProfile),
}

impl CallerProfile {
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            CallerProfile::Present(profile) => Some(profile),
            CallerProfile::Absent => None,
        }
    }
}
