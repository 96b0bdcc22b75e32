//! View models: the state and input handlers behind each page, ready
//! for a UI toolkit to bind to.

use thiserror::Error;

use crate::auth::LoginRequired;
use crate::errors::ClientError;

pub mod actions;
pub mod comments;
pub mod explore;
pub mod feed;
pub mod format;
pub mod profile;

/// Reasons a view refused or failed an action.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ViewError {
    #[error(transparent)]
    LoginRequired(#[from] LoginRequired),

    #[error(transparent)]
    Remote(#[from] ClientError),

    #[error("Already in progress")]
    Busy,

    #[error("{message}")]
    Invalid { message: String },
}

impl ViewError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ViewError::Invalid {
            message: message.into(),
        }
    }
}
