use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::identity::Identity;

/// The pages of the application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Route {
    Home,
    Explore,
    Upload,

    /// Someone's profile, or the caller's own without an identity.
    Profile(Option<Identity>),
}

impl Route {
    /// Parses a path such as `/profile/<identity>`. Unknown paths yield
    /// `None`.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(|c| c == '?' || c == '#').next().unwrap_or_default();
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());

        let route = match segments.next() {
            None => Route::Home,
            Some("explore") => Route::Explore,
            Some("upload") => Route::Upload,
            Some("profile") => Route::Profile(segments.next().map(Identity::new)),
            Some(_) => return None,
        };

        match segments.next() {
            Some(_) => None,
            None => Some(route),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => String::from("/"),
            Route::Explore => String::from("/explore"),
            Route::Upload => String::from("/upload"),
            Route::Profile(None) => String::from("/profile"),
            Route::Profile(Some(identity)) => format!("/profile/{}", identity),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Moves the application to another page.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// A navigator that only records where it was sent.
#[derive(Clone, Debug, Default)]
pub struct History {
    visited: Arc<Mutex<Vec<Route>>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Route> {
        self.visited().pop()
    }

    pub fn visited(&self) -> Vec<Route> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for History {
    fn navigate(&self, route: Route) {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route);
    }
}
