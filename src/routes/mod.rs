//! Route gating.
//!
//! Decides, from the session and storage-link state, whether a view may render or
//! where the user should be sent instead.

use crate::drive::DriveView;
use crate::session::SessionSnapshot;

/// Views of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SignUp,
    /// `/`, which only ever redirects
    Home,
    Drive,
    Chat,
    Settings,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "" => Some(Route::Home),
            "/signin" => Some(Route::SignIn),
            "/signup" => Some(Route::SignUp),
            "/drive" => Some(Route::Drive),
            "/chat" => Some(Route::Chat),
            "/settings" => Some(Route::Settings),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::SignIn => "/signin",
            Route::SignUp => "/signup",
            Route::Home => "/",
            Route::Drive => "/drive",
            Route::Chat => "/chat",
            Route::Settings => "/settings",
        }
    }

    /// Reachable without signing in.
    pub fn is_public(self) -> bool {
        matches!(self, Route::SignIn | Route::SignUp)
    }
}

/// What the view layer should do for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Session still resolving; show a spinner
    Loading,
    Redirect(Route),
    /// Signed in, but the view needs a linked storage account
    ConnectStorageFirst,
    Render,
}

pub fn resolve(route: Route, session: &SessionSnapshot, drive: &DriveView) -> Gate {
    if session.loading {
        return Gate::Loading;
    }

    match (route.is_public(), session.is_signed_in()) {
        (true, true) => Gate::Redirect(Route::Drive),
        (true, false) => Gate::Render,
        (false, false) => Gate::Redirect(Route::SignIn),
        (false, true) => match route {
            Route::Home => Gate::Redirect(Route::Drive),
            Route::Chat if !drive.is_connected() => Gate::ConnectStorageFirst,
            _ => Gate::Render,
        },
    }
}
