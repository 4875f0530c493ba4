use std::{
    fmt,
    sync::{Mutex, PoisonError},
};

use tracing::info;

use crate::storage::{KeyValueStore, JWT_KEY};

/// Named views of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    About,
    Login,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Home => "home",
            Route::About => "about",
            Route::Login => "login",
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Route::Home)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives requests to move the user to another view
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Resolve where a navigation to `target` actually lands. Views that require
/// authentication send the user to the login view while no token is stored.
pub fn guard<K: KeyValueStore + ?Sized>(target: Route, store: &K) -> Route {
    if target.requires_auth() && store.get(JWT_KEY).is_none() {
        info!(route = %target, "no session token, redirecting to login");
        Route::Login
    } else {
        target
    }
}

/// Remembers the latest navigation request until a driver loop picks it up
#[derive(Default)]
pub struct PendingRedirect {
    route: Mutex<Option<Route>>,
}

impl PendingRedirect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the pending route, leaving nothing pending
    pub fn take(&self) -> Option<Route> {
        self.route.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn peek(&self) -> Option<Route> {
        *self.route.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for PendingRedirect {
    fn navigate(&self, route: Route) {
        *self.route.lock().unwrap_or_else(PoisonError::into_inner) = Some(route);
    }
}
