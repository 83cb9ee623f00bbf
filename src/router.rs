//! Route table and the admin shell that wires the gate and guard around protected views.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::AppResult;
use crate::identity::{Clock, GateDecision, GuardHandle, RouteGate, SessionAccessor, SessionGuard};
use crate::navigation::Navigation;

pub const DASHBOARD_PATH: &str = "/dashboard";
pub const USERS_PATH: &str = "/dashboard/users";
pub const CIRCLES_PATH: &str = "/dashboard/circle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Overview,
    Users,
    Circles,
    NotFound,
}

/// What the router does with a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(Route),
    Redirect(&'static str),
}

impl Route {
    pub fn resolve(path: &str) -> Resolution {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Resolution::Redirect(DASHBOARD_PATH),
            "/login" => Resolution::Render(Route::Login),
            DASHBOARD_PATH => Resolution::Render(Route::Overview),
            USERS_PATH => Resolution::Render(Route::Users),
            CIRCLES_PATH => Resolution::Render(Route::Circles),
            _ => Resolution::Render(Route::NotFound),
        }
    }

    pub fn path(&self) -> Option<&'static str> {
        match self {
            Route::Login => Some("/login"),
            Route::Overview => Some(DASHBOARD_PATH),
            Route::Users => Some(USERS_PATH),
            Route::Circles => Some(CIRCLES_PATH),
            Route::NotFound => None,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Overview | Route::Users | Route::Circles)
    }

    /// Header title of the dashboard layout.
    pub fn title(&self) -> &'static str {
        match self {
            Route::Overview => "Dashboard Overview",
            Route::Users => "All Users",
            Route::Circles => "Manage Circle",
            _ => "Dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub href: &'static str,
    pub label: &'static str,
}

pub const NAV_ITEMS: [NavItem; 3] = [
    NavItem { href: DASHBOARD_PATH, label: "Dashboard" },
    NavItem { href: USERS_PATH, label: "All Users" },
    NavItem { href: CIRCLES_PATH, label: "Circle" },
];

/// Owns the protected layout: at most one guard is mounted while a protected route
/// is open, and it is torn down as soon as a public route is shown.
pub struct AdminShell {
    session: SessionAccessor,
    gate: RouteGate,
    guard: Arc<SessionGuard>,
    mounted: Mutex<Option<GuardHandle>>,
}

impl AdminShell {
    pub fn new(session: SessionAccessor, clock: Arc<dyn Clock>, check_interval: Duration) -> Self {
        let gate = RouteGate::with_clock(session.clone(), clock.clone());
        let guard = Arc::new(SessionGuard::with_clock(session.clone(), clock).with_interval(check_interval));
        Self { session, gate, guard, mounted: Mutex::new(None) }
    }

    pub fn guard(&self) -> &Arc<SessionGuard> {
        &self.guard
    }

    pub fn session(&self) -> &SessionAccessor {
        &self.session
    }

    /// Navigate to `path` and return the view that ends up rendered.
    pub fn open(&self, path: &str) -> AppResult<Route> {
        self.session.navigator().navigate(Navigation::push(path));
        self.render(path)
    }

    fn render(&self, path: &str) -> AppResult<Route> {
        let route = match Route::resolve(path) {
            Resolution::Redirect(to) => {
                self.session.navigator().navigate(Navigation::replace(to));
                return self.render(to);
            }
            Resolution::Render(route) => route,
        };
        if !route.is_protected() {
            self.close();
            return Ok(route);
        }
        if let GateDecision::Deny(_) = self.gate.enter(path) {
            self.close();
            return Ok(Route::Login);
        }
        let mut slot = self.mounted.lock();
        if slot.as_ref().is_some_and(GuardHandle::is_mounted) {
            return Ok(route);
        }
        let handle = self.guard.mount()?;
        if !handle.is_mounted() {
            *slot = None;
            return Ok(Route::Login);
        }
        debug!(path, title = route.title(), "protected view opened");
        *slot = Some(handle);
        Ok(route)
    }

    /// True while a protected view is open with a live guard behind it.
    pub fn is_guarded(&self) -> bool {
        self.mounted.lock().as_ref().is_some_and(GuardHandle::is_mounted)
    }

    pub fn close(&self) {
        if let Some(handle) = self.mounted.lock().take() {
            handle.unmount();
        }
    }

    /// Operator-initiated logout from the layout.
    pub fn logout(&self) {
        self.close();
        self.session.clear_session();
    }
}

impl Drop for AdminShell {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod router_tests;
