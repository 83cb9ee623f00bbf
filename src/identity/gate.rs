use std::sync::Arc;

use tracing::info;

use super::clock::{Clock, SystemClock};
use super::profile::is_admin_role;
use super::session::SessionAccessor;
use super::token::is_live_with;
use crate::navigation::Navigation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingAccess,
    TokenNotLive,
    MissingProfile,
    NotAdmin,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::MissingAccess => "missing_access",
            DenyReason::TokenNotLive => "token_not_live",
            DenyReason::MissingProfile => "missing_profile",
            DenyReason::NotAdmin => "not_admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(DenyReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// One-shot authorization check made when a protected route is entered.
///
/// Unlike the guard it only looks at what is needed to *render* an admin view (a live
/// access token and an admin role) and never clears storage.
#[derive(Clone)]
pub struct RouteGate {
    session: SessionAccessor,
    clock: Arc<dyn Clock>,
}

impl RouteGate {
    pub fn new(session: SessionAccessor) -> Self {
        Self::with_clock(session, Arc::new(SystemClock))
    }

    pub fn with_clock(session: SessionAccessor, clock: Arc<dyn Clock>) -> Self {
        Self { session, clock }
    }

    pub fn evaluate(&self) -> GateDecision {
        let Some(access) = self.session.get_access() else { return GateDecision::Deny(DenyReason::MissingAccess); };
        if !is_live_with(&access, self.clock.as_ref()) {
            return GateDecision::Deny(DenyReason::TokenNotLive);
        }
        let profile = self.session.profile();
        if profile.is_none() {
            return GateDecision::Deny(DenyReason::MissingProfile);
        }
        if !is_admin_role(profile.as_ref()) {
            return GateDecision::Deny(DenyReason::NotAdmin);
        }
        GateDecision::Allow
    }

    /// Evaluate for `path`; on denial replace the current history entry with the login
    /// boundary so back-navigation cannot return into the protected view.
    pub fn enter(&self, path: &str) -> GateDecision {
        let decision = self.evaluate();
        if let GateDecision::Deny(reason) = decision {
            info!(path, reason = reason.as_str(), "route gate denied entry");
            self.session.navigator().navigate(Navigation::replace(self.session.login_path()));
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ManualClock;
    use crate::navigation::{History, NavigationMode, Navigator};
    use crate::storage::{MemoryStorage, SessionStore};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde_json::json;

    fn token(exp: i64) -> String {
        let body = URL_SAFE_NO_PAD.encode(json!({"exp": exp}).to_string());
        format!("eyJhbGciOiJIUzI1NiJ9.{body}.sig")
    }

    fn gate() -> (RouteGate, MemoryStorage, Arc<History>) {
        let tab = MemoryStorage::new();
        let history = Arc::new(History::starting_at("/"));
        let session = SessionAccessor::new(Arc::new(tab.clone()), history.clone());
        (RouteGate::with_clock(session, Arc::new(ManualClock::at_secs(1_000))), tab, history)
    }

    fn profile(role: &str) -> String {
        json!({"id": "u1", "email": "a@b.com", "name": "Ann", "role": role}).to_string()
    }

    #[test]
    fn checks_in_order() {
        let (g, tab, _) = gate();
        assert_eq!(g.evaluate(), GateDecision::Deny(DenyReason::MissingAccess));
        tab.set_item("accessToken", &token(999)).unwrap();
        assert_eq!(g.evaluate(), GateDecision::Deny(DenyReason::TokenNotLive));
        tab.set_item("accessToken", &token(1_001)).unwrap();
        assert_eq!(g.evaluate(), GateDecision::Deny(DenyReason::MissingProfile));
        tab.set_item("user", &profile("USER")).unwrap();
        assert_eq!(g.evaluate(), GateDecision::Deny(DenyReason::NotAdmin));
        tab.set_item("user", &profile("ADMIN")).unwrap();
        assert_eq!(g.evaluate(), GateDecision::Allow);
        tab.set_item("user", &profile("SUPER_ADMIN")).unwrap();
        assert!(g.evaluate().is_allowed());
    }

    #[test]
    fn refresh_token_is_not_required() {
        let (g, tab, _) = gate();
        tab.set_item("accessToken", &token(2_000)).unwrap();
        tab.set_item("user", &profile("ADMIN")).unwrap();
        assert!(tab.get_item("refreshToken").is_none());
        assert!(g.evaluate().is_allowed());
    }

    #[test]
    fn denial_replaces_history_and_keeps_storage() {
        let (g, tab, history) = gate();
        tab.set_item("accessToken", &token(2_000)).unwrap();
        tab.set_item("user", &profile("USER")).unwrap();
        history.navigate(Navigation::push("/dashboard/users"));
        assert_eq!(g.enter("/dashboard/users"), GateDecision::Deny(DenyReason::NotAdmin));
        assert_eq!(history.entries(), vec!["/", "/login"]);
        assert_eq!(history.count_to("/login", NavigationMode::Replace), 1);
        assert_eq!(tab.len(), 2);
    }

    #[test]
    fn allow_does_not_navigate() {
        let (g, tab, history) = gate();
        tab.set_item("accessToken", &token(2_000)).unwrap();
        tab.set_item("user", &profile("ADMIN")).unwrap();
        for _ in 0..3 {
            assert_eq!(g.enter("/dashboard"), GateDecision::Allow);
        }
        assert!(history.navigations().is_empty());
    }
}
