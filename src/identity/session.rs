use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::profile::StoredProfile;
use crate::error::{AppError, AppResult};
use crate::navigation::{Navigation, Navigator};
use crate::storage::{ChangeFeed, SessionStore};

pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Storage keys of the session triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub access: String,
    pub refresh: String,
    pub profile: String,
}

impl Default for SessionKeys {
    fn default() -> Self {
        Self { access: "accessToken".into(), refresh: "refreshToken".into(), profile: "user".into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    Access,
    Refresh,
    Profile,
}

impl fmt::Display for SessionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionField::Access => "access credential",
            SessionField::Refresh => "refresh credential",
            SessionField::Profile => "user profile",
        })
    }
}

/// One consistent read of the session triple, profile already parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub profile: Option<StoredProfile>,
}

impl SessionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none() && self.profile.is_none()
    }
}

/// Reads and writes the persisted session through an injected store, and owns the
/// forced-logout path (clear, then full reload to the login boundary).
#[derive(Clone)]
pub struct SessionAccessor {
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    keys: Arc<SessionKeys>,
    login_path: Arc<str>,
}

impl SessionAccessor {
    pub fn new(store: Arc<dyn SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self { store, navigator, keys: Arc::new(SessionKeys::default()), login_path: Arc::from(DEFAULT_LOGIN_PATH) }
    }

    pub fn with_keys(mut self, keys: SessionKeys) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    pub fn with_login_path(mut self, path: impl AsRef<str>) -> Self {
        self.login_path = Arc::from(path.as_ref());
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn subscribe(&self) -> ChangeFeed {
        self.store.subscribe()
    }

    // An empty string is as good as no credential.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.store.get_item(key).filter(|v| !v.is_empty())
    }

    pub fn get_access(&self) -> Option<String> {
        self.non_empty(&self.keys.access)
    }

    pub fn get_refresh(&self) -> Option<String> {
        self.non_empty(&self.keys.refresh)
    }

    /// Raw stored profile. Unparseable or `null` payloads read as absent.
    pub fn get_profile(&self) -> Option<Value> {
        let raw = self.non_empty(&self.keys.profile)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Null) => None,
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "stored profile is not JSON; treating as absent");
                None
            }
        }
    }

    pub fn profile(&self) -> Option<StoredProfile> {
        self.get_profile().map(|v| StoredProfile::parse(&v))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot { access: self.get_access(), refresh: self.get_refresh(), profile: self.profile() }
    }

    /// Persist a freshly issued session. Used by the login flow.
    pub fn store_session(&self, access: &str, refresh: Option<&str>, profile: &Value) -> AppResult<()> {
        let profile_json = serde_json::to_string(profile)
            .map_err(|e| AppError::internal("profile_encode".to_string(), e.to_string()))?;
        self.store.set_item(&self.keys.access, access)?;
        match refresh {
            Some(r) => self.store.set_item(&self.keys.refresh, r)?,
            None => self.store.remove_item(&self.keys.refresh)?,
        }
        self.store.set_item(&self.keys.profile, &profile_json)?;
        Ok(())
    }

    /// Remove the session triple without navigating anywhere.
    pub fn discard(&self) {
        let keys = [self.keys.access.as_str(), self.keys.refresh.as_str(), self.keys.profile.as_str()];
        if let Err(e) = self.store.remove_items(&keys) {
            warn!(error = %e, "failed to remove session fields");
        }
    }

    /// Forced or user-initiated logout: remove all three fields, then reload into the
    /// login boundary. Safe to call repeatedly; the navigation always happens.
    pub fn clear_session(&self) {
        self.discard();
        info!(target: "vybly_admin::session", login = %self.login_path, "session cleared");
        self.navigator.navigate(Navigation::reload(self.login_path.to_string()));
    }
}
