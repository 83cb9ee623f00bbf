//! Admin login: form validation, credential exchange and session hand-off.
//!
//! A successful exchange stores the session triple and replaces the login entry with
//! the dashboard. Any failure after the request was sent leaves no partial session
//! behind.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::api::{AdminApi, LoginCredentials};
use crate::error::{AppError, AppResult};
use crate::form::FormErrors;
use crate::identity::SessionAccessor;
use crate::navigation::Navigation;
use crate::router::DASHBOARD_PATH;

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$").expect("email pattern compiles"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    pub fn validate(&self) -> Result<LoginCredentials, FormErrors> {
        let mut errors = FormErrors::default();
        if self.email.is_empty() {
            errors.push("email", "Email is required");
        } else if !EMAIL_RE.is_match(&self.email) {
            errors.push("email", "Invalid email address");
        }
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push("password", "Password must be at least 6 characters");
        }
        errors.into_result(LoginCredentials { email: self.email.clone(), password: self.password.clone() })
    }
}

pub struct LoginFlow<A> {
    api: Arc<A>,
    session: SessionAccessor,
}

impl<A: AdminApi> LoginFlow<A> {
    pub fn new(api: Arc<A>, session: SessionAccessor) -> Self {
        Self { api, session }
    }

    /// Returns the message to show the operator on success.
    pub async fn submit(&self, form: &LoginForm) -> AppResult<String> {
        let credentials = form.validate()?;
        match self.exchange(&credentials).await {
            Ok(message) => {
                info!(email = %credentials.email, "admin signed in");
                self.session.navigator().navigate(Navigation::replace(DASHBOARD_PATH));
                Ok(message)
            }
            Err(e) => {
                warn!(email = %credentials.email, error = %e, "login failed");
                self.session.discard();
                Err(e)
            }
        }
    }

    async fn exchange(&self, credentials: &LoginCredentials) -> AppResult<String> {
        let envelope = self.api.login(credentials).await?;
        let message = envelope.message.clone().filter(|m| !m.is_empty());
        let invalid = || AppError::api("invalid_response", "Invalid server response");
        let data = envelope.into_data()?;
        let access = data.access_token.filter(|t| !t.is_empty()).ok_or_else(invalid)?;
        let user = data.user.filter(|u| !u.is_null()).ok_or_else(invalid)?;
        self.session.store_session(&access, data.refresh_token.as_deref(), &user)?;
        Ok(message.unwrap_or_else(|| "Login successful!".to_string()))
    }
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod login_tests;
