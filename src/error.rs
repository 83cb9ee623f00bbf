//! Unified application error model and mapping helpers.
//! This module provides the common error enum used by the REST client, the login flow,
//! the dashboard state and the command-line frontend, along with helpers that map
//! remote HTTP statuses into it.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    Auth { code: String, message: String },
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Api { code: String, message: String },
    Transport { code: String, message: String },
    Io { code: String, message: String },
    Config { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Api { code, .. }
            | AppError::Transport { code, .. }
            | AppError::Io { code, .. }
            | AppError::Config { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Api { message, .. }
            | AppError::Transport { message, .. }
            | AppError::Io { message, .. }
            | AppError::Config { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn auth<S: Into<String>>(code: S, msg: S) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn api<S: Into<String>>(code: S, msg: S) -> Self { AppError::Api { code: code.into(), message: msg.into() } }
    pub fn transport<S: Into<String>>(code: S, msg: S) -> Self { AppError::Transport { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn config<S: Into<String>>(code: S, msg: S) -> Self { AppError::Config { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Api { .. } => 422,
            AppError::Transport { .. } => 502,
            AppError::Io { .. } => 503,
            AppError::Config { .. } | AppError::Internal { .. } => 500,
        }
    }

    /// Map a non-success status returned by the admin API into an error variant.
    /// The message is whatever the server put in its envelope, or the status text.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 422 => AppError::UserInput { code: format!("http_{status}"), message },
            401 => AppError::Auth { code: "unauthorized".into(), message },
            403 => AppError::Forbidden { code: "forbidden".into(), message },
            404 => AppError::NotFound { code: "not_found".into(), message },
            409 => AppError::Conflict { code: "conflict".into(), message },
            _ => AppError::Api { code: format!("http_{status}"), message },
        }
    }

    /// True when the server rejected the credential; callers usually force re-authentication.
    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth { .. })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Internal unless downcasted elsewhere
        if let Some(app) = err.downcast_ref::<AppError>() {
            return app.clone();
        }
        AppError::Internal { code: "internal_error".into(), message: format!("{err:#}") }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::Transport { code: "timeout".into(), message: err.to_string() };
        }
        if let Some(status) = err.status() {
            return AppError::from_status(status.as_u16(), err.to_string());
        }
        AppError::Transport { code: "transport_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
