//!
//! vybly_admin configuration
//! -------------------------
//! Settings are layered: built-in defaults, then environment variables, then
//! command-line flags. Unparseable values are ignored with a warning so a typo in the
//! environment never locks an operator out.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::identity::{DEFAULT_CHECK_INTERVAL, DEFAULT_LOGIN_PATH};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api/v1";
pub const DEFAULT_SESSION_FILE: &str = ".vybly/session.json";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub check_interval: Duration,
    pub request_timeout: Duration,
    pub login_path: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            check_interval: DEFAULT_CHECK_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }
}

fn parse_millis(name: &str, raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) => {
            warn!(setting = name, "zero duration ignored");
            None
        }
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(_) => {
            warn!(setting = name, value = raw, "not a millisecond count; ignored");
            None
        }
    }
}

fn parse_millis_env(name: &str) -> Option<Duration> {
    env::var(name).ok().and_then(|v| parse_millis(name, &v))
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).map(String::as_str);
        }
        if let Some(v) = args[i].strip_prefix(flag).and_then(|rest| rest.strip_prefix('=')) {
            return Some(v);
        }
        i += 1;
    }
    None
}

impl AdminConfig {
    /// Defaults overridden by `VYBLY_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = env::var("VYBLY_API_BASE_URL") {
            if !url.trim().is_empty() { cfg.api_base_url = url.trim().to_string(); }
        }
        if let Ok(path) = env::var("VYBLY_SESSION_FILE") {
            if !path.trim().is_empty() { cfg.session_file = PathBuf::from(path.trim()); }
        }
        if let Some(d) = parse_millis_env("VYBLY_GUARD_INTERVAL_MS") { cfg.check_interval = d; }
        if let Some(d) = parse_millis_env("VYBLY_HTTP_TIMEOUT_MS") { cfg.request_timeout = d; }
        cfg
    }

    /// Command-line flags override whatever is already set.
    pub fn apply_args(mut self, args: &[String]) -> Self {
        if let Some(url) = flag_value(args, "--api-url") { self.api_base_url = url.to_string(); }
        if let Some(path) = flag_value(args, "--session-file") { self.session_file = PathBuf::from(path); }
        if let Some(d) = flag_value(args, "--interval-ms").and_then(|v| parse_millis("--interval-ms", v)) {
            self.check_interval = d;
        }
        if let Some(d) = flag_value(args, "--timeout-ms").and_then(|v| parse_millis("--timeout-ms", v)) {
            self.request_timeout = d;
        }
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        let url = self.api_base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::config("api_base_url".to_string(), format!("expected an http(s) URL, got '{url}'")));
        }
        if !self.login_path.starts_with('/') {
            return Err(AppError::config("login_path".to_string(), format!("must be absolute, got '{}'", self.login_path)));
        }
        Ok(())
    }

    /// Base URL without a trailing slash, ready for `format!("{base}/...")`.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = AdminConfig::default();
        assert_eq!(cfg.check_interval, Duration::from_secs(5));
        assert_eq!(cfg.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.login_path, "/login");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn flags_override_and_bad_values_are_ignored() {
        let cfg = AdminConfig::default().apply_args(&args(&[
            "users",
            "--api-url",
            "https://api.vybly.io/api/v1/",
            "--session-file=/tmp/s.json",
            "--interval-ms",
            "0",
            "--timeout-ms",
            "abc",
        ]));
        assert_eq!(cfg.api_base(), "https://api.vybly.io/api/v1");
        assert_eq!(cfg.session_file, PathBuf::from("/tmp/s.json"));
        assert_eq!(cfg.check_interval, DEFAULT_CHECK_INTERVAL);
        assert_eq!(cfg.request_timeout, DEFAULT_REQUEST_TIMEOUT);

        let cfg = cfg.apply_args(&args(&["--interval-ms", "250"]));
        assert_eq!(cfg.check_interval, Duration::from_millis(250));
    }

    #[test]
    fn validate_rejects_non_http_urls() {
        let cfg = AdminConfig { api_base_url: "ftp://x".into(), ..AdminConfig::default() };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.code_str(), "api_base_url");
        assert_eq!(err.http_status(), 500);
    }
}
