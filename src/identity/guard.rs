//! Background session integrity enforcement.
//!
//! A `SessionGuard` re-validates the persisted session while a protected view is
//! mounted: once at mount, then on a fixed interval and whenever another context
//! touches the store. Any failure forces a logout. Mounting yields a `GuardHandle`;
//! dropping or unmounting it stops every trigger before returning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::profile::{ShapeError, StoredProfile};
use super::session::{SessionAccessor, SessionField};
use super::token::{decode_expiry, DecodeError};
use crate::error::{AppError, AppResult};
use crate::storage::ChangeFeed;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardFailure {
    #[error("{0} is missing")]
    MissingField(SessionField),
    #[error("stored profile rejected: {0}")]
    Shape(ShapeError),
    #[error("access token unreadable: {0}")]
    Token(DecodeError),
    #[error("access token expired at {expires_at} (now {now})")]
    Expired { expires_at: f64, now: f64 },
}

impl GuardFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            GuardFailure::MissingField(_) => "missing_field",
            GuardFailure::Shape(_) => "invalid_profile",
            GuardFailure::Token(_) => "malformed_token",
            GuardFailure::Expired { .. } => "expired_token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardTrigger {
    Mount,
    Interval,
    StorageChange,
    Direct,
}

pub struct SessionGuard {
    session: SessionAccessor,
    clock: Arc<dyn Clock>,
    interval: Duration,
    checks: AtomicU64,
    forced_logouts: AtomicU64,
}

impl SessionGuard {
    pub fn new(session: SessionAccessor) -> Self {
        Self::with_clock(session, Arc::new(SystemClock))
    }

    pub fn with_clock(session: SessionAccessor, clock: Arc<dyn Clock>) -> Self {
        Self {
            session,
            clock,
            interval: DEFAULT_CHECK_INTERVAL,
            checks: AtomicU64::new(0),
            forced_logouts: AtomicU64::new(0),
        }
    }

    /// Zero is not a valid period; it is replaced by the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = if interval.is_zero() { DEFAULT_CHECK_INTERVAL } else { interval };
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn session(&self) -> &SessionAccessor {
        &self.session
    }

    pub fn checks_run(&self) -> u64 {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn forced_logouts(&self) -> u64 {
        self.forced_logouts.load(Ordering::SeqCst)
    }

    /// Pure verdict on the current session; first failing step wins.
    pub fn check(&self) -> Result<(), GuardFailure> {
        let snap = self.session.snapshot();
        let Some(access) = snap.access else { return Err(GuardFailure::MissingField(SessionField::Access)); };
        if snap.refresh.is_none() {
            return Err(GuardFailure::MissingField(SessionField::Refresh));
        }
        match snap.profile {
            None => return Err(GuardFailure::MissingField(SessionField::Profile)),
            Some(StoredProfile::Invalid { error, .. }) => return Err(GuardFailure::Shape(error)),
            Some(StoredProfile::Valid(_)) => {}
        }
        let expires_at = decode_expiry(&access).map_err(GuardFailure::Token)?;
        let now = self.clock.now_secs();
        if expires_at > now {
            Ok(())
        } else {
            Err(GuardFailure::Expired { expires_at, now })
        }
    }

    /// Check, and force a logout on failure. The failure is returned for logging only.
    pub fn validate_auth(&self) -> Option<GuardFailure> {
        self.run(GuardTrigger::Direct)
    }

    fn run(&self, trigger: GuardTrigger) -> Option<GuardFailure> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        match self.check() {
            Ok(()) => {
                debug!(?trigger, "session valid");
                None
            }
            Err(failure) => {
                info!(?trigger, reason = failure.reason(), detail = %failure, "session invalid; forcing logout");
                self.forced_logouts.fetch_add(1, Ordering::SeqCst);
                self.session.clear_session();
                Some(failure)
            }
        }
    }

    /// Start guarding: validate now, then keep validating until the handle goes away.
    ///
    /// A forced logout reloads into the login boundary, which tears the protected view
    /// down; the returned handle then reports itself unmounted.
    pub fn mount(self: &Arc<Self>) -> AppResult<GuardHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::internal("no_runtime".to_string(), format!("session guard needs a tokio runtime: {e}")))?;
        // subscribe before the first check so no foreign write slips between them
        let feed = self.session.subscribe();
        let live = Arc::new(Mutex::new(true));

        if self.run(GuardTrigger::Mount).is_some() {
            *live.lock() = false;
            return Ok(GuardHandle { live, task: None });
        }

        let guard = self.clone();
        let task_live = live.clone();
        let task = runtime.spawn(async move { guard.watch(feed, task_live).await });
        debug!(interval_ms = self.interval.as_millis() as u64, "session guard mounted");
        Ok(GuardHandle { live, task: Some(task) })
    }

    async fn watch(self: Arc<Self>, feed: ChangeFeed, live: Arc<Mutex<bool>>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut feed = Some(feed);
        loop {
            let trigger = tokio::select! {
                _ = ticker.tick() => GuardTrigger::Interval,
                changed = next_change(&mut feed) => {
                    if !changed { continue; }
                    GuardTrigger::StorageChange
                }
            };
            let mut mounted = live.lock();
            if !*mounted {
                break;
            }
            if self.run(trigger).is_some() {
                *mounted = false;
                break;
            }
        }
    }
}

// Resolves true on a foreign change, false once when the feed closes, then never again.
async fn next_change(feed: &mut Option<ChangeFeed>) -> bool {
    let Some(f) = feed.as_mut() else { return std::future::pending().await };
    match f.next().await {
        Some(_) => true,
        None => {
            *feed = None;
            false
        }
    }
}

/// Scoped ownership of a mounted guard. Unmounting (explicitly or on drop) cancels
/// the timer and the change listener; no check starts after it returns.
pub struct GuardHandle {
    live: Arc<Mutex<bool>>,
    task: Option<JoinHandle<()>>,
}

impl GuardHandle {
    pub fn is_mounted(&self) -> bool {
        *self.live.lock()
    }

    pub fn unmount(mut self) {
        self.release();
    }

    fn release(&mut self) {
        // taking the lock waits out any check in progress
        *self.live.lock() = false;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("session guard unmounted");
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod guard_tests;
