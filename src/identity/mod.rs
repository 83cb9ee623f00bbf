//! Client-side session integrity and authorization for the admin dashboard.
//! Keep the public surface thin and split implementation across sub-modules.

mod clock;
mod gate;
mod guard;
mod profile;
mod session;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{DenyReason, GateDecision, RouteGate};
pub use guard::{GuardFailure, GuardHandle, GuardTrigger, SessionGuard, DEFAULT_CHECK_INTERVAL};
pub use profile::{is_admin_role, is_valid_profile, Role, ShapeError, StoredProfile, UserProfile};
pub use session::{SessionAccessor, SessionField, SessionKeys, SessionSnapshot, DEFAULT_LOGIN_PATH};
pub use token::{decode_expiry, is_live, is_live_at, is_live_with, DecodeError};
