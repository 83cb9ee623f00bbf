//! State behind the protected views: the overview cards, the user directory and the
//! circle board. Each holds the list it last fetched and updates it locally only
//! after the server confirmed a change.

mod circles;
mod overview;
mod users;

pub use circles::{CircleBoard, CircleForm, DELETE_PROMPT, DESCRIPTION_MAX, NAME_MAX};
pub use overview::Overview;
pub use users::{ActionDenied, UserAction, UserDirectory};

/// Text of a confirmation dialog shown before a destructive or privileged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: &'static str,
    pub text: &'static str,
    pub confirm_label: &'static str,
}
