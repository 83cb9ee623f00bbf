//! Admin REST API: wire models, the `AdminApi` seam and its HTTP implementation.
//!
//! Every response is wrapped in an envelope `{ success, statusCode, message, data }`.
//! Mutations on users return nothing the dashboard uses; circle mutations return the
//! stored circle, which replaces the local copy.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::identity::Role;

mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use client::AdminClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_profile_verified: bool,
    #[serde(default)]
    pub feeling_today: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// Body of a circle create/update request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleDraft {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> AppResult<T> {
        self.data.ok_or_else(|| AppError::api("invalid_response", "Invalid server response"))
    }
}

/// The admin API as the dashboard sees it.
pub trait AdminApi: Send + Sync {
    fn login(&self, credentials: &LoginCredentials) -> impl Future<Output = AppResult<Envelope<LoginData>>> + Send;

    fn list_users(&self) -> impl Future<Output = AppResult<Vec<User>>> + Send;

    fn soft_delete_user(&self, user_id: &str) -> impl Future<Output = AppResult<()>> + Send;

    fn promote_to_admin(&self, user_id: &str) -> impl Future<Output = AppResult<()>> + Send;

    fn demote_to_user(&self, user_id: &str) -> impl Future<Output = AppResult<()>> + Send;

    fn list_circles(&self) -> impl Future<Output = AppResult<Vec<Circle>>> + Send;

    fn create_circle(&self, draft: &CircleDraft) -> impl Future<Output = AppResult<Circle>> + Send;

    fn update_circle(&self, circle_id: &str, draft: &CircleDraft) -> impl Future<Output = AppResult<Circle>> + Send;

    fn delete_circle(&self, circle_id: &str) -> impl Future<Output = AppResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_wire_shape() {
        let u: User = serde_json::from_value(json!({
            "id": "u1", "email": "a@b.com", "name": "Ann", "role": "SUPER_ADMIN",
            "isActive": true, "isProfileVerified": false, "feelingToday": ["HAPPY"],
            "createdAt": "2025-01-01T00:00:00Z", "updatedAt": "2025-01-02T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(u.role, Role::SuperAdmin);
        assert!(u.is_active);
        assert_eq!(u.feeling_today, vec!["HAPPY".to_string()]);
    }

    #[test]
    fn envelope_without_data_is_invalid_response() {
        let env: Envelope<Vec<Circle>> = serde_json::from_value(json!({"success": true, "message": "ok"})).unwrap();
        let err = env.into_data().unwrap_err();
        assert_eq!(err.message(), "Invalid server response");
    }

    #[test]
    fn login_data_tolerates_missing_fields() {
        let env: Envelope<LoginData> =
            serde_json::from_value(json!({"message": "Welcome", "data": {"accessToken": "a.b.c"}})).unwrap();
        let data = env.data.unwrap();
        assert_eq!(data.access_token.as_deref(), Some("a.b.c"));
        assert!(data.user.is_none());
    }
}
