use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    Admin,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::User];

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "SUPER_ADMIN" => Some(Role::SuperAdmin),
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    /// Roles allowed through the dashboard's route gate.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity snapshot written at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("profile is not a JSON object")]
    NotAnObject,
    #[error("profile field `{0}` is missing")]
    Missing(&'static str),
    #[error("profile field `{0}` is not a string")]
    WrongType(&'static str),
    #[error("profile field `{0}` is empty")]
    Empty(&'static str),
    #[error("unknown role `{0}`")]
    UnknownRole(String),
}

fn required_str<'a>(obj: &'a serde_json::Map<String, Value>, field: &'static str) -> Result<&'a str, ShapeError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ShapeError::Missing(field)),
        Some(Value::String(s)) if s.is_empty() => Err(ShapeError::Empty(field)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ShapeError::WrongType(field)),
    }
}

impl UserProfile {
    /// Structural validation of an untyped profile. Extra fields are ignored.
    pub fn from_value(candidate: &Value) -> Result<UserProfile, ShapeError> {
        let Value::Object(obj) = candidate else { return Err(ShapeError::NotAnObject); };
        let id = required_str(obj, "id")?;
        let email = required_str(obj, "email")?;
        let name = required_str(obj, "name")?;
        let role = match obj.get("role") {
            None | Some(Value::Null) => return Err(ShapeError::Missing("role")),
            Some(Value::String(r)) => Role::parse(r).ok_or_else(|| ShapeError::UnknownRole(r.clone()))?,
            Some(other) => return Err(ShapeError::UnknownRole(other.to_string())),
        };
        Ok(UserProfile { id: id.to_string(), email: email.to_string(), name: name.to_string(), role })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "email": self.email,
            "name": self.name,
            "role": self.role.as_str(),
        })
    }
}

pub fn is_valid_profile(candidate: &Value) -> bool {
    UserProfile::from_value(candidate).is_ok()
}

/// A stored profile after parse-or-reject. `Invalid` keeps the raw role claim so the
/// route gate can still judge privilege on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredProfile {
    Valid(UserProfile),
    Invalid { role: Option<String>, error: ShapeError },
}

impl StoredProfile {
    pub fn parse(candidate: &Value) -> StoredProfile {
        match UserProfile::from_value(candidate) {
            Ok(p) => StoredProfile::Valid(p),
            Err(error) => StoredProfile::Invalid {
                role: candidate.get("role").and_then(Value::as_str).map(str::to_string),
                error,
            },
        }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            StoredProfile::Valid(p) => Some(p),
            StoredProfile::Invalid { .. } => None,
        }
    }

    pub fn role_claim(&self) -> Option<&str> {
        match self {
            StoredProfile::Valid(p) => Some(p.role.as_str()),
            StoredProfile::Invalid { role, .. } => role.as_deref(),
        }
    }
}

pub fn is_admin_role(candidate: Option<&StoredProfile>) -> bool {
    candidate
        .and_then(StoredProfile::role_claim)
        .and_then(Role::parse)
        .map(|r| r.is_admin())
        .unwrap_or(false)
}
