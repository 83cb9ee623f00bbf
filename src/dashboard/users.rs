use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::ConfirmPrompt;
use crate::api::{AdminApi, User};
use crate::error::{AppError, AppResult};
use crate::identity::{Role, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    SoftDelete,
    Promote,
    Demote,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::SoftDelete => "soft-delete",
            UserAction::Promote => "promote",
            UserAction::Demote => "demote",
        }
    }

    pub fn parse(s: &str) -> Option<UserAction> {
        match s {
            "soft-delete" | "delete" => Some(UserAction::SoftDelete),
            "promote" => Some(UserAction::Promote),
            "demote" => Some(UserAction::Demote),
            _ => None,
        }
    }

    pub fn prompt(&self) -> ConfirmPrompt {
        match self {
            UserAction::SoftDelete => ConfirmPrompt {
                title: "Soft delete user?",
                text: "This cannot be undone",
                confirm_label: "Delete",
            },
            UserAction::Promote => ConfirmPrompt {
                title: "Promote to Admin?",
                text: "This user will gain admin privileges",
                confirm_label: "Promote",
            },
            UserAction::Demote => ConfirmPrompt {
                title: "Demote to Regular User?",
                text: "This user will lose admin privileges",
                confirm_label: "Demote",
            },
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            UserAction::SoftDelete => "User soft deleted successfully",
            UserAction::Promote => "User promoted to admin successfully",
            UserAction::Demote => "User demoted to regular user successfully",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionDenied {
    #[error("User not found")]
    UnknownUser,
    #[error("User is already soft deleted")]
    AlreadyDeleted,
    #[error("Cannot delete yourself")]
    SelfDelete,
    #[error("Cannot delete SUPER_ADMIN")]
    SuperAdminProtected,
    #[error("Cannot delete other admins")]
    PeerAdminProtected,
    #[error("Only SUPER_ADMIN can change roles")]
    RequiresSuperAdmin,
    #[error("Only USER accounts can be promoted")]
    NotPromotable,
    #[error("Only ADMIN accounts can be demoted")]
    NotDemotable,
}

impl From<ActionDenied> for AppError {
    fn from(denied: ActionDenied) -> Self {
        match denied {
            ActionDenied::UnknownUser => AppError::not_found("unknown_user".to_string(), denied.to_string()),
            other => AppError::forbidden("action_denied".to_string(), other.to_string()),
        }
    }
}

/// The "All Users" table. `actor` is the signed-in operator, if their stored profile
/// was readable; permission checks mirror what the table lets them click.
pub struct UserDirectory<A> {
    api: Arc<A>,
    actor: Option<UserProfile>,
    users: Vec<User>,
    last_error: Option<String>,
}

impl<A: AdminApi> UserDirectory<A> {
    pub fn new(api: Arc<A>, actor: Option<UserProfile>) -> Self {
        Self { api, actor, users: Vec::new(), last_error: None }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn get(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn load(&mut self) -> AppResult<()> {
        match self.api.list_users().await {
            Ok(users) => {
                self.users = users;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.message().to_string());
                Err(e)
            }
        }
    }

    pub fn can(&self, action: UserAction, user_id: &str) -> Result<(), ActionDenied> {
        let target = self.get(user_id).ok_or(ActionDenied::UnknownUser)?;
        let actor_role = self.actor.as_ref().map(|a| a.role);
        match action {
            UserAction::SoftDelete => {
                if !target.is_active {
                    return Err(ActionDenied::AlreadyDeleted);
                }
                if self.actor.as_ref().is_some_and(|a| a.id == target.id) {
                    return Err(ActionDenied::SelfDelete);
                }
                if actor_role == Some(Role::Admin) {
                    match target.role {
                        Role::SuperAdmin => return Err(ActionDenied::SuperAdminProtected),
                        Role::Admin => return Err(ActionDenied::PeerAdminProtected),
                        Role::User => {}
                    }
                }
                Ok(())
            }
            UserAction::Promote | UserAction::Demote => {
                if actor_role != Some(Role::SuperAdmin) {
                    return Err(ActionDenied::RequiresSuperAdmin);
                }
                match (action, target.role) {
                    (UserAction::Promote, Role::User) | (UserAction::Demote, Role::Admin) => Ok(()),
                    (UserAction::Promote, _) => Err(ActionDenied::NotPromotable),
                    _ => Err(ActionDenied::NotDemotable),
                }
            }
        }
    }

    /// Run `action` against the server and mirror the result locally. Taking `&mut self`
    /// keeps a second mutation from starting while one is in flight.
    pub async fn apply(&mut self, action: UserAction, user_id: &str) -> AppResult<&'static str> {
        self.can(action, user_id)?;
        let outcome = match action {
            UserAction::SoftDelete => self.api.soft_delete_user(user_id).await,
            UserAction::Promote => self.api.promote_to_admin(user_id).await,
            UserAction::Demote => self.api.demote_to_user(user_id).await,
        };
        if let Err(e) = outcome {
            warn!(action = action.as_str(), user_id, error = %e, "user change rejected");
            self.last_error = Some(e.message().to_string());
            return Err(e);
        }
        if let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) {
            match action {
                UserAction::SoftDelete => user.is_active = false,
                UserAction::Promote => user.role = Role::Admin,
                UserAction::Demote => user.role = Role::User,
            }
        }
        info!(action = action.as_str(), user_id, "user updated");
        Ok(action.success_message())
    }

    pub async fn soft_delete(&mut self, user_id: &str) -> AppResult<&'static str> {
        self.apply(UserAction::SoftDelete, user_id).await
    }

    pub async fn promote(&mut self, user_id: &str) -> AppResult<&'static str> {
        self.apply(UserAction::Promote, user_id).await
    }

    pub async fn demote(&mut self, user_id: &str) -> AppResult<&'static str> {
        self.apply(UserAction::Demote, user_id).await
    }
}

#[cfg(test)]
#[path = "users_tests.rs"]
mod users_tests;
