use crate::api::{AdminApi, User};
use crate::error::AppResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overview {
    pub total: usize,
    pub active: usize,
    pub verified: usize,
    pub unverified: usize,
}

impl Overview {
    pub fn from_users(users: &[User]) -> Self {
        let verified = users.iter().filter(|u| u.is_profile_verified).count();
        Overview {
            total: users.len(),
            active: users.iter().filter(|u| u.is_active).count(),
            verified,
            unverified: users.len() - verified,
        }
    }

    pub async fn load<A: AdminApi>(api: &A) -> AppResult<Self> {
        Ok(Self::from_users(&api.list_users().await?))
    }

    /// Card text: zero renders as "N/A".
    pub fn card(count: usize) -> String {
        if count == 0 { "N/A".to_string() } else { count.to_string() }
    }
}
