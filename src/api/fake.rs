//! In-memory `AdminApi` used by unit tests. Behaves like the server for the happy path
//! and can be told to fail the next call.

use parking_lot::Mutex;

use super::{AdminApi, Circle, CircleDraft, Envelope, LoginCredentials, LoginData, User};
use crate::error::{AppError, AppResult};
use crate::identity::Role;

#[derive(Default)]
pub(crate) struct FakeApi {
    pub users: Mutex<Vec<User>>,
    pub circles: Mutex<Vec<Circle>>,
    pub login_reply: Mutex<Option<Envelope<LoginData>>>,
    pub fail_next: Mutex<Option<AppError>>,
    pub calls: Mutex<Vec<String>>,
}

pub(crate) fn user(id: &str, role: Role, active: bool, verified: bool) -> User {
    User {
        id: id.to_string(),
        email: format!("{id}@vybly.io"),
        name: id.to_uppercase(),
        role,
        is_active: active,
        is_profile_verified: verified,
        feeling_today: Vec::new(),
        created_at: "2025-01-01T00:00:00Z".into(),
        updated_at: "2025-01-01T00:00:00Z".into(),
    }
}

pub(crate) fn circle(id: &str, name: &str) -> Circle {
    Circle {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{name} circle"),
        is_active: true,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

impl FakeApi {
    pub fn with_users(users: Vec<User>) -> Self {
        let api = Self::default();
        *api.users.lock() = users;
        api
    }

    pub fn with_circles(circles: Vec<Circle>) -> Self {
        let api = Self::default();
        *api.circles.lock() = circles;
        api
    }

    pub fn fail_next(&self, err: AppError) {
        *self.fail_next.lock() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn enter(&self, call: String) -> AppResult<()> {
        self.calls.lock().push(call);
        match self.fail_next.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn set_role(&self, id: &str, role: Role) -> AppResult<()> {
        let mut users = self.users.lock();
        let u = users.iter_mut().find(|u| u.id == id).ok_or_else(|| AppError::not_found("not_found", "User not found"))?;
        u.role = role;
        Ok(())
    }
}

impl AdminApi for FakeApi {
    async fn login(&self, credentials: &LoginCredentials) -> AppResult<Envelope<LoginData>> {
        self.enter(format!("login {}", credentials.email))?;
        self.login_reply.lock().take().ok_or_else(|| AppError::auth("unauthorized", "Invalid credentials"))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.enter("list_users".into())?;
        Ok(self.users.lock().clone())
    }

    async fn soft_delete_user(&self, user_id: &str) -> AppResult<()> {
        self.enter(format!("soft_delete {user_id}"))?;
        if let Some(u) = self.users.lock().iter_mut().find(|u| u.id == user_id) {
            u.is_active = false;
        }
        Ok(())
    }

    async fn promote_to_admin(&self, user_id: &str) -> AppResult<()> {
        self.enter(format!("promote {user_id}"))?;
        self.set_role(user_id, Role::Admin)
    }

    async fn demote_to_user(&self, user_id: &str) -> AppResult<()> {
        self.enter(format!("demote {user_id}"))?;
        self.set_role(user_id, Role::User)
    }

    async fn list_circles(&self) -> AppResult<Vec<Circle>> {
        self.enter("list_circles".into())?;
        Ok(self.circles.lock().clone())
    }

    async fn create_circle(&self, draft: &CircleDraft) -> AppResult<Circle> {
        self.enter(format!("create {}", draft.name))?;
        let mut circles = self.circles.lock();
        let mut c = circle(&format!("c{}", circles.len() + 1), &draft.name);
        c.description = draft.description.clone();
        c.created_at = "2025-06-01T00:00:00Z".into();
        circles.push(c.clone());
        Ok(c)
    }

    async fn update_circle(&self, circle_id: &str, draft: &CircleDraft) -> AppResult<Circle> {
        self.enter(format!("update {circle_id}"))?;
        let mut circles = self.circles.lock();
        let c = circles
            .iter_mut()
            .find(|c| c.id == circle_id)
            .ok_or_else(|| AppError::not_found("not_found", "Circle not found"))?;
        c.name = draft.name.clone();
        c.description = draft.description.clone();
        c.updated_at = "2025-06-02T00:00:00Z".into();
        Ok(c.clone())
    }

    async fn delete_circle(&self, circle_id: &str) -> AppResult<()> {
        self.enter(format!("delete {circle_id}"))?;
        self.circles.lock().retain(|c| c.id != circle_id);
        Ok(())
    }
}
