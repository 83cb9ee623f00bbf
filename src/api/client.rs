use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{AdminApi, Circle, CircleDraft, Envelope, LoginCredentials, LoginData, User};
use crate::config::AdminConfig;
use crate::error::{AppError, AppResult};
use crate::identity::SessionAccessor;

/// HTTP client for the admin API. Every request after login carries the stored access
/// credential as a bearer token, read fresh from the session each time.
#[derive(Clone)]
pub struct AdminClient {
    base: String,
    client: reqwest::Client,
    session: SessionAccessor,
}

impl AdminClient {
    pub fn new(config: &AdminConfig, session: SessionAccessor) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::config("http_client".to_string(), e.to_string()))?;
        Ok(Self { base: config.api_base().to_string(), client, session })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        let req = self.client.request(method, url);
        match self.session.get_access() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> AppResult<Envelope<T>> {
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(failure(status, &bytes));
        }
        serde_json::from_slice::<Envelope<T>>(&bytes).map_err(|e| {
            debug!(error = %e, "unexpected response body");
            AppError::api("invalid_response".to_string(), format!("Invalid server response: {e}"))
        })
    }

    // Mutations whose response body is not used; an empty 2xx body is fine.
    async fn send_unit(&self, req: RequestBuilder) -> AppResult<()> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = resp.bytes().await?;
        Err(failure(status, &bytes))
    }

    async fn patch_empty(&self, path: &str) -> AppResult<()> {
        let body = serde_json::json!({});
        self.send_unit(self.request(Method::PATCH, path).json(&body)).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, method: Method, path: &str, body: &B) -> AppResult<T> {
        self.send::<T>(self.request(method, path).json(body)).await?.into_data()
    }
}

// Prefer the server's own message; fall back to a generic status line.
fn failure(status: StatusCode, body: &[u8]) -> AppError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));
    warn!(status = status.as_u16(), %message, "admin api request failed");
    AppError::from_status(status.as_u16(), message)
}

impl AdminApi for AdminClient {
    async fn login(&self, credentials: &LoginCredentials) -> AppResult<Envelope<LoginData>> {
        let req = self.client.post(format!("{}/auth/login", self.base)).json(credentials);
        self.send(req).await
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        self.send::<Vec<User>>(self.request(Method::GET, "/admin/users")).await?.into_data()
    }

    async fn soft_delete_user(&self, user_id: &str) -> AppResult<()> {
        self.patch_empty(&format!("/admin/users/{user_id}/soft-delete")).await
    }

    async fn promote_to_admin(&self, user_id: &str) -> AppResult<()> {
        self.patch_empty(&format!("/super-admin/users/{user_id}/promote-to-admin")).await
    }

    async fn demote_to_user(&self, user_id: &str) -> AppResult<()> {
        self.patch_empty(&format!("/super-admin/users/{user_id}/demote-to-user")).await
    }

    async fn list_circles(&self) -> AppResult<Vec<Circle>> {
        self.send::<Vec<Circle>>(self.request(Method::GET, "/circles")).await?.into_data()
    }

    async fn create_circle(&self, draft: &CircleDraft) -> AppResult<Circle> {
        self.send_json(Method::POST, "/admin/circles", draft).await
    }

    async fn update_circle(&self, circle_id: &str, draft: &CircleDraft) -> AppResult<Circle> {
        self.send_json(Method::PATCH, &format!("/admin/circles/{circle_id}"), draft).await
    }

    async fn delete_circle(&self, circle_id: &str) -> AppResult<()> {
        self.send_unit(self.request(Method::DELETE, &format!("/admin/circles/{circle_id}"))).await
    }
}
