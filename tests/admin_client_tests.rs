//! Admin REST client against a local mock of the admin API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use vybly_admin::api::{AdminApi, AdminClient, CircleDraft, LoginCredentials};
use vybly_admin::config::AdminConfig;
use vybly_admin::identity::{Role, SessionAccessor};
use vybly_admin::login::{LoginFlow, LoginForm};
use vybly_admin::navigation::History;
use vybly_admin::storage::{MemoryStorage, SessionStore};

type Log = Arc<Mutex<Vec<String>>>;

const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjQxMDI0NDQ4MDB9.sig";

fn bearer(headers: &HeaderMap) -> String {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).unwrap_or("-").to_string()
}

fn user(id: &str, role: &str) -> Value {
    json!({
        "id": id, "email": format!("{id}@vybly.io"), "name": id, "role": role,
        "isActive": true, "isProfileVerified": role != "USER", "feelingToday": [],
        "createdAt": "2025-01-01T00:00:00.000Z", "updatedAt": "2025-01-01T00:00:00.000Z"
    })
}

async fn login(State(log): State<Log>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    log.lock().push(format!("POST /auth/login {}", body["email"].as_str().unwrap_or("")));
    if body["password"] == "secret1" {
        let data = json!({"accessToken": TOKEN, "refreshToken": "r1", "user": user("root", "SUPER_ADMIN")});
        (StatusCode::OK, Json(json!({"success": true, "statusCode": 200, "message": "Login successful", "data": data})))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "statusCode": 401, "message": "Invalid email or password"})))
    }
}

async fn users(State(log): State<Log>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let auth = bearer(&headers);
    log.lock().push(format!("GET /admin/users {auth}"));
    if auth != format!("Bearer {TOKEN}") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "message": "Unauthorized"})));
    }
    (StatusCode::OK, Json(json!({"success": true, "data": [user("root", "SUPER_ADMIN"), user("sam", "USER")]})))
}

async fn soft_delete(State(log): State<Log>, headers: HeaderMap, Path(id): Path<String>) -> Json<Value> {
    log.lock().push(format!("PATCH /admin/users/{id}/soft-delete {}", bearer(&headers)));
    Json(json!({"success": true, "message": "User soft deleted"}))
}

async fn promote(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    (StatusCode::FORBIDDEN, Json(json!({"success": false, "message": format!("Cannot promote {id}")})))
}

async fn circles() -> Json<Value> {
    Json(json!({"success": true, "data": [{"id": "c1", "name": "Runners", "description": "5k club", "isActive": true}]}))
}

async fn create_circle(State(log): State<Log>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    log.lock().push(format!("POST /admin/circles {}", body));
    let mut saved = body.clone();
    saved["id"] = json!("c9");
    saved["isActive"] = json!(true);
    (StatusCode::CREATED, Json(json!({"success": true, "data": saved})))
}

async fn delete_circle(State(log): State<Log>, Path(id): Path<String>) -> StatusCode {
    log.lock().push(format!("DELETE /admin/circles/{id}"));
    StatusCode::NO_CONTENT
}

async fn no_data() -> Json<Value> {
    Json(json!({"success": true}))
}

async fn spawn_api() -> (String, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/admin/users", get(users))
        .route("/api/v1/admin/users/{id}/soft-delete", patch(soft_delete))
        .route("/api/v1/super-admin/users/{id}/promote-to-admin", patch(promote))
        .route("/api/v1/circles", get(circles))
        .route("/api/v1/admin/circles", post(create_circle))
        .route("/api/v1/admin/circles/{id}", delete(delete_circle))
        .route("/api/v2/admin/users", get(no_data))
        .with_state(log.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), log)
}

fn client(base: &str, version: &str) -> (Arc<AdminClient>, SessionAccessor, MemoryStorage) {
    let config = AdminConfig { api_base_url: format!("{base}/api/{version}/"), ..AdminConfig::default() };
    let tab = MemoryStorage::new();
    let session = SessionAccessor::new(Arc::new(tab.clone()), Arc::new(History::starting_at("/login")));
    (Arc::new(AdminClient::new(&config, session.clone()).unwrap()), session, tab)
}

#[tokio::test]
async fn login_flow_then_authorized_listing() {
    let (base, log) = spawn_api().await;
    let (api, session, tab) = client(&base, "v1");
    assert!(api.base_url().ends_with("/api/v1"));

    let msg = LoginFlow::new(api.clone(), session.clone())
        .submit(&LoginForm::new("root@vybly.io", "secret1"))
        .await
        .unwrap();
    assert_eq!(msg, "Login successful");
    assert_eq!(tab.get_item("accessToken").as_deref(), Some(TOKEN));

    let users = api.list_users().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].role, Role::SuperAdmin);
    assert!(!users[1].is_profile_verified);

    let entries = log.lock().clone();
    assert_eq!(entries[0], "POST /auth/login root@vybly.io");
    assert_eq!(entries[1], format!("GET /admin/users Bearer {TOKEN}"));
}

#[tokio::test]
async fn rejected_login_carries_server_message() {
    let (base, _log) = spawn_api().await;
    let (api, _session, _tab) = client(&base, "v1");
    let creds = LoginCredentials { email: "root@vybly.io".into(), password: "wrong-pass".into() };
    let err = api.login(&creds).await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(err.message(), "Invalid email or password");
}

#[tokio::test]
async fn missing_credential_is_unauthorized() {
    let (base, log) = spawn_api().await;
    let (api, _session, _tab) = client(&base, "v1");
    let err = api.list_users().await.unwrap_err();
    assert_eq!(err.http_status(), 401);
    assert_eq!(err.message(), "Unauthorized");
    assert_eq!(log.lock().last().map(String::as_str), Some("GET /admin/users -"));
}

#[tokio::test]
async fn mutations_and_error_mapping() {
    let (base, log) = spawn_api().await;
    let (api, _session, tab) = client(&base, "v1");
    tab.set_item("accessToken", TOKEN).unwrap();

    api.soft_delete_user("sam").await.unwrap();
    let err = api.promote_to_admin("sam").await.unwrap_err();
    assert_eq!(err.http_status(), 403);
    assert_eq!(err.message(), "Cannot promote sam");

    let created = api.create_circle(&CircleDraft::new("Climbers", "Bouldering")).await.unwrap();
    assert_eq!(created.id, "c9");
    assert_eq!(created.description, "Bouldering");
    assert_eq!(api.list_circles().await.unwrap()[0].name, "Runners");
    api.delete_circle("c1").await.unwrap();

    // the mock has no PATCH route here: an empty error body falls back to the status line
    let err = api.update_circle("c1", &CircleDraft::new("x", "y")).await.unwrap_err();
    assert_eq!(err.code_str(), "http_405");
    assert_eq!(err.message(), "Request failed with status code 405");

    let entries = log.lock().clone();
    assert!(entries.contains(&format!("PATCH /admin/users/sam/soft-delete Bearer {TOKEN}")));
    assert!(entries.contains(&"DELETE /admin/circles/c1".to_string()));
}

#[tokio::test]
async fn envelope_without_data_is_rejected() {
    let (base, _log) = spawn_api().await;
    let (api, _session, _tab) = client(&base, "v2");
    let err = api.list_users().await.unwrap_err();
    assert_eq!(err.message(), "Invalid server response");
}
