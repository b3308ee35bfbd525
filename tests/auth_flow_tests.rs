//! End-to-end session lifecycle tests against a local stub API
//!
//! Each test stands up a small axum server with controllable auth behavior
//! and drives the client through login, 401-triggered refresh, and failure
//! paths.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use portal_client::client::ApiClient;
use portal_client::config::ApiConfig;
use portal_client::error::Error;
use portal_client::session::{FileStorage, Identity, MemoryStorage, ProjectionStorage};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum RefreshMode {
    /// Return this access token
    Token(String),
    /// 200 with no token in the body
    Empty,
    /// The refresh endpoint itself rejects the call
    Unauthorized,
}

struct StubInner {
    refresh_calls: AtomicUsize,
    data_calls: AtomicUsize,
    refresh_mode: Mutex<RefreshMode>,
    /// Bearer token the data and profile endpoints accept
    accepted_token: Mutex<String>,
    /// When set, /data rejects every request regardless of token
    data_rejects_everything: AtomicBool,
    last_data_bearer: Mutex<Option<String>>,
    /// Override for the profile response body (shape tests)
    profile_body: Mutex<Option<serde_json::Value>>,
    /// Widens the refresh window so concurrent 401s pile up
    refresh_delay: Duration,
}

#[derive(Clone)]
struct Stub {
    inner: Arc<StubInner>,
}

impl Stub {
    fn new(accepted_token: &str, refresh_mode: RefreshMode) -> Self {
        Self {
            inner: Arc::new(StubInner {
                refresh_calls: AtomicUsize::new(0),
                data_calls: AtomicUsize::new(0),
                refresh_mode: Mutex::new(refresh_mode),
                accepted_token: Mutex::new(accepted_token.to_string()),
                data_rejects_everything: AtomicBool::new(false),
                last_data_bearer: Mutex::new(None),
                profile_body: Mutex::new(None),
                refresh_delay: Duration::from_millis(50),
            }),
        }
    }

    fn refresh_calls(&self) -> usize {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    fn data_calls(&self) -> usize {
        self.inner.data_calls.load(Ordering::SeqCst)
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn make_token(role: &str, exp_offset: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": "42",
        "username": "jdoe",
        "role": role,
        "studentId": "21-1234-567",
        "yearLevel": 3,
        "iat": now,
        "exp": now + exp_offset,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"stub-secret"))
        .expect("Failed to encode token")
}

fn student_profile_json() -> serde_json::Value {
    serde_json::json!({
        "studentId": "21-1234-567",
        "yearLevel": 3,
        "user": {
            "userId": "42",
            "username": "jdoe",
            "firstName": "Jane",
            "lastName": "Doe",
            "birthDate": "2004-03-09",
            "email": "jdoe@example.edu",
            "role": "STUDENT"
        }
    })
}

fn admin_profile_json() -> serde_json::Value {
    serde_json::json!({
        "user": {
            "userId": "7",
            "username": "registrar",
            "firstName": "Sam",
            "lastName": "Cruz",
            "birthDate": "1988-11-02",
            "email": "registrar@example.edu",
            "role": "ADMIN"
        },
        "position": "Registrar"
    })
}

async fn login_handler(State(stub): State<Stub>, Json(body): Json<serde_json::Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if password == "secret" && !username.is_empty() {
        let token = stub.inner.accepted_token.lock().unwrap().clone();
        Json(serde_json::json!({ "accessToken": token })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn refresh_handler(State(stub): State<Stub>) -> Response {
    stub.inner.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let mode = stub.inner.refresh_mode.lock().unwrap().clone();
    tokio::time::sleep(stub.inner.refresh_delay).await;
    match mode {
        RefreshMode::Token(token) => {
            Json(serde_json::json!({ "accessToken": token })).into_response()
        }
        RefreshMode::Empty => Json(serde_json::json!({})).into_response(),
        RefreshMode::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn profile_handler(stub: Stub, headers: HeaderMap, default_body: serde_json::Value) -> Response {
    match bearer(&headers) {
        Some(token) if token == *stub.inner.accepted_token.lock().unwrap() => {
            let body = stub
                .inner
                .profile_body
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(default_body);
            Json(body).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn student_profile_handler(State(stub): State<Stub>, headers: HeaderMap) -> Response {
    profile_handler(stub, headers, student_profile_json()).await
}

async fn admin_profile_handler(State(stub): State<Stub>, headers: HeaderMap) -> Response {
    profile_handler(stub, headers, admin_profile_json()).await
}

async fn data_handler(State(stub): State<Stub>, headers: HeaderMap) -> Response {
    stub.inner.data_calls.fetch_add(1, Ordering::SeqCst);
    let token = bearer(&headers);
    *stub.inner.last_data_bearer.lock().unwrap() = token.clone();

    if stub.inner.data_rejects_everything.load(Ordering::SeqCst) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match token {
        Some(token) if token == *stub.inner.accepted_token.lock().unwrap() => {
            Json(serde_json::json!({ "ok": true })).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/refresh", post(refresh_handler))
        .route("/students/me", get(student_profile_handler))
        .route("/admins/me", get(admin_profile_handler))
        .route("/data", get(data_handler))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client_for(base_url: &str) -> ApiClient {
    client_with_storage(base_url, Arc::new(MemoryStorage::new()))
}

fn client_with_storage(base_url: &str, storage: Arc<dyn ProjectionStorage>) -> ApiClient {
    let config = ApiConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        ..ApiConfig::default()
    };
    ApiClient::with_storage(config, storage).expect("Failed to build client")
}

#[tokio::test]
async fn test_login_resolves_student_identity() {
    let token = make_token("STUDENT", 3600);
    let stub = Stub::new(&token, RefreshMode::Token(token.clone()));
    let base = spawn_stub(stub).await;
    let client = client_for(&base);

    let identity = client.login("jdoe", "secret").await.expect("Login failed");

    match identity {
        Identity::Student { student_id, .. } => assert_eq!(student_id, "21-1234-567"),
        _ => panic!("Expected student identity"),
    }

    let snapshot = client.snapshot().await;
    assert!(snapshot.authenticated);
    assert!(!snapshot.session_expired);
    assert_eq!(snapshot.access_token, Some(token));
}

#[tokio::test]
async fn test_login_resolves_admin_identity() {
    let token = make_token("ADMIN", 3600);
    let stub = Stub::new(&token, RefreshMode::Token(token.clone()));
    let base = spawn_stub(stub).await;
    let client = client_for(&base);

    let identity = client.login("registrar", "secret").await.expect("Login failed");
    assert!(matches!(identity, Identity::Admin { .. }));
}

#[tokio::test]
async fn test_login_rejected_does_not_touch_session() {
    let token = make_token("STUDENT", 3600);
    let stub = Stub::new(&token, RefreshMode::Token(token.clone()));
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);

    let result = client.login("jdoe", "wrong").await;
    assert!(matches!(result, Err(Error::UnexpectedStatus(status)) if status == 401));
    assert!(!client.snapshot().await.authenticated);
    assert_eq!(stub.refresh_calls(), 0);
}

#[tokio::test]
async fn test_401_triggers_refresh_and_replay_with_new_token() {
    let fresh = make_token("STUDENT", 3600);
    let stub = Stub::new(&fresh, RefreshMode::Token(fresh.clone()));
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);

    // Stale token the server no longer accepts
    client.session().set_token(make_token("STUDENT", 60)).await;

    let response = client.get("/data").await.expect("Request failed");
    assert_eq!(response.status(), 200);

    assert_eq!(stub.refresh_calls(), 1);
    // The replay carried the refreshed token
    assert_eq!(
        stub.inner.last_data_bearer.lock().unwrap().as_deref(),
        Some(fresh.as_str())
    );

    let snapshot = client.snapshot().await;
    assert!(snapshot.authenticated);
    assert_eq!(snapshot.access_token, Some(fresh));
}

#[tokio::test]
async fn test_concurrent_401s_share_a_single_refresh() {
    let fresh = make_token("STUDENT", 3600);
    let stub = Stub::new(&fresh, RefreshMode::Token(fresh.clone()));
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);
    client.session().set_token(make_token("STUDENT", 60)).await;

    let requests = (0..4).map(|_| client.get("/data"));
    let results = futures_util::future::join_all(requests).await;

    for result in results {
        assert_eq!(result.expect("Request failed").status(), 200);
    }
    assert_eq!(stub.refresh_calls(), 1);
    // Each of the 4 requests was sent once and replayed once
    assert_eq!(stub.data_calls(), 8);
}

#[tokio::test]
async fn test_concurrent_failure_wave_shares_the_outcome() {
    let stub = Stub::new(&make_token("STUDENT", 3600), RefreshMode::Unauthorized);
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);
    client.session().set_token(make_token("STUDENT", 60)).await;

    let requests = (0..3).map(|_| client.get("/data"));
    let results = futures_util::future::join_all(requests).await;

    for result in results {
        assert!(result.is_err());
    }
    assert_eq!(stub.refresh_calls(), 1);

    let snapshot = client.snapshot().await;
    assert!(snapshot.access_token.is_none());
    assert!(snapshot.session_expired);
}

#[tokio::test]
async fn test_retry_once_second_401_propagates() {
    let fresh = make_token("STUDENT", 3600);
    let stub = Stub::new(&fresh, RefreshMode::Token(fresh.clone()));
    stub.inner.data_rejects_everything.store(true, Ordering::SeqCst);
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);
    client.session().set_token(make_token("STUDENT", 60)).await;

    let response = client.get("/data").await.expect("Request failed");
    assert_eq!(response.status(), 401);

    // One refresh, one original send, one replay, no third attempt
    assert_eq!(stub.refresh_calls(), 1);
    assert_eq!(stub.data_calls(), 2);
}

#[tokio::test]
async fn test_refresh_endpoint_401_clears_session() {
    let stub = Stub::new(&make_token("STUDENT", 3600), RefreshMode::Unauthorized);
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);
    client.session().set_token(make_token("STUDENT", 60)).await;

    let result = client.get("/data").await;
    assert!(matches!(result, Err(Error::UnexpectedStatus(status)) if status == 401));
    assert_eq!(stub.refresh_calls(), 1);

    let snapshot = client.snapshot().await;
    assert!(snapshot.access_token.is_none());
    assert!(snapshot.identity.is_none());
    assert!(snapshot.session_expired);
}

#[tokio::test]
async fn test_refresh_without_token_in_response_fails() {
    let stub = Stub::new(&make_token("STUDENT", 3600), RefreshMode::Empty);
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);
    client.session().set_token(make_token("STUDENT", 60)).await;

    let result = client.get("/data").await;
    assert!(matches!(result, Err(Error::NoAccessTokenReturned)));

    let snapshot = client.snapshot().await;
    assert!(snapshot.access_token.is_none());
    assert!(snapshot.session_expired);
}

#[tokio::test]
async fn test_refreshed_token_failing_profile_validation_is_unusable() {
    let fresh = make_token("STUDENT", 3600);
    let stub = Stub::new(&fresh, RefreshMode::Token(fresh.clone()));
    // Profile endpoint returns a body without the embedded user object
    *stub.inner.profile_body.lock().unwrap() =
        Some(serde_json::json!({ "studentId": "21-1234-567", "yearLevel": 3 }));
    let base = spawn_stub(stub.clone()).await;
    let client = client_for(&base);
    client.session().set_token(make_token("STUDENT", 60)).await;

    let result = client.get("/data").await;
    assert!(matches!(result, Err(Error::InvalidProfileShape(_))));

    let snapshot = client.snapshot().await;
    assert!(snapshot.access_token.is_none());
    assert!(snapshot.session_expired);
}

#[tokio::test]
async fn test_resolve_profile_with_expired_token() {
    let stub = Stub::new(&make_token("STUDENT", 3600), RefreshMode::Empty);
    let base = spawn_stub(stub).await;
    let client = client_for(&base);
    client.session().set_token(make_token("STUDENT", -3600)).await;

    let result = client.resolve_profile().await;
    assert!(matches!(result, Err(Error::TokenExpired)));
    assert!(client.snapshot().await.access_token.is_none());
}

#[tokio::test]
async fn test_resolve_profile_with_unrecognized_role() {
    let stub = Stub::new(&make_token("STUDENT", 3600), RefreshMode::Empty);
    let base = spawn_stub(stub).await;
    let client = client_for(&base);
    client.session().set_token(make_token("SUPERUSER", 3600)).await;

    let result = client.resolve_profile().await;
    assert!(matches!(result, Err(Error::UnrecognizedRole(role)) if role == "SUPERUSER"));
    assert!(client.snapshot().await.access_token.is_none());
}

#[tokio::test]
async fn test_resolve_profile_with_malformed_token() {
    let stub = Stub::new(&make_token("STUDENT", 3600), RefreshMode::Empty);
    let base = spawn_stub(stub).await;
    let client = client_for(&base);
    client.session().set_token("not-a-jwt".to_string()).await;

    let result = client.resolve_profile().await;
    assert!(matches!(result, Err(Error::MalformedToken)));
    assert!(client.snapshot().await.access_token.is_none());
}

#[tokio::test]
async fn test_resolve_profile_without_token() {
    let stub = Stub::new(&make_token("STUDENT", 3600), RefreshMode::Empty);
    let base = spawn_stub(stub).await;
    let client = client_for(&base);

    let result = client.resolve_profile().await;
    assert!(matches!(result, Err(Error::NoToken)));
}

#[tokio::test]
async fn test_restored_session_refreshes_on_startup() {
    let fresh = make_token("STUDENT", 3600);
    let stub = Stub::new(&fresh, RefreshMode::Token(fresh.clone()));
    let base = spawn_stub(stub.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");

    let client = client_with_storage(&base, Arc::new(FileStorage::new(&session_file)));
    client.login("jdoe", "secret").await.expect("Login failed");

    // Simulated restart: new client over the same storage, empty memory
    let restarted = client_with_storage(&base, Arc::new(FileStorage::new(&session_file)));
    let usable = restarted.restore_session().await.expect("Restore failed");

    assert!(usable);
    let snapshot = restarted.snapshot().await;
    assert!(snapshot.authenticated);
    assert!(snapshot.access_token.is_some());
    assert!(matches!(snapshot.identity, Some(Identity::Student { .. })));
}

#[tokio::test]
async fn test_restored_session_with_failing_refresh_clears() {
    let fresh = make_token("STUDENT", 3600);
    let stub = Stub::new(&fresh, RefreshMode::Token(fresh.clone()));
    let base = spawn_stub(stub.clone()).await;

    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");

    let client = client_with_storage(&base, Arc::new(FileStorage::new(&session_file)));
    client.login("jdoe", "secret").await.expect("Login failed");

    // The refresh credential stops working across the restart
    *stub.inner.refresh_mode.lock().unwrap() = RefreshMode::Unauthorized;

    let restarted = client_with_storage(&base, Arc::new(FileStorage::new(&session_file)));
    let usable = restarted.restore_session().await.expect("Restore failed");

    assert!(!usable);
    let snapshot = restarted.snapshot().await;
    assert!(!snapshot.authenticated);
    assert!(snapshot.session_expired);
}

#[tokio::test]
async fn test_logout_clears_session_and_projection() {
    let fresh = make_token("STUDENT", 3600);
    let stub = Stub::new(&fresh, RefreshMode::Token(fresh.clone()));
    let base = spawn_stub(stub).await;

    let dir = tempfile::tempdir().unwrap();
    let session_file = dir.path().join("session.json");

    let client = client_with_storage(&base, Arc::new(FileStorage::new(&session_file)));
    client.login("jdoe", "secret").await.expect("Login failed");
    client.logout().await.expect("Logout failed");

    assert!(!client.snapshot().await.authenticated);

    // Nothing comes back after a restart either
    let restarted = client_with_storage(&base, Arc::new(FileStorage::new(&session_file)));
    let usable = restarted.restore_session().await.expect("Restore failed");
    assert!(!usable);
    assert!(restarted.snapshot().await.identity.is_none());
}
