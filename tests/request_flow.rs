//! End-to-end checks of the request layer against a real HTTP server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Multipart, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use household_client::{
    AuthContext, AuthManager, ClientConfig, MemoryTokenStore, MultipartForm, NormalizedResponse, RefreshFn,
    RequestClient, RequestOptions, StoredSession,
};
use reqwest::Method;
use serde_json::{Value, json};

// =============================================================================
// TEST BACKEND
// =============================================================================

#[derive(Clone, Default)]
struct Hits {
    vehicles: Arc<AtomicUsize>,
    refresh: Arc<AtomicUsize>,
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "secret" {
        (StatusCode::OK, Json(json!({ "access_token": "tok1", "refresh_token": "r1", "user_id": 7 })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Invalid credentials" })))
    }
}

async fn refresh(State(hits): State<Hits>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    hits.refresh.fetch_add(1, Ordering::SeqCst);
    if body["refresh_token"] == "r1" {
        (StatusCode::OK, Json(json!({ "access_token": "tok2", "refresh_token": "r2" })))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Invalid refresh token" })))
    }
}

async fn vehicles(State(hits): State<Hits>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    hits.vehicles.fetch_add(1, Ordering::SeqCst);
    let authorized = headers.get(AUTHORIZATION).is_some_and(|v| v == "Bearer tok2");
    if authorized {
        (StatusCode::OK, Json(json!([{ "id": 1 }])))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Could not validate credentials" })))
    }
}

async fn upload(headers: HeaderMap, mut multipart: Multipart) -> Json<Value> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default().to_owned();
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(str::to_owned);
        let text = field.text().await.unwrap();
        fields.push(json!({ "name": name, "file_name": file_name, "text": text }));
    }
    Json(json!({ "content_type": content_type, "fields": fields }))
}

async fn raw_import(headers: HeaderMap, body: String) -> Json<Value> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default().to_owned();
    Json(json!({ "content_type": content_type, "body": body }))
}

async fn spawn_backend() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(|| async { Json(json!({ "detail": "Logged out" })) }))
        .route("/vehicles/", get(vehicles))
        .route("/loans/3", delete(|| async { StatusCode::NO_CONTENT }))
        .route("/broken", get(|| async { (StatusCode::BAD_GATEWAY, "<html>Bad Gateway</html>") }))
        .route("/finance/import/preview/1", post(upload))
        .route("/finance/import/raw", post(raw_import))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

fn client_for(base_url: &str) -> RequestClient {
    RequestClient::new(ClientConfig::new(base_url).unwrap()).unwrap()
}

fn static_refresh(token: Option<&'static str>) -> RefreshFn<impl Fn() -> std::future::Ready<Option<String>>> {
    RefreshFn(move || std::future::ready(token.map(str::to_owned)))
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn valid_credential_returns_parsed_list() {
    let (base, hits) = spawn_backend().await;
    let client = client_for(&base);
    client.auth().set_auth_context(Some(AuthContext::new(Some("tok2".into()), static_refresh(None))));

    let resp = client.request("/vehicles/", RequestOptions::get()).await;

    assert_eq!(resp, NormalizedResponse::new(200, Some(json!([{ "id": 1 }]))));
    assert_eq!(hits.vehicles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_retried() {
    let (base, hits) = spawn_backend().await;
    let session = StoredSession {
        access_token: Some("tok1".into()),
        refresh_token: Some("r1".into()),
        user_id: Some("7".into()),
    };
    let store = Arc::new(MemoryTokenStore::with_session(session));
    let manager = AuthManager::new(client_for(&base), store.clone());
    assert!(manager.restore().await.unwrap());

    let resp = manager.client().request("/vehicles/", RequestOptions::get()).await;

    assert_eq!(resp, NormalizedResponse::new(200, Some(json!([{ "id": 1 }]))));
    assert_eq!(hits.vehicles.load(Ordering::SeqCst), 2);
    assert_eq!(hits.refresh.load(Ordering::SeqCst), 1);
    assert_eq!(manager.client().auth().credential().as_deref(), Some("tok2"));
}

#[tokio::test]
async fn failed_refresh_reports_session_expired() {
    let (base, hits) = spawn_backend().await;
    let client = client_for(&base);
    client.auth().set_auth_context(Some(AuthContext::new(Some("tok1".into()), static_refresh(None))));

    let resp = client.request("/vehicles/", RequestOptions::get()).await;

    assert_eq!(resp, NormalizedResponse::session_expired());
    assert_eq!(hits.vehicles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn login_failure_is_returned_verbatim() {
    let (base, hits) = spawn_backend().await;
    let client = client_for(&base);
    client.auth().set_auth_context(Some(AuthContext::new(None, static_refresh(Some("tok2")))));

    let resp = client.login_user("a", "b").await;

    assert_eq!(resp, NormalizedResponse::new(401, Some(json!({ "detail": "Invalid credentials" }))));
    assert_eq!(hits.refresh.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn login_then_request_uses_issued_token() {
    let (base, hits) = spawn_backend().await;
    let manager = AuthManager::new(client_for(&base), Arc::new(MemoryTokenStore::new()));

    manager.login("alice", "secret").await.unwrap();
    let resp = manager.client().request("/vehicles/", RequestOptions::get()).await;

    assert!(resp.ok);
    assert_eq!(hits.refresh.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn multipart_upload_carries_boundary_content_type() {
    let (base, _) = spawn_backend().await;
    let client = client_for(&base);

    let form = MultipartForm::new()
        .text("account_id", "1")
        .file_with_mime("file", "march.csv", "text/csv", b"date;amount\n2024-03-01;-12.50\n".to_vec());
    let resp = client.request("/finance/import/preview/1", RequestOptions::multipart(Method::POST, form)).await;

    assert!(resp.ok, "{resp:?}");
    let data = resp.data.unwrap();
    assert!(data["content_type"].as_str().unwrap().starts_with("multipart/form-data; boundary="));
    assert_eq!(data["fields"][0], json!({ "name": "account_id", "file_name": null, "text": "1" }));
    assert_eq!(data["fields"][1]["file_name"], "march.csv");
    assert_eq!(data["fields"][1]["text"], "date;amount\n2024-03-01;-12.50\n");
}

#[tokio::test]
async fn text_body_is_sent_verbatim() {
    let (base, _) = spawn_backend().await;
    let options = RequestOptions::text(Method::POST, HeaderValue::from_static("text/csv"), "date;amount\n");

    let resp = client_for(&base).request("/finance/import/raw", options).await;

    assert_eq!(resp.data, Some(json!({ "content_type": "text/csv", "body": "date;amount\n" })));
}

#[tokio::test]
async fn no_content_yields_null_data() {
    let (base, _) = spawn_backend().await;
    let resp = client_for(&base).request("/loans/3", RequestOptions::delete()).await;
    assert_eq!(resp, NormalizedResponse::new(204, None));
}

#[tokio::test]
async fn non_json_error_body_yields_null_data() {
    let (base, _) = spawn_backend().await;
    let resp = client_for(&base).request("/broken", RequestOptions::get()).await;
    assert_eq!(resp, NormalizedResponse::new(502, None));
}

#[tokio::test]
async fn unreachable_server_resolves_to_status_zero() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let resp = client_for(&format!("http://{addr}")).request("/vehicles/", RequestOptions::get()).await;

    assert!(!resp.ok);
    assert_eq!(resp.status, 0);
    assert!(!resp.detail().unwrap().is_empty());
}
