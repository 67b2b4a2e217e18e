//! Named wrappers for the health and auth endpoints.
//!
//! Domain calls (finance, loans, meals, vehicles) go straight through
//! [`RequestClient::request`]; only the endpoints the session lifecycle
//! depends on get a dedicated helper here.

use serde_json::json;

use super::body::RequestBody;
use super::client::{RequestClient, RequestOptions};
use super::response::NormalizedResponse;

pub const HEALTH_ENDPOINT: &str = "/health";
pub const REGISTER_ENDPOINT: &str = "/auth/register";
pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";

fn post_json(value: &serde_json::Value) -> RequestOptions {
    RequestOptions::post().with_body(RequestBody::from_value(value))
}

impl RequestClient {
    /// `GET /health`.
    pub async fn health_check(&self) -> NormalizedResponse {
        self.request(HEALTH_ENDPOINT, RequestOptions::get()).await
    }

    /// `POST /auth/register` with `{email, login, password}`.
    pub async fn register_user(&self, email: &str, login: &str, password: &str) -> NormalizedResponse {
        let payload = json!({ "email": email, "login": login, "password": password });
        self.request(REGISTER_ENDPOINT, post_json(&payload)).await
    }

    /// `POST /auth/login` with `{identifier, password}`; `identifier` is a login or an email.
    pub async fn login_user(&self, identifier: &str, password: &str) -> NormalizedResponse {
        let payload = json!({ "identifier": identifier, "password": password });
        self.request(LOGIN_ENDPOINT, post_json(&payload)).await
    }

    /// `POST /auth/logout`, revoking `refresh_token` server-side.
    pub async fn logout(&self, refresh_token: &str) -> NormalizedResponse {
        self.request(LOGOUT_ENDPOINT, post_json(&json!({ "refresh_token": refresh_token }))).await
    }

    /// `POST /auth/refresh`, exchanging `refresh_token` for a new token pair.
    pub async fn refresh_token(&self, refresh_token: &str) -> NormalizedResponse {
        self.request(REFRESH_ENDPOINT, post_json(&json!({ "refresh_token": refresh_token }))).await
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
