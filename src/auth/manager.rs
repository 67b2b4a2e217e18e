//! Session lifecycle: login, refresh, logout and persistence.
//!
//! DESIGN
//! ======
//! `AuthManager` owns the token pair and keeps the client's [`AuthState`] in
//! sync with it. The refresh capability it installs holds only a weak
//! reference back to the manager, so the state never keeps it alive.
//!
//! Refreshes are single-flight: concurrent 401s queue on one lock, and a
//! caller that waited while another refresh ran takes that refresh's outcome
//! instead of spending the rotated refresh token a second time. A 401 that
//! arrives late, for a credential that has since been replaced, also reuses
//! the current credential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::Mutex;

use super::state::{AuthContext, AuthState, RefreshCredential};
use super::store::{StoredSession, TokenStore, TokenStoreError};
use crate::http::client::RequestClient;
use crate::http::response::NormalizedResponse;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server answered with a non-success status (0 when unreachable).
    #[error("{message}")]
    Rejected { status: u16, data: Option<Value>, message: String },

    /// A success payload lacked a required token field.
    #[error("malformed token payload: missing `{0}`")]
    MissingField(&'static str),

    #[error("token store failed: {0}")]
    Store(#[from] TokenStoreError),
}

impl AuthError {
    fn from_response(response: NormalizedResponse) -> Self {
        let message = match (response.status, response.detail()) {
            (0, Some(detail)) => format!("connection failed: {detail}"),
            (status, Some(detail)) => format!("request rejected ({status}): {detail}"),
            (status, None) => format!("request rejected ({status})"),
        };
        Self::Rejected { status: response.status, data: response.data, message }
    }
}

// =============================================================================
// MANAGER
// =============================================================================

pub struct AuthManager {
    client: RequestClient,
    store: Arc<dyn TokenStore>,
    refresh_lock: Mutex<()>,
    /// Bumped after every completed refresh attempt.
    refresh_generation: AtomicU64,
}

impl AuthManager {
    /// Create a manager for `client` and install its refresh capability into
    /// the client's [`AuthState`]. The credential starts empty; call
    /// [`AuthManager::restore`] or [`AuthManager::login`] to populate it.
    pub fn new(client: RequestClient, store: Arc<dyn TokenStore>) -> Arc<Self> {
        let manager = Arc::new(Self {
            client,
            store,
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        });
        manager.install(None);
        manager
    }

    #[must_use]
    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    fn auth(&self) -> &AuthState {
        self.client.auth()
    }

    fn install(self: &Arc<Self>, credential: Option<String>) {
        let refresh = ManagerRefresh { manager: Arc::downgrade(self) };
        self.auth().set_auth_context(Some(AuthContext::new(credential, refresh)));
    }

    /// Load a persisted session. Returns `true` when a complete session was
    /// found and its access token is now in use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn restore(&self) -> Result<bool, AuthError> {
        let session = self.store.load().await?;
        if !session.is_complete() {
            return Ok(false);
        }
        tracing::debug!(user_id = session.user_id.as_deref(), "restored stored session");
        self.auth().set_credential(session.access_token);
        Ok(true)
    }

    /// Log in with a login or email and a password, persisting the session.
    /// Returns the server's success payload.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] on a non-success response (status 0 for
    /// connection failures), or an error if the payload or store is unusable.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<Value, AuthError> {
        let response = self.client.login_user(identifier, password).await;
        if !response.ok {
            tracing::info!(status = response.status, "login rejected");
            return Err(AuthError::from_response(response));
        }

        let data = response.data.unwrap_or(Value::Null);
        let session = StoredSession {
            access_token: Some(required_str(&data, "access_token")?),
            refresh_token: Some(required_str(&data, "refresh_token")?),
            user_id: Some(required_id(&data, "user_id")?),
        };

        self.store.save(&session).await?;
        self.auth().set_credential(session.access_token);
        tracing::info!(user_id = session.user_id.as_deref(), "logged in");
        Ok(data)
    }

    /// Register a new account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Rejected`] on a non-success response.
    pub async fn register(&self, email: &str, login: &str, password: &str) -> Result<Value, AuthError> {
        let response = self.client.register_user(email, login, password).await;
        if !response.ok {
            return Err(AuthError::from_response(response));
        }
        Ok(response.data.unwrap_or(Value::Null))
    }

    /// Obtain a new access token, coalescing with any refresh already in flight.
    /// Any failure logs the session out and yields `None`.
    pub async fn refresh(&self) -> Option<String> {
        let current = self.auth().credential();
        self.refresh_rejected(current.as_deref()).await
    }

    /// Renew after the server refused `rejected`. When the current credential
    /// already differs from it, a refresh has happened since that request was
    /// sent and the current credential is returned as-is.
    pub async fn refresh_rejected(&self, rejected: Option<&str>) -> Option<String> {
        let observed = self.refresh_generation.load(Ordering::SeqCst);
        let _guard = self.refresh_lock.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != observed {
            tracing::debug!("joined a refresh that finished while waiting");
            return self.auth().credential();
        }

        let current = self.auth().credential();
        if current.is_some() && current.as_deref() != rejected {
            tracing::debug!("credential was renewed after the rejected request");
            return current;
        }

        let outcome = self.refresh_exclusive().await;
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn refresh_exclusive(&self) -> Option<String> {
        let session = match self.store.load().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "could not read session for refresh");
                StoredSession::default()
            }
        };

        let Some(refresh_token) = session.refresh_token.clone() else {
            tracing::info!("no refresh token stored; logging out");
            self.logout_quietly().await;
            return None;
        };

        let response = self.client.refresh_token(&refresh_token).await;
        if !response.ok {
            tracing::warn!(status = response.status, "refresh token rejected; logging out");
            self.logout_quietly().await;
            return None;
        }

        let data = response.data.unwrap_or(Value::Null);
        let (Ok(access_token), Ok(refresh_token)) =
            (required_str(&data, "access_token"), required_str(&data, "refresh_token"))
        else {
            tracing::warn!("refresh response missing tokens; logging out");
            self.logout_quietly().await;
            return None;
        };

        let renewed = StoredSession {
            access_token: Some(access_token.clone()),
            refresh_token: Some(refresh_token),
            user_id: session.user_id,
        };
        if let Err(e) = self.store.save(&renewed).await {
            tracing::warn!(error = %e, "could not persist refreshed session");
        }
        self.auth().set_credential(Some(access_token.clone()));
        tracing::info!("access token refreshed");
        Some(access_token)
    }

    /// End the session: drop local credentials, then revoke the refresh token
    /// server-side on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared. The in-memory
    /// credential is cleared regardless.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let refresh_token = match self.store.load().await {
            Ok(session) => session.refresh_token,
            Err(e) => {
                tracing::warn!(error = %e, "could not read session during logout");
                None
            }
        };

        self.auth().set_credential(None);
        let cleared = self.store.clear().await;

        if let Some(refresh_token) = refresh_token {
            // Detached so a 401 here cannot re-enter refresh while its lock is held.
            let response = self.client.detached().logout(&refresh_token).await;
            if !response.ok {
                tracing::warn!(status = response.status, detail = response.detail(), "server-side logout failed");
            }
        }

        tracing::info!("logged out");
        cleared.map_err(AuthError::from)
    }

    async fn logout_quietly(&self) {
        if let Err(e) = self.logout().await {
            tracing::warn!(error = %e, "logout after failed refresh was incomplete");
        }
    }
}

// =============================================================================
// REFRESH CAPABILITY
// =============================================================================

struct ManagerRefresh {
    manager: Weak<AuthManager>,
}

#[async_trait::async_trait]
impl RefreshCredential for ManagerRefresh {
    async fn refresh(&self) -> Option<String> {
        let manager = self.manager.upgrade()?;
        manager.refresh().await
    }

    async fn refresh_rejected(&self, rejected: Option<&str>) -> Option<String> {
        let manager = self.manager.upgrade()?;
        manager.refresh_rejected(rejected).await
    }
}

// =============================================================================
// PAYLOAD HELPERS
// =============================================================================

fn required_str(data: &Value, field: &'static str) -> Result<String, AuthError> {
    data.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or(AuthError::MissingField(field))
}

/// User ids arrive as numbers or strings depending on the backend version.
fn required_id(data: &Value, field: &'static str) -> Result<String, AuthError> {
    match data.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(AuthError::MissingField(field)),
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
