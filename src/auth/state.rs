//! Shared credential holder consulted by the request layer.
//!
//! SYSTEM CONTEXT
//! ==============
//! The auth manager (or any other auth provider) writes the current
//! credential and refresh capability here; [`crate::RequestClient`] only
//! reads it, once before the first send and again through the refresh
//! result before the retry. Each client owns its own `AuthState`, so two
//! clients never see each other's tokens unless handed the same state.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

// =============================================================================
// REFRESH CAPABILITY
// =============================================================================

/// Asynchronously obtains a fresh access credential.
#[async_trait::async_trait]
pub trait RefreshCredential: Send + Sync {
    /// Returns the new credential, or `None` if the session cannot be renewed.
    async fn refresh(&self) -> Option<String>;

    /// Like [`RefreshCredential::refresh`], given the credential the server
    /// just rejected. Providers that track the current credential can hand
    /// back a newer one instead of refreshing again.
    async fn refresh_rejected(&self, _rejected: Option<&str>) -> Option<String> {
        self.refresh().await
    }
}

/// Adapts an async closure into a [`RefreshCredential`].
pub struct RefreshFn<F>(pub F);

#[async_trait::async_trait]
impl<F, Fut> RefreshCredential for RefreshFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    async fn refresh(&self) -> Option<String> {
        (self.0)().await
    }
}

// =============================================================================
// AUTH CONTEXT
// =============================================================================

/// The `{ credential, refresh }` pair installed by an auth provider.
#[derive(Clone)]
pub struct AuthContext {
    pub credential: Option<String>,
    pub refresh: Arc<dyn RefreshCredential>,
}

impl AuthContext {
    pub fn new(credential: Option<String>, refresh: impl RefreshCredential + 'static) -> Self {
        Self { credential, refresh: Arc::new(refresh) }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// AUTH STATE
// =============================================================================

#[derive(Clone, Default)]
pub struct AuthState {
    inner: Arc<RwLock<Option<AuthContext>>>,
}

impl AuthState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current context. `None` means unauthenticated.
    pub fn set_auth_context(&self, context: Option<AuthContext>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = context;
    }

    /// Swap the credential while keeping the installed refresh capability.
    /// Does nothing when no context is installed.
    pub fn set_credential(&self, credential: Option<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(context) = guard.as_mut() {
            context.credential = credential;
        }
    }

    /// The context as of now.
    #[must_use]
    pub fn snapshot(&self) -> Option<AuthContext> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn credential(&self) -> Option<String> {
        self.snapshot().and_then(|context| context.credential)
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState").field("context", &self.snapshot()).finish()
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
