//! Authenticated request client with a single reactive token refresh.
//!
//! DESIGN
//! ======
//! One logical call walks a small state machine:
//!
//! ```text
//! Sent -> Done                                  (anything but an eligible 401)
//! Sent -> Refreshing -> Done                    (refresh produced no credential)
//! Sent -> Refreshing -> Retried -> Done         (resent once with the new credential)
//! ```
//!
//! `Retried` always moves to `Done`, so a retried 401 can never trigger a
//! second refresh.
//!
//! ERROR HANDLING
//! ==============
//! [`RequestClient::request`] never fails. Transport errors become status 0,
//! unparsable bodies become `data: None`, server errors pass through as-is.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use super::body::{MultipartForm, RequestBody};
use super::response::NormalizedResponse;
use super::transport::{OutgoingRequest, ReqwestTransport, Transport, TransportError};
use crate::auth::state::{AuthState, RefreshCredential};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Endpoints whose own 401 must never trigger a refresh, matched by prefix.
pub const AUTH_EXEMPT_PREFIXES: [&str; 3] = ["/auth/login", "/auth/register", "/auth/refresh"];

#[must_use]
pub fn is_auth_exempt(endpoint: &str) -> bool {
    AUTH_EXEMPT_PREFIXES.iter().any(|prefix| endpoint.starts_with(prefix))
}

// =============================================================================
// OPTIONS
// =============================================================================

/// Caller-supplied method, headers and body.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { method: Method::GET, headers: HeaderMap::new(), body: RequestBody::Empty }
    }
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn post() -> Self {
        Self::default().with_method(Method::POST)
    }

    #[must_use]
    pub fn delete() -> Self {
        Self::default().with_method(Method::DELETE)
    }

    /// `method` with a JSON body serialized from `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn json<T: serde::Serialize + ?Sized>(method: Method, value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::default().with_method(method).with_body(RequestBody::json(value)?))
    }

    /// `method` with `text` sent verbatim under `content_type`.
    #[must_use]
    pub fn text(method: Method, content_type: HeaderValue, text: impl Into<String>) -> Self {
        Self::default()
            .with_method(method)
            .with_header(CONTENT_TYPE, content_type)
            .with_body(RequestBody::Text(text.into()))
    }

    #[must_use]
    pub fn multipart(method: Method, form: MultipartForm) -> Self {
        Self::default().with_method(method).with_body(RequestBody::Multipart(form))
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Cheap to clone; clones share configuration, transport and [`AuthState`].
#[derive(Clone)]
pub struct RequestClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    auth: AuthState,
}

/// Where a single logical call currently stands.
enum Phase {
    /// The first attempt has been answered.
    Sent { response: NormalizedResponse, refresh: Option<Arc<dyn RefreshCredential>> },
    /// Waiting on the refresh capability after an eligible 401.
    Refreshing(Arc<dyn RefreshCredential>),
    /// The one resend, carrying the refreshed credential.
    Retried(String),
    Done(NormalizedResponse),
}

impl RequestClient {
    /// Client over the real network with a fresh, empty [`AuthState`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(config.timeouts)?;
        Ok(Self::with_transport(config, Arc::new(transport), AuthState::new()))
    }

    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>, auth: AuthState) -> Self {
        Self { inner: Arc::new(Inner { config, transport, auth }) }
    }

    /// A client on the same transport and config but with its own empty
    /// [`AuthState`], so nothing it sends can trigger a refresh.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self::with_transport(self.inner.config.clone(), Arc::clone(&self.inner.transport), AuthState::new())
    }

    #[must_use]
    pub fn auth(&self) -> &AuthState {
        &self.inner.auth
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Perform one logical call against `endpoint` (e.g. `/vehicles/`).
    ///
    /// Always resolves to a [`NormalizedResponse`]; see the module docs.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> NormalizedResponse {
        let context = self.inner.auth.snapshot();
        let credential = context.as_ref().and_then(|c| c.credential.clone());

        let mut phase = match self.attempt(endpoint, &options, credential.as_deref()).await {
            Ok(response) => Phase::Sent { response, refresh: context.map(|c| c.refresh) },
            Err(e) => Phase::Done(transport_failure(endpoint, &e)),
        };

        loop {
            phase = match phase {
                Phase::Sent { response, refresh } => after_first_attempt(endpoint, response, refresh),
                Phase::Refreshing(refresh) => {
                    tracing::info!(endpoint, "access token rejected; refreshing");
                    match refresh.refresh_rejected(credential.as_deref()).await {
                        Some(credential) => Phase::Retried(credential),
                        None => {
                            tracing::warn!(endpoint, "token refresh failed; session expired");
                            Phase::Done(NormalizedResponse::session_expired())
                        }
                    }
                }
                Phase::Retried(credential) => match self.attempt(endpoint, &options, Some(&credential)).await {
                    Ok(response) => {
                        tracing::info!(endpoint, status = response.status, "retried after refresh");
                        Phase::Done(response)
                    }
                    Err(e) => Phase::Done(transport_failure(endpoint, &e)),
                },
                Phase::Done(response) => return response,
            };
        }
    }

    async fn attempt(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        credential: Option<&str>,
    ) -> Result<NormalizedResponse, TransportError> {
        let request = OutgoingRequest {
            method: options.method.clone(),
            url: self.inner.config.url_for(endpoint),
            headers: build_headers(&options.headers, &options.body, credential)?,
            body: options.body.clone(),
        };

        tracing::debug!(method = %request.method, endpoint, authenticated = credential.is_some(), "sending request");
        let raw = self.inner.transport.send(request).await?;
        let response = NormalizedResponse::from_raw(&raw);
        tracing::debug!(endpoint, status = response.status, "request finished");
        Ok(response)
    }
}

fn transport_failure(endpoint: &str, error: &TransportError) -> NormalizedResponse {
    tracing::warn!(endpoint, error = %error, "request failed without a response");
    NormalizedResponse::transport_failure(error)
}

/// Decide what follows the first answered attempt.
fn after_first_attempt(
    endpoint: &str,
    response: NormalizedResponse,
    refresh: Option<Arc<dyn RefreshCredential>>,
) -> Phase {
    match refresh {
        Some(refresh) if response.status == 401 && !is_auth_exempt(endpoint) => Phase::Refreshing(refresh),
        _ => Phase::Done(response),
    }
}

/// Caller headers plus the JSON content type (unless multipart or already set)
/// and the bearer credential.
pub(crate) fn build_headers(
    caller: &HeaderMap,
    body: &RequestBody,
    credential: Option<&str>,
) -> Result<HeaderMap, TransportError> {
    let mut headers = caller.clone();

    if body.is_multipart() {
        headers.remove(CONTENT_TYPE);
    } else if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    if let Some(credential) = credential {
        let mut value = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| TransportError::InvalidRequest("credential is not a valid header value".into()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
