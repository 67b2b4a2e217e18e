//! The uniform `{ok, status, data}` result of every request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::transport::{RawResponse, TransportError};

/// Message placed in `data.detail` when a 401 could not be recovered by refreshing.
pub const SESSION_EXPIRED_DETAIL: &str = "Your session has expired. Please log in again.";

/// Status used when no HTTP response was received at all.
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    /// `true` iff `status` is in `200..=299`.
    pub ok: bool,
    pub status: u16,
    /// Parsed JSON body; `None` when the body was empty or not JSON.
    pub data: Option<Value>,
}

impl NormalizedResponse {
    #[must_use]
    pub fn new(status: u16, data: Option<Value>) -> Self {
        Self { ok: is_success(status), status, data }
    }

    /// Normalize a raw response, parsing the body leniently.
    #[must_use]
    pub fn from_raw(raw: &RawResponse) -> Self {
        Self::new(raw.status, parse_body(&raw.body).ok())
    }

    /// Failure result for a 401 whose refresh produced no credential.
    #[must_use]
    pub fn session_expired() -> Self {
        Self::new(401, Some(serde_json::json!({ "detail": SESSION_EXPIRED_DETAIL })))
    }

    /// Failure result for a request that never got a response.
    #[must_use]
    pub fn transport_failure(error: &TransportError) -> Self {
        let mut detail = error.to_string();
        if detail.is_empty() {
            detail = "network request failed".to_owned();
        }
        Self::new(TRANSPORT_FAILURE_STATUS, Some(serde_json::json!({ "detail": detail })))
    }

    /// The `detail` string of an error payload, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.data.as_ref()?.get("detail")?.as_str()
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Parse a body as JSON. Empty and malformed bodies both come back as `Err`.
pub(crate) fn parse_body(body: &[u8]) -> Result<Value, serde_json::Error> {
    serde_json::from_slice(body)
}

#[cfg(test)]
#[path = "response_test.rs"]
mod tests;
