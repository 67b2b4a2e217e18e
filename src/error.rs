//! Construction-time errors.
//!
//! Only building a client can fail. Once a [`crate::RequestClient`] exists,
//! every call resolves to a [`crate::NormalizedResponse`] instead.

/// Errors raised while configuring or constructing a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The base URL is not an absolute `http(s)://` URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}
