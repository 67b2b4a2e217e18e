//! Authenticated REST client for the household-management backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every backend call (finance, loans, meals, vehicles) funnels through
//! [`RequestClient::request`]. It attaches the bearer credential held in the
//! client's [`AuthState`], refreshes it once when the server answers 401, and
//! folds every outcome, including network failures, into a
//! [`NormalizedResponse`].

pub mod auth;
pub mod config;
pub mod error;
pub mod http;

pub use auth::manager::{AuthError, AuthManager};
pub use auth::state::{AuthContext, AuthState, RefreshCredential, RefreshFn};
pub use auth::store::{FileTokenStore, MemoryTokenStore, StoredSession, TokenStore, TokenStoreError};
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::body::{FormPart, MultipartForm, RequestBody};
pub use http::client::{RequestClient, RequestOptions, is_auth_exempt};
pub use http::response::NormalizedResponse;
pub use http::transport::{ReqwestTransport, Transport, TransportError};
