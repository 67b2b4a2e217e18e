//! HTTP request layer.
//!
//! SYSTEM CONTEXT
//! ==============
//! `client` runs the send → refresh → retry flow, `transport` is the network
//! seam, `body` and `response` define what goes in and what comes out, and
//! `api` holds the named auth/health wrappers.

pub mod api;
pub mod body;
pub mod client;
pub mod response;
pub mod transport;
