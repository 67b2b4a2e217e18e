//! Credential state and the session lifecycle around it.
//!
//! SYSTEM CONTEXT
//! ==============
//! `state` is what the request layer reads, `manager` is the provider that
//! writes it, and `store` persists the session between runs.

pub mod manager;
pub mod state;
pub mod store;
