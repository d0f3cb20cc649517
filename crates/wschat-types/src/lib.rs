//! Shared domain types for wschat.
//!
//! This crate contains the wire protocol (outbound message shapes and the
//! dialects that produce them), the connection endpoint, session lifecycle
//! types, client configuration, and their associated error types.
//!
//! Zero I/O dependencies -- only serde, url, secrecy, thiserror.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod session;
