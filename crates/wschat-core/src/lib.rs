//! Chat session logic and port trait definitions for wschat.
//!
//! This crate defines the "ports" (connection, line input, and output traits)
//! that the infrastructure and CLI layers implement, plus the session that
//! drives them. It depends only on `wschat-types` -- never on
//! `wschat-infra` or any network crate.

pub mod compose;
pub mod connection;
pub mod session;
