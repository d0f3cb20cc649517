//! Infrastructure implementations for wschat.
//!
//! Implements the connection ports defined in `wschat-core` over
//! tokio-tungstenite, and loads the optional `config.toml`.

pub mod config;
pub mod connection;
