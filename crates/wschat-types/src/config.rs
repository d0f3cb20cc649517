//! Client configuration types for wschat.
//!
//! `ClientConfig` represents the optional `config.toml` that sets the default
//! endpoint, dialect, and send-queue depth.

use serde::{Deserialize, Serialize};

use crate::protocol::Dialect;

/// Top-level client configuration.
///
/// Loaded from `<config_dir>/wschat/config.toml`. All fields have defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint URL. Falls back to the dialect's default URL when unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Wire schema spoken by the session.
    #[serde(default)]
    pub dialect: Dialect,

    /// Capacity of the queue between the input reader and the sender.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    32
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            dialect: Dialect::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}
