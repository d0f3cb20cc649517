//! Client configuration loader for wschat.
//!
//! Reads `config.toml` (by default `<config_dir>/wschat/config.toml`) into
//! [`ClientConfig`]. Falls back to defaults when the file is missing or
//! malformed, so a broken config never keeps the client from starting.

use std::path::{Path, PathBuf};

use wschat_types::config::ClientConfig;
use wschat_types::protocol::Dialect;

/// Smallest usable send-queue depth.
const MIN_CHANNEL_CAPACITY: usize = 1;

/// `<config_dir>/wschat/config.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("wschat").join("config.toml"))
}

/// Load client configuration from `path`.
///
/// - If the file does not exist, returns [`ClientConfig::default()`].
/// - If the file cannot be read or parsed, logs a warning and returns the default.
pub async fn load_client_config(path: &Path) -> ClientConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return ClientConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ClientConfig::default();
        }
    };

    match toml::from_str::<ClientConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ClientConfig::default()
        }
    }
}

/// Resolve the dialect: command line first, then the config file.
pub fn resolve_dialect(config: &ClientConfig, cli_dialect: Option<Dialect>) -> Dialect {
    cli_dialect.unwrap_or(config.dialect)
}

/// Resolve the endpoint URL.
///
/// Priority:
/// 1. `--url` flag or `WSCHAT_URL`
/// 2. `url` from `config.toml`
/// 3. The dialect's default endpoint
pub fn resolve_url(config: &ClientConfig, dialect: Dialect, cli_url: Option<&str>) -> String {
    cli_url
        .map(str::to_string)
        .or_else(|| config.url.clone())
        .unwrap_or_else(|| dialect.default_url().to_string())
}

/// Resolve the send-queue depth, enforcing a floor of one slot.
pub fn resolve_channel_capacity(config: &ClientConfig) -> usize {
    config.channel_capacity.max(MIN_CHANNEL_CAPACITY)
}
