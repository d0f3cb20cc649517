//! Chat endpoint: the WebSocket URL plus the optional bearer token sent as
//! the `Authorization` header at connect time.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::ConnectionError;

/// Query parameter carrying the addressee for the `addressed` dialect.
pub const ADDRESSEE_QUERY_KEY: &str = "addressee_nickname";

/// Where and how to connect.
pub struct Endpoint {
    url: Url,
    token: Option<SecretString>,
}

impl Endpoint {
    /// Parse a `ws://` or `wss://` URL.
    pub fn parse(url: &str) -> Result<Self, ConnectionError> {
        let url = Url::parse(url)
            .map_err(|e| ConnectionError::InvalidEndpoint(format!("'{url}': {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(ConnectionError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}' (expected ws or wss)"
                )));
            }
        }

        if url.host_str().is_none() {
            return Err(ConnectionError::InvalidEndpoint(format!("'{url}' has no host")));
        }

        Ok(Self { url, token: None })
    }

    /// Append `?addressee_nickname=<name>` (URL-escaped).
    pub fn with_addressee(mut self, addressee: &str) -> Self {
        self.url
            .query_pairs_mut()
            .append_pair(ADDRESSEE_QUERY_KEY, addressee);
        self
    }

    /// Attach a bearer token. A pasted `Bearer ` prefix is dropped; blank
    /// tokens are ignored.
    pub fn with_token(mut self, token: &str) -> Self {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if !token.is_empty() {
            self.token = Some(SecretString::from(token.to_string()));
        }
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Value for the `Authorization` header, if a token is attached.
    pub fn authorization(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|token| format!("Bearer {}", token.expose_secret()))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
