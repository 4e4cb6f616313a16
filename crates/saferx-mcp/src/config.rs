//! Process-wide adapter configuration.
//!
//! Read once at startup (see `main.rs`) and passed explicitly to the HTTP client, so nothing
//! below this module touches the environment.

use crate::error::{AdapterError, Result};
use url::Url;

/// Production SafeRx endpoint.
pub const DEFAULT_BASE_URL: &str = "https://saferx.online";

/// Static `User-Agent` sent on every backend request.
pub const USER_AGENT: &str = "SafeRx-MCP-Server/1.0";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-SafeRx-API-Key";

/// Where operators can obtain a key; included in the startup diagnostic.
pub const FREE_KEY_HINT: &str =
    "Get a free key: POST https://saferx.online/api/developers/keys/free";

/// MCP server identity reported in `initialize`.
pub const SERVER_NAME: &str = "saferx";
pub const SERVER_VERSION: &str = "1.0.0";

#[derive(Clone)]
pub struct AdapterConfig {
    api_key: String,
    base_url: String,
}

impl AdapterConfig {
    /// Build a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] if the API key is missing or blank, or if `base_url`
    /// is not an absolute URL.
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AdapterError::Config(format!("SAFERX_API_KEY is required. {FREE_KEY_HINT}"))
            })?;

        let raw = base_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&raw).map_err(|e| {
            AdapterError::Config(format!("Invalid SAFERX_BASE_URL '{raw}': {e}"))
        })?;
        let base_url = raw.trim_end_matches('/').to_string();

        Ok(Self { api_key, base_url })
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/api/drug_safety/check`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
