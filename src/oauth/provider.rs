//! Accounting-platform OAuth provider configuration.

use serde::{Deserialize, Serialize};

/// OAuth provider configuration for the accounting platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token exchange endpoint URL (both grants)
    pub token_url: String,

    /// Requested OAuth scope
    pub scope: String,

    /// Redirect URI registered with the provider
    pub redirect_uri: String,

    /// Client ID (from environment variable)
    pub client_id: String,

    /// Client secret (from environment variable)
    pub client_secret: String,
}

impl ProviderConfig {
    /// Build the authorization URL embedding client id, scope, redirect URI,
    /// and the anti-CSRF state token.
    pub fn build_auth_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.scope),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }
}
