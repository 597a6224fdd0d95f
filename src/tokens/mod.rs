//! Per-user OAuth token records.
//!
//! One record per user, holding the encrypted access and refresh token
//! envelopes plus expiry and last-refresh timestamps. The store never
//! decrypts: envelopes are opaque strings produced by
//! [`crate::crypto::TokenCipher`], and decryption happens in the OAuth flow.

use chrono::{DateTime, Utc};
use serde::Serialize;

mod store;

pub use store::TokenStore;

/// A user's stored token record, as persisted.
///
/// Both token fields are encrypted envelopes, never plaintext.
#[derive(Clone, Debug)]
pub struct TokenRecord {
    /// Encrypted access token envelope
    pub access_token: String,

    /// Encrypted refresh token envelope
    pub refresh_token: String,

    /// When the access token expires (UTC)
    pub token_expiry: DateTime<Utc>,

    /// When the tokens were last obtained or refreshed (UTC)
    pub last_refresh: DateTime<Utc>,
}

/// Connection status for the account display.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ConnectionStatus {
    /// Whether a token record exists for the user
    pub connected: bool,

    /// Last successful token acquisition or refresh, if connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
}
