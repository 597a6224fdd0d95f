//! Error taxonomy for the OAuth token lifecycle and sync pipeline.
//!
//! Display strings on `AuthError` and `SyncError` are user-facing: the HTTP
//! layer forwards them verbatim as the `message` parameter of the redirect
//! outcome, so they must stay free of internal detail. Sources carry the
//! internal cause for logging.

use thiserror::Error;

/// Failures in token encryption and decryption.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption key must be 32 bytes (256 bits), base64-encoded: {0}")]
    InvalidKey(String),

    #[error("malformed token envelope")]
    MalformedEnvelope,

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed (wrong key or corrupted data)")]
    Decryption,

    #[error("decrypted token is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failures in the token record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no token record for user")]
    NotFound,

    #[error("token storage failed")]
    Database(#[from] rusqlite::Error),
}

/// Failures at the provider's token endpoint.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("token endpoint request failed")]
    Request(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Failures at the provider's data API.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("data API request failed")]
    Request(#[from] reqwest::Error),

    #[error("data API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// OAuth flow failures, surfaced to the HTTP layer as redirect messages.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authorization failed: No code provided.")]
    MissingCode,

    #[error("Authorization failed: Invalid state parameter.")]
    StateMismatch,

    #[error("Authorization failed: Unable to exchange tokens.")]
    TokenExchange(#[source] ExchangeError),

    #[error("Unauthorized. Please log in.")]
    Unauthorized,

    #[error("No accounting connection found. Please reconnect.")]
    NotFound,

    #[error("Token refresh failed. Please reconnect your accounting account.")]
    RefreshFailed(#[source] Box<AuthError>),

    #[error("Stored tokens are unreadable. Please reconnect your accounting account.")]
    Decryption(#[from] CipherError),

    #[error("Token storage failed. Please try again later.")]
    Persistence(#[source] rusqlite::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Database(e) => AuthError::Persistence(e),
        }
    }
}

/// Sync pipeline failures.
///
/// Persistence failures propagate here so the caller knows when fetched data
/// did not land (the original implementation swallowed them).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Error syncing data. Please try again later.")]
    Upstream(#[source] UpstreamError),

    #[error("Error syncing data: records could not be saved.")]
    Persistence(#[source] rusqlite::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
