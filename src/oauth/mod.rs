//! OAuth 2.0 authorization flow for the accounting platform.
//!
//! Implements the authorization code flow:
//! 1. User clicks "Connect" on the account page
//! 2. GET /auth → Redirect to provider with a fresh state token
//! 3. User authorizes on the provider's site
//! 4. Provider redirects to GET /callback with code + state
//! 5. Validate state, exchange code for tokens, store encrypted record
//! 6. GET /refresh-token rotates the pair; any refresh failure deletes the
//!    record so the next use forces re-authorization

mod exchange;
mod provider;
mod state;

pub use provider::ProviderConfig;
pub use state::{run_state_cleanup, PendingAuthorizations};

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::crypto::TokenCipher;
use crate::error::AuthError;
use crate::tokens::{ConnectionStatus, TokenRecord, TokenStore};

use self::exchange::TokenGrant;

/// Refresh when the stored expiry is within this many seconds.
const REFRESH_MARGIN_SECONDS: i64 = 90;

/// Drives the three-legged OAuth2 exchange and the token lifecycle.
pub struct OAuthFlow {
    provider: ProviderConfig,
    cipher: TokenCipher,
    store: Arc<TokenStore>,
    pending: PendingAuthorizations,
    http: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(
        provider: ProviderConfig,
        cipher: TokenCipher,
        store: Arc<TokenStore>,
        pending: PendingAuthorizations,
    ) -> Self {
        Self {
            provider,
            cipher,
            store,
            pending,
            http: reqwest::Client::new(),
        }
    }

    /// Starts an authorization attempt for `user_id`.
    ///
    /// Issues a fresh state token keyed to the user and returns the
    /// provider's authorization URL to redirect the browser to.
    pub fn begin_authorization(&self, user_id: &str) -> String {
        let state = self.pending.issue(user_id);
        let auth_url = self.provider.build_auth_url(&state);

        info!(user_id = %user_id, "Redirecting to authorization URL");

        auth_url
    }

    /// Handles the provider callback: validates code and state, exchanges
    /// the code for tokens, and stores the encrypted record.
    pub async fn handle_callback(
        &self,
        user_id: &str,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<(), AuthError> {
        let code = code.ok_or(AuthError::MissingCode)?;
        let state = state.ok_or(AuthError::StateMismatch)?;

        // Single-use: a replayed or foreign state token fails here
        let entry = self
            .pending
            .validate_and_consume(state)
            .ok_or(AuthError::StateMismatch)?;

        if entry.user_id != user_id {
            warn!(
                user_id = %user_id,
                initiating_user = %entry.user_id,
                "State token belongs to a different user"
            );
            return Err(AuthError::StateMismatch);
        }

        debug!(user_id = %user_id, "State validated, exchanging authorization code");

        let grant = exchange::exchange_code(&self.http, &self.provider, code)
            .await
            .map_err(|e| {
                error!(user_id = %user_id, error = %e, "Token exchange failed");
                AuthError::TokenExchange(e)
            })?;

        self.store_grant(user_id, grant)?;

        info!(user_id = %user_id, "Authorization completed, tokens stored");

        Ok(())
    }

    /// Refreshes the stored token pair for `user_id`.
    ///
    /// On ANY failure during the exchange or update step the user's record
    /// is deleted entirely, forcing a fresh authorization on next use: a
    /// stale or revoked refresh token is assumed permanently unusable.
    pub async fn refresh(&self, user_id: &str) -> Result<(), AuthError> {
        let envelope = self.store.get_refresh_token(user_id)?;

        match self.refresh_with_envelope(user_id, &envelope).await {
            Ok(()) => {
                info!(user_id = %user_id, "Tokens refreshed");
                Ok(())
            }
            Err(cause) => {
                error!(user_id = %user_id, error = %cause, "Token refresh failed, deleting record");
                if let Err(delete_err) = self.store.delete(user_id) {
                    error!(
                        user_id = %user_id,
                        error = %AuthError::from(delete_err),
                        "Failed to delete token record after refresh failure"
                    );
                }
                Err(AuthError::RefreshFailed(Box::new(cause)))
            }
        }
    }

    /// Returns a decrypted access token, refreshing first when the stored
    /// expiry is within the safety margin.
    pub async fn valid_access_token(&self, user_id: &str) -> Result<String, AuthError> {
        let expiry = self.store.get_expiry(user_id)?;

        if expiry <= Utc::now() + Duration::seconds(REFRESH_MARGIN_SECONDS) {
            debug!(user_id = %user_id, "Access token near expiry, refreshing");
            self.refresh(user_id).await?;
        }

        let envelope = self.store.get_access_token(user_id)?;
        Ok(self.cipher.decrypt(&envelope)?)
    }

    /// Connection status for the account display.
    pub fn status(&self, user_id: &str) -> Result<ConnectionStatus, AuthError> {
        Ok(self.store.status(user_id)?)
    }

    async fn refresh_with_envelope(
        &self,
        user_id: &str,
        envelope: &str,
    ) -> Result<(), AuthError> {
        let refresh_token = self.cipher.decrypt(envelope)?;

        let grant = exchange::exchange_refresh(&self.http, &self.provider, &refresh_token)
            .await
            .map_err(AuthError::TokenExchange)?;

        self.store_grant(user_id, grant)
    }

    fn store_grant(&self, user_id: &str, grant: TokenGrant) -> Result<(), AuthError> {
        let record = TokenRecord {
            access_token: self.cipher.encrypt(&grant.access_token)?,
            refresh_token: self.cipher.encrypt(&grant.refresh_token)?,
            token_expiry: grant.expires_at,
            last_refresh: Utc::now(),
        };

        self.store.upsert(user_id, &record)?;
        Ok(())
    }
}
