//! HTTP surface for the OAuth flow and sync pipeline.
//!
//! Every operation reports its result through the redirect-outcome protocol
//! the account page depends on: a redirect to
//! `/account?message=…&status=success|error` with a human-readable message.
//! User identity arrives in the `x-user-id` header, installed by the
//! fronting session layer; it is trusted here, not re-validated.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Json, Redirect},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::AuthError;
use crate::oauth::OAuthFlow;
use crate::sync::LedgerSyncPipeline;
use crate::tokens::ConnectionStatus;

/// Header carrying the session user id from the fronting layer.
const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub oauth: Arc<OAuthFlow>,
    pub sync: Arc<LedgerSyncPipeline>,
}

/// Provider callback query parameters
#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/auth", get(begin_auth))
        .route("/callback", get(callback))
        .route("/refresh-token", get(refresh_token))
        .route("/syncdata", get(sync_data))
        .route("/status", get(connection_status))
        .with_state(Arc::new(state))
}

/// Redirect outcome consumed by the account page.
fn outcome(status: &str, message: &str) -> Redirect {
    Redirect::to(&format!(
        "/account?message={}&status={}",
        urlencoding::encode(message),
        status
    ))
}

fn success(message: &str) -> Redirect {
    outcome("success", message)
}

fn failure(err: &impl Display) -> Redirect {
    outcome("error", &err.to_string())
}

fn user_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

/// GET /auth - start an authorization attempt
///
/// Redirects the browser to the provider's authorization page.
async fn begin_auth(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    let Some(user_id) = user_from_headers(&headers) else {
        return failure(&AuthError::Unauthorized);
    };

    let auth_url = state.oauth.begin_authorization(&user_id);
    Redirect::temporary(&auth_url)
}

/// GET /callback - provider redirect target
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let Some(user_id) = user_from_headers(&headers) else {
        return failure(&AuthError::Unauthorized);
    };

    debug!(user_id = %user_id, "OAuth callback received");

    match state
        .oauth
        .handle_callback(&user_id, params.code.as_deref(), params.state.as_deref())
        .await
    {
        Ok(()) => success("Authorization successful!"),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Authorization failed");
            failure(&e)
        }
    }
}

/// GET /refresh-token - rotate the stored token pair
async fn refresh_token(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    let Some(user_id) = user_from_headers(&headers) else {
        return failure(&AuthError::Unauthorized);
    };

    match state.oauth.refresh(&user_id).await {
        Ok(()) => success("Tokens refreshed successfully!"),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Token refresh failed");
            failure(&e)
        }
    }
}

/// GET /syncdata - run a full sync for the user
async fn sync_data(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Redirect {
    let Some(user_id) = user_from_headers(&headers) else {
        return failure(&AuthError::Unauthorized);
    };

    match state.sync.sync_all(&user_id).await {
        Ok(report) => {
            debug!(
                user_id = %user_id,
                accounts = report.accounts_stored,
                entries = report.entries_stored,
                "Sync reported to user"
            );
            success("Data synced successfully!")
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Sync failed");
            failure(&e)
        }
    }
}

/// GET /status - connection status for the account display
async fn connection_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ConnectionStatus>, StatusCode> {
    let Some(user_id) = user_from_headers(&headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    state.oauth.status(&user_id).map(Json).map_err(|e| {
        error!(user_id = %user_id, error = %e, "Failed to read connection status");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_callback_params_deserialization() {
        let query = "code=auth_code_123&state=csrf_state_456";
        let params: CallbackParams = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(params.code, Some("auth_code_123".to_string()));
        assert_eq!(params.state, Some("csrf_state_456".to_string()));

        // Provider may redirect back without a code
        let params: CallbackParams = serde_urlencoded::from_str("state=only").unwrap();
        assert_eq!(params.code, None);
        assert_eq!(params.state, Some("only".to_string()));
    }

    #[test]
    fn test_outcome_encodes_message() {
        let response = outcome("error", "Authorization failed: No code provided.").into_response();
        let location = response
            .headers()
            .get("location")
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(
            location,
            "/account?message=Authorization%20failed%3A%20No%20code%20provided.&status=error"
        );
    }
}
