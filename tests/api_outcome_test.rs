// Integration tests for the redirect-outcome protocol of the HTTP surface

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::NaiveDate;
use ledgersync::api::{create_router, AppState};
use ledgersync::crypto::TokenCipher;
use ledgersync::oauth::{OAuthFlow, PendingAuthorizations, ProviderConfig};
use ledgersync::sync::{AccountingApiClient, LedgerStore, LedgerSyncPipeline};
use ledgersync::tokens::TokenStore;
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app() -> Router {
    let provider = ProviderConfig {
        auth_url: "https://provider.example.com/connect/oauth2".to_string(),
        token_url: "https://provider.example.com/tokens/bearer".to_string(),
        scope: "com.example.accounting".to_string(),
        redirect_uri: "http://localhost:3000/callback".to_string(),
        client_id: "client_id".to_string(),
        client_secret: "client_secret".to_string(),
    };
    let cipher = TokenCipher::new(&BASE64.encode([7u8; 32])).unwrap();
    let token_store = Arc::new(TokenStore::new(":memory:").unwrap());
    let oauth = Arc::new(OAuthFlow::new(
        provider,
        cipher,
        token_store,
        PendingAuthorizations::new(600),
    ));

    let ledger_store = Arc::new(LedgerStore::new(":memory:").unwrap());
    let client = AccountingApiClient::new(
        "https://api.example.com".to_string(),
        "9999".to_string(),
        73,
    );
    let pipeline = Arc::new(LedgerSyncPipeline::new(
        Arc::clone(&oauth),
        client,
        ledger_store,
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        "Accrual".to_string(),
    ));

    create_router(AppState {
        oauth,
        sync: pipeline,
    })
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect response carries location")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_auth_without_session_reports_unauthorized() {
    let app = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/auth").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let target = location(&response);
    assert!(target.starts_with("/account?"));
    assert!(target.contains("status=error"));
    assert!(target.contains("Unauthorized"));
}

#[tokio::test]
async fn test_auth_redirects_to_provider_with_state() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let target = location(&response);
    assert!(target.starts_with("https://provider.example.com/connect/oauth2?"));
    assert!(target.contains("state="));
    assert!(target.contains("client_id=client_id"));
}

#[tokio::test]
async fn test_callback_without_code_reports_error_outcome() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?state=whatever")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let target = location(&response);
    assert!(target.contains("status=error"));
    assert!(target.contains("No%20code%20provided"));
}

#[tokio::test]
async fn test_callback_with_stale_state_reports_error_outcome() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/callback?code=abc&state=never_issued")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let target = location(&response);
    assert!(target.contains("status=error"));
    assert!(target.contains("Invalid%20state%20parameter"));
}

#[tokio::test]
async fn test_refresh_token_without_record_reports_error_outcome() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/refresh-token")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let target = location(&response);
    assert!(target.contains("status=error"));
    assert!(target.contains("Please%20reconnect"));
}

#[tokio::test]
async fn test_status_requires_session() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_reports_not_connected() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/status")
                .header("x-user-id", "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["connected"], false);
}
