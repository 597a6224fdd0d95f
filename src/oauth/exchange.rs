//! Token endpoint exchanges.
//!
//! Both grants POST a form-encoded body to the provider's token endpoint
//! with the client credentials in a Basic-Auth header.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use super::provider::ProviderConfig;
use crate::error::ExchangeError;

/// Token response from the provider's token endpoint.
///
/// The accounting platform returns a full pair on both grants, with the
/// refresh token rotated on every refresh.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

/// A freshly issued token pair with its absolute expiry.
#[derive(Clone, Debug)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Exchange an authorization code for a token pair
/// (`grant_type=authorization_code`).
pub async fn exchange_code(
    http: &reqwest::Client,
    provider: &ProviderConfig,
    code: &str,
) -> Result<TokenGrant, ExchangeError> {
    let mut form = HashMap::new();
    form.insert("grant_type", "authorization_code");
    form.insert("code", code);
    form.insert("redirect_uri", provider.redirect_uri.as_str());

    tracing::debug!("Exchanging authorization code at {}", provider.token_url);

    post_token_request(http, provider, &form).await
}

/// Exchange a refresh token for a new token pair
/// (`grant_type=refresh_token`).
pub async fn exchange_refresh(
    http: &reqwest::Client,
    provider: &ProviderConfig,
    refresh_token: &str,
) -> Result<TokenGrant, ExchangeError> {
    let mut form = HashMap::new();
    form.insert("grant_type", "refresh_token");
    form.insert("refresh_token", refresh_token);

    tracing::debug!("Refreshing tokens at {}", provider.token_url);

    post_token_request(http, provider, &form).await
}

async fn post_token_request(
    http: &reqwest::Client,
    provider: &ProviderConfig,
    form: &HashMap<&str, &str>,
) -> Result<TokenGrant, ExchangeError> {
    let response = http
        .post(&provider.token_url)
        .basic_auth(&provider.client_id, Some(&provider.client_secret))
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        return Err(ExchangeError::Status { status, body });
    }

    let token_response: TokenResponse = response.json().await?;

    Ok(TokenGrant {
        access_token: token_response.access_token,
        refresh_token: token_response.refresh_token,
        expires_at: Utc::now() + Duration::seconds(token_response.expires_in),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider(token_url: String) -> ProviderConfig {
        ProviderConfig {
            auth_url: "https://example.com/connect/oauth2".to_string(),
            token_url,
            scope: "com.example.accounting".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
            client_id: "client_id".to_string(),
            client_secret: "client_secret".to_string(),
        }
    }

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "at_1234567890",
            "refresh_token": "rt_0987654321",
            "expires_in": 3600,
            "token_type": "bearer",
            "x_refresh_token_expires_in": 8726400
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "at_1234567890");
        assert_eq!(response.refresh_token, "rt_0987654321");
        assert_eq!(response.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_exchange_code_sends_basic_auth_and_form() {
        let mut server = mockito::Server::new_async().await;

        // base64("client_id:client_secret")
        let mock = server
            .mock("POST", "/tokens/bearer")
            .match_header(
                "authorization",
                "Basic Y2xpZW50X2lkOmNsaWVudF9zZWNyZXQ=",
            )
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded(
                    "grant_type".into(),
                    "authorization_code".into(),
                ),
                mockito::Matcher::UrlEncoded("code".into(), "the_code".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"at_new","refresh_token":"rt_new","expires_in":3600}"#,
            )
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let provider = test_provider(format!("{}/tokens/bearer", server.url()));

        let grant = exchange_code(&http, &provider, "the_code").await.unwrap();
        assert_eq!(grant.access_token, "at_new");
        assert_eq!(grant.refresh_token, "rt_new");
        assert!(grant.expires_at > Utc::now());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_refresh_failure_surfaces_status() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("POST", "/tokens/bearer")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let http = reqwest::Client::new();
        let provider = test_provider(format!("{}/tokens/bearer", server.url()));

        let err = exchange_refresh(&http, &provider, "stale_token")
            .await
            .unwrap_err();
        match err {
            ExchangeError::Status { status, body } => {
                assert_eq!(status.as_u16(), 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
