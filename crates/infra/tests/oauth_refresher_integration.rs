//! Integration tests for the OAuth refresh-token exchange

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use serde_json::json;
use stockx_common::auth::{
    CredentialError, CredentialManager, CredentialManagerConfig, TokenRefresher,
};
use stockx_infra::OAuthRefresher;
use support::{config_for, token_json};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_refresh_posts_form_and_decodes_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("client_secret=secret-1"))
        .and(body_string_contains("audience=gateway.stockx.com"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("access-1")))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = OAuthRefresher::from_config(&config_for(&server)).unwrap();
    let token = refresher.refresh("refresh-1").await.unwrap();

    assert_eq!(token.access_token, "access-1");
    assert_eq!(token.expires_in, 43200);
    assert_eq!(token.refresh_token, None);
}

#[tokio::test]
async fn test_rotated_refresh_token_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 3600,
            "refresh_token": "refresh-2"
        })))
        .mount(&server)
        .await;

    let refresher = OAuthRefresher::from_config(&config_for(&server)).unwrap();
    let token = refresher.refresh("refresh-1").await.unwrap();

    assert_eq!(token.refresh_token.as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn test_invalid_grant_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Unknown or invalid refresh token."
        })))
        .mount(&server)
        .await;

    let refresher = OAuthRefresher::from_config(&config_for(&server)).unwrap();
    let err = refresher.refresh("revoked").await.unwrap_err();

    match err {
        CredentialError::Rejected { message } => assert!(message.contains("invalid refresh token")),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_failure_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let refresher = OAuthRefresher::from_config(&config_for(&server)).unwrap();
    let err = refresher.refresh("refresh-1").await.unwrap_err();

    assert!(matches!(err, CredentialError::Unavailable { .. }));
    assert!(!err.is_irrecoverable());
}

/// The credential manager drives the refresher and caches its token.
#[tokio::test]
async fn test_credential_manager_uses_refresher_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("access-1")))
        .expect(1)
        .mount(&server)
        .await;

    let refresher = OAuthRefresher::from_config(&config_for(&server)).unwrap();
    let manager = CredentialManager::new(
        Arc::new(refresher),
        "refresh-1",
        CredentialManagerConfig::default(),
    );

    let first = manager.get_valid_credential().await.unwrap();
    let second = manager.get_valid_credential().await.unwrap();
    assert_eq!(first.access_token, "access-1");
    assert_eq!(second.access_token, "access-1");
    assert_eq!(manager.refresh_count(), 1);
}
