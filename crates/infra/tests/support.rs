#![allow(dead_code)]

use serde_json::{json, Value};
use stockx_domain::{CredentialsConfig, StockxConfig};
use stockx_infra::{HttpClient, StockxApiClient};
use wiremock::MockServer;

pub const TOKEN: &str = "access-1";

/// Configuration pointed at a mock server, with fast polling and no
/// meaningful throttling.
pub fn config_for(server: &MockServer) -> StockxConfig {
    let mut config = StockxConfig {
        credentials: CredentialsConfig {
            api_key: "test-api-key".into(),
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            refresh_token: "refresh-1".into(),
        },
        ..StockxConfig::default()
    };
    config.api.base_url = format!("{}/v2", server.uri());
    config.api.auth_url = format!("{}/oauth/token", server.uri());
    config.throttle.burst = 50;
    config.throttle.refill_amount = 50;
    config.throttle.refill_interval_ms = 10;
    config.retry.base_delay_ms = 5;
    config.retry.max_delay_ms = 20;
    config.batch.poll_initial_ms = 10;
    config.batch.poll_max_ms = 40;
    config.batch.poll_timeout_secs = 5;
    config
}

pub fn api_client(server: &MockServer) -> StockxApiClient {
    let http = HttpClient::new().expect("http client");
    StockxApiClient::new(http, &format!("{}/v2", server.uri()), "USD").expect("api client")
}

pub fn listing_json(id: &str, variant: &str, amount: &str) -> Value {
    json!({
        "listingId": id,
        "status": "ACTIVE",
        "amount": amount,
        "currencyCode": "USD",
        "inventoryType": "STANDARD",
        "createdAt": "2024-05-01T12:00:00.000Z",
        "product": {"productId": "prod-1", "productName": "Dunk Low Panda", "styleId": "DD1391-100"},
        "variant": {"variantId": variant, "variantName": "DD1391-100:10", "variantValue": "10"}
    })
}

pub fn token_json(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 43200,
        "scope": "offline_access"
    })
}
