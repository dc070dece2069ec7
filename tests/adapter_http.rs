use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use route402::domain::connection::Provider;
use route402::domain::x402::{PaymentRequirements, SettleRequest, VerifyRequest};
use route402::facilitators::{
    AdapterContext, AdapterError, AdapterRegistry, AdapterTimeouts, FacilitatorAdapter,
};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn timeouts() -> AdapterTimeouts {
    AdapterTimeouts {
        read: Duration::from_millis(500),
        settle: Duration::from_millis(1_000),
    }
}

fn registry() -> AdapterRegistry {
    AdapterRegistry::new(reqwest::Client::new(), timeouts())
}

fn ctx(provider: Provider, credentials: serde_json::Value) -> AdapterContext {
    AdapterContext {
        tenant_id: Uuid::new_v4(),
        connection_id: Uuid::new_v4(),
        provider,
        credentials,
    }
}

fn verify_request() -> VerifyRequest {
    VerifyRequest {
        payment_requirements: PaymentRequirements {
            scheme: "exact".to_string(),
            network: Some("base".to_string()),
            asset: Some("USDC".to_string()),
            amount: Some("10".to_string()),
            pay_to: None,
        },
        payment_payload: Some(json!({"signature": "0xsig"})),
    }
}

fn settle_request() -> SettleRequest {
    SettleRequest {
        payment_requirements: verify_request().payment_requirements,
        payment_payload: json!({"signature": "0xsig"}),
    }
}

#[tokio::test]
async fn mogami_verify_normalizes_upstream_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "payerAddress": "0xabc"
        })))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Mogami);
    let outcome = adapter
        .verify(
            &ctx(Provider::Mogami, json!({"baseUrl": server.uri()})),
            &verify_request(),
        )
        .await
        .unwrap();

    assert!(outcome.is_valid);
    assert_eq!(outcome.payer.as_deref(), Some("0xabc"));
}

#[tokio::test]
async fn mogami_settle_maps_5xx_to_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Mogami);
    let err = adapter
        .settle(
            &ctx(Provider::Mogami, json!({"baseUrl": server.uri()})),
            &settle_request(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::UpstreamStatus(502)));
}

#[tokio::test]
async fn mogami_settle_rejects_unrecognizable_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outcome": "done"})))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Mogami);
    let err = adapter
        .settle(
            &ctx(Provider::Mogami, json!({"baseUrl": server.uri()})),
            &settle_request(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AdapterError::Normalize(_)));
}

#[tokio::test]
async fn mogami_supported_falls_back_to_support_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/supported"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/support"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Mogami);
    let supported = adapter
        .supported(&ctx(Provider::Mogami, json!({"baseUrl": server.uri()})))
        .await
        .unwrap();

    assert_eq!(supported.schemes.len(), 1);
    assert_eq!(supported.schemes[0].scheme, "exact");
    assert_eq!(supported.schemes[0].networks, vec!["base-sepolia"]);
}

#[tokio::test]
async fn mogami_verify_retries_once_after_transport_timeout() {
    let server = MockServer::start().await;
    // first attempt stalls past the read timeout, the retry succeeds
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({"isValid": true})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isValid": true})))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Mogami);
    let outcome = adapter
        .verify(
            &ctx(Provider::Mogami, json!({"baseUrl": server.uri()})),
            &verify_request(),
        )
        .await
        .unwrap();

    assert!(outcome.is_valid);
}

#[tokio::test]
async fn thirdweb_sends_secret_header_and_unwraps_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(header("x-secret-key", "tw-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"isValid": false, "invalidReason": "expired"}
        })))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Thirdweb);
    let outcome = adapter
        .verify(
            &ctx(
                Provider::Thirdweb,
                json!({"walletSecret": "tw-secret", "baseUrl": server.uri()}),
            ),
            &verify_request(),
        )
        .await
        .unwrap();

    assert!(!outcome.is_valid);
    assert_eq!(outcome.invalid_reason.as_deref(), Some("expired"));
}

#[tokio::test]
async fn thirdweb_settle_normalizes_wrapped_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"success": true, "transactionHash": "0xfeed", "network": "base"}
        })))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Thirdweb);
    let outcome = adapter
        .settle(
            &ctx(
                Provider::Thirdweb,
                json!({"walletSecret": "tw-secret", "baseUrl": server.uri()}),
            ),
            &settle_request(),
        )
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.tx_hash.as_deref(), Some("0xfeed"));
    assert_eq!(outcome.network.as_deref(), Some("base"));
}

#[tokio::test]
async fn cdp_calls_carry_a_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/supported"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "schemes": [{"scheme": "exact", "networks": ["base"]}]
        })))
        .mount(&server)
        .await;

    let adapter = registry().get(Provider::Cdp);
    let supported = adapter
        .supported(&ctx(
            Provider::Cdp,
            json!({
                "apiKey": "organizations/o/apiKeys/k",
                "apiSecret": BASE64.encode([9u8; 32]),
                "baseUrl": server.uri(),
            }),
        ))
        .await
        .unwrap();

    assert_eq!(supported.schemes[0].scheme, "exact");
}

#[tokio::test]
async fn mock_adapter_behaviors_are_driven_by_credentials() {
    let registry = registry();
    let adapter = registry.get(Provider::Mock);

    let valid = adapter
        .verify(&ctx(Provider::Mock, json!({})), &verify_request())
        .await
        .unwrap();
    assert!(valid.is_valid);

    let invalid = adapter
        .verify(
            &ctx(Provider::Mock, json!({"behavior": "always-invalid"})),
            &verify_request(),
        )
        .await
        .unwrap();
    assert!(!invalid.is_valid);

    let failed = adapter
        .settle(
            &ctx(Provider::Mock, json!({"behavior": "always-failure"})),
            &settle_request(),
        )
        .await
        .unwrap();
    assert!(!failed.success);
    assert_eq!(failed.error_reason.as_deref(), Some("mock decline"));

    let timed_out = adapter
        .settle(
            &ctx(Provider::Mock, json!({"behavior": "always-timeout"})),
            &settle_request(),
        )
        .await
        .unwrap_err();
    assert!(timed_out.is_network());
}
