use crate::domain::connection::Provider;
use crate::domain::x402::{SettleOutcome, SettleRequest, SupportedResponse, VerifyOutcome, VerifyRequest};
use crate::facilitators::client::{build_url, send_json, send_json_with_retry};
use crate::facilitators::normalize::{normalize_settle, normalize_supported, normalize_verify};
use crate::facilitators::{AdapterContext, AdapterError, AdapterTimeouts, FacilitatorAdapter};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rand::RngCore;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.cdp.coinbase.com/platform/v2/x402";
const TOKEN_TTL_SECS: i64 = 120;

// PKCS#8 v1 wrapper for a raw Ed25519 seed
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

#[derive(Debug, Deserialize)]
struct CdpCredentials {
    #[serde(rename = "apiKey")]
    api_key: String,
    #[serde(rename = "apiSecret")]
    api_secret: String,
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CdpClaims {
    sub: String,
    iss: &'static str,
    nbf: i64,
    exp: i64,
    uris: Vec<String>,
    nonce: String,
}

pub struct CdpAdapter {
    client: reqwest::Client,
    timeouts: AdapterTimeouts,
}

impl CdpAdapter {
    pub fn new(client: reqwest::Client, timeouts: AdapterTimeouts) -> Self {
        Self { client, timeouts }
    }

    fn credentials(ctx: &AdapterContext) -> Result<CdpCredentials, AdapterError> {
        serde_json::from_value(ctx.credentials.clone()).map_err(|e| AdapterError::Credentials {
            provider: "cdp",
            detail: e.to_string(),
        })
    }

    fn base_url(credentials: &CdpCredentials) -> String {
        credentials
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }
}

/// Sign a short-lived bearer token for one request. The stored secret is a
/// base64 Ed25519 key (32-byte seed, or 64 bytes with the public half
/// appended); the token is scoped to the method+URL it authenticates.
fn sign_bearer_token(
    credentials: &CdpCredentials,
    method: &str,
    url: &str,
) -> Result<String, AdapterError> {
    let raw = BASE64
        .decode(credentials.api_secret.trim())
        .map_err(|_| AdapterError::Credentials {
            provider: "cdp",
            detail: "apiSecret is not valid base64".to_string(),
        })?;

    let seed: &[u8] = match raw.len() {
        32 => &raw,
        64 => &raw[..32],
        n => {
            return Err(AdapterError::Credentials {
                provider: "cdp",
                detail: format!("apiSecret must decode to 32 or 64 bytes, got {}", n),
            })
        }
    };

    let mut der = Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + seed.len());
    der.extend_from_slice(&ED25519_PKCS8_PREFIX);
    der.extend_from_slice(seed);
    let key = EncodingKey::from_ed_der(&der);

    let parsed = reqwest::Url::parse(url).map_err(|e| AdapterError::Credentials {
        provider: "cdp",
        detail: format!("bad base url: {}", e),
    })?;
    let uri = format!(
        "{} {}{}",
        method,
        parsed.host_str().unwrap_or_default(),
        parsed.path()
    );

    let mut nonce_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let now = chrono::Utc::now().timestamp();
    let claims = CdpClaims {
        sub: credentials.api_key.clone(),
        iss: "cdp",
        nbf: now,
        exp: now + TOKEN_TTL_SECS,
        uris: vec![uri],
        nonce: hex::encode(nonce_bytes),
    };

    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(credentials.api_key.clone());

    jsonwebtoken::encode(&header, &claims, &key).map_err(|e| AdapterError::Credentials {
        provider: "cdp",
        detail: format!("token signing failed: {}", e),
    })
}

#[async_trait::async_trait]
impl FacilitatorAdapter for CdpAdapter {
    fn provider(&self) -> Provider {
        Provider::Cdp
    }

    async fn supported(&self, ctx: &AdapterContext) -> Result<SupportedResponse, AdapterError> {
        let credentials = Self::credentials(ctx)?;
        let url = build_url(&Self::base_url(&credentials), "/supported");
        let token = sign_bearer_token(&credentials, "GET", &url)?;

        let raw = send_json_with_retry(
            self.client.get(&url).bearer_auth(token),
            self.timeouts.read,
        )
        .await?;
        Ok(normalize_supported(&raw)?)
    }

    async fn verify(
        &self,
        ctx: &AdapterContext,
        req: &VerifyRequest,
    ) -> Result<VerifyOutcome, AdapterError> {
        let credentials = Self::credentials(ctx)?;
        let url = build_url(&Self::base_url(&credentials), "/verify");
        let token = sign_bearer_token(&credentials, "POST", &url)?;

        let raw = send_json_with_retry(
            self.client.post(&url).bearer_auth(token).json(req),
            self.timeouts.read,
        )
        .await?;
        Ok(normalize_verify(&raw)?)
    }

    async fn settle(
        &self,
        ctx: &AdapterContext,
        req: &SettleRequest,
    ) -> Result<SettleOutcome, AdapterError> {
        let credentials = Self::credentials(ctx)?;
        let url = build_url(&Self::base_url(&credentials), "/settle");
        let token = sign_bearer_token(&credentials, "POST", &url)?;

        // no transport retry: dedupe lives in the settlement state machine
        let raw = send_json(
            self.client.post(&url).bearer_auth(token).json(req),
            self.timeouts.settle,
        )
        .await?;
        Ok(normalize_settle(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    fn credentials() -> CdpCredentials {
        CdpCredentials {
            api_key: "organizations/abc/apiKeys/def".to_string(),
            api_secret: BASE64.encode([42u8; 32]),
            base_url: None,
        }
    }

    #[test]
    fn bearer_token_is_a_three_part_jwt_with_expected_claims() {
        let token =
            sign_bearer_token(&credentials(), "POST", "https://api.cdp.coinbase.com/platform/v2/x402/settle")
                .unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "EdDSA");
        assert_eq!(header["kid"], "organizations/abc/apiKeys/def");

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["sub"], "organizations/abc/apiKeys/def");
        assert_eq!(
            claims["uris"][0],
            "POST api.cdp.coinbase.com/platform/v2/x402/settle"
        );
        let lifetime = claims["exp"].as_i64().unwrap() - claims["nbf"].as_i64().unwrap();
        assert_eq!(lifetime, TOKEN_TTL_SECS);
    }

    #[test]
    fn accepts_64_byte_secret() {
        let mut creds = credentials();
        creds.api_secret = BASE64.encode([42u8; 64]);
        assert!(sign_bearer_token(&creds, "GET", "https://api.cdp.coinbase.com/x").is_ok());
    }

    #[test]
    fn rejects_wrong_length_secret() {
        let mut creds = credentials();
        creds.api_secret = BASE64.encode([42u8; 31]);
        let err = sign_bearer_token(&creds, "GET", "https://api.cdp.coinbase.com/x").unwrap_err();
        assert!(matches!(err, AdapterError::Credentials { .. }));
    }
}
