use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const API_KEY_PREFIX: &str = "r402_";
const API_KEY_BYTES: usize = 32;

pub struct GeneratedKey {
    pub raw_key: String,
    pub key_hash: String,
}

pub fn hash_api_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Mint a new bearer key. Only the hash is stored; the raw key is shown
/// to the caller once.
pub fn generate_api_key() -> GeneratedKey {
    let mut token = [0u8; API_KEY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut token);
    let raw_key = format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(token));
    let key_hash = hash_api_key(&raw_key);
    GeneratedKey { raw_key, key_hash }
}

pub fn parse_bearer_token(header_value: &str) -> Option<&str> {
    let mut parts = header_value.trim().split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}

pub fn hashes_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
