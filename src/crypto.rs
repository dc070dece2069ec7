use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

const CURRENT_VERSION: u32 = 1;
const NONCE_BYTES: usize = 12;
const TAG_BYTES: usize = 16;
const KEY_BYTES: usize = 32;
const HKDF_INFO: &[u8] = b"route402";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("master key must be {KEY_BYTES} bytes of base64")]
    InvalidMasterKey,
    #[error("unsupported encrypted payload version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed encrypted payload: {0}")]
    Payload(String),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Versioned at-rest envelope for tenant-keyed secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub version: u32,
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

impl EncryptedPayload {
    pub fn to_json(&self) -> Result<serde_json::Value, CryptoError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<EncryptedPayload, CryptoError> {
        serde_json::from_value(value.clone()).map_err(CryptoError::Serialization)
    }
}

/// AES-256-GCM over JSON values, keyed per tenant by
/// HKDF-SHA256(master, salt = tenant id, info = "route402").
#[derive(Clone)]
pub struct CredentialCipher {
    master_key: [u8; KEY_BYTES],
}

impl CredentialCipher {
    pub fn from_base64(master_key_base64: &str) -> Result<CredentialCipher, CryptoError> {
        let decoded = BASE64
            .decode(master_key_base64.trim())
            .map_err(|_| CryptoError::InvalidMasterKey)?;
        let master_key: [u8; KEY_BYTES] =
            decoded.try_into().map_err(|_| CryptoError::InvalidMasterKey)?;
        Ok(CredentialCipher { master_key })
    }

    fn tenant_key(&self, tenant_id: Uuid) -> [u8; KEY_BYTES] {
        let salt = tenant_id.to_string();
        let hk = Hkdf::<Sha256>::new(Some(salt.as_bytes()), &self.master_key);
        let mut okm = [0u8; KEY_BYTES];
        // expand cannot fail for a 32-byte output
        let _ = hk.expand(HKDF_INFO, &mut okm);
        okm
    }

    pub fn encrypt(
        &self,
        tenant_id: Uuid,
        value: &serde_json::Value,
    ) -> Result<EncryptedPayload, CryptoError> {
        let key = self.tenant_key(tenant_id);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Encrypt)?;

        let mut nonce_bytes = [0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = serde_json::to_vec(value)?;
        let mut sealed = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|_| CryptoError::Encrypt)?;

        if sealed.len() < TAG_BYTES {
            return Err(CryptoError::Encrypt);
        }
        let tag = sealed.split_off(sealed.len() - TAG_BYTES);

        Ok(EncryptedPayload {
            version: CURRENT_VERSION,
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(&sealed),
            tag: BASE64.encode(&tag),
        })
    }

    pub fn decrypt(
        &self,
        tenant_id: Uuid,
        payload: &EncryptedPayload,
    ) -> Result<serde_json::Value, CryptoError> {
        if payload.version != CURRENT_VERSION {
            return Err(CryptoError::UnsupportedVersion(payload.version));
        }

        let nonce_bytes = BASE64
            .decode(&payload.nonce)
            .map_err(|e| CryptoError::Payload(e.to_string()))?;
        if nonce_bytes.len() != NONCE_BYTES {
            return Err(CryptoError::Payload("bad nonce length".to_string()));
        }
        let mut sealed = BASE64
            .decode(&payload.ciphertext)
            .map_err(|e| CryptoError::Payload(e.to_string()))?;
        let tag = BASE64
            .decode(&payload.tag)
            .map_err(|e| CryptoError::Payload(e.to_string()))?;
        sealed.extend_from_slice(&tag);

        let key = self.tenant_key(tenant_id);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Decrypt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_slice())
            .map_err(|_| CryptoError::Decrypt)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use serde_json::json;

    fn cipher() -> CredentialCipher {
        CredentialCipher::from_base64(&BASE64.encode([7u8; 32])).unwrap()
    }

    #[test]
    fn round_trips_under_same_tenant() {
        let cipher = cipher();
        let tenant = Uuid::new_v4();
        let value = json!({"apiKeyId": "k", "apiKeySecret": "s"});

        let sealed = cipher.encrypt(tenant, &value).unwrap();
        let opened = cipher.decrypt(tenant, &sealed).unwrap();
        assert_eq!(opened, value);
    }

    #[test]
    fn rejects_other_tenants_key() {
        let cipher = cipher();
        let sealed = cipher.encrypt(Uuid::new_v4(), &json!({"x": 1})).unwrap();
        assert!(cipher.decrypt(Uuid::new_v4(), &sealed).is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let cipher = cipher();
        let tenant = Uuid::new_v4();
        let mut sealed = cipher.encrypt(tenant, &json!({"x": 1})).unwrap();
        sealed.version = 9;
        assert!(matches!(
            cipher.decrypt(tenant, &sealed),
            Err(CryptoError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn rejects_short_master_key() {
        assert!(CredentialCipher::from_base64(&BASE64.encode([1u8; 16])).is_err());
    }
}
