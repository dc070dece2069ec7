use crate::domain::x402::{SchemeSupport, SettleOutcome, SupportedResponse, VerifyOutcome};
use serde_json::Value;
use thiserror::Error;

/// The upstream body matched none of the accepted shapes for the logical
/// field. A hard failure: results are never defaulted.
#[derive(Debug, Error)]
#[error("unexpected {endpoint} response: {detail}")]
pub struct NormalizeError {
    pub endpoint: &'static str,
    pub detail: String,
}

// Accepted spellings per logical field, first match wins.
const VERIFY_BOOL_KEYS: &[&str] = &["isValid", "valid", "verified", "success"];
const SETTLE_BOOL_KEYS: &[&str] = &["success", "settled", "ok"];
const PAYER_KEYS: &[&str] = &["payer", "payerAddress", "payer_address"];
const INVALID_REASON_KEYS: &[&str] = &["invalidReason", "reason", "error", "message"];
const SETTLE_ERROR_KEYS: &[&str] = &["errorReason", "reason", "error", "message"];
const TX_HASH_KEYS: &[&str] = &["txHash", "tx_hash", "transactionHash", "hash"];

fn pick_bool(record: &Value, keys: &[&str]) -> Option<bool> {
    let map = record.as_object()?;
    keys.iter().find_map(|k| map.get(*k).and_then(Value::as_bool))
}

fn pick_string(record: &Value, keys: &[&str]) -> Option<String> {
    let map = record.as_object()?;
    keys.iter().find_map(|k| {
        map.get(*k)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn object_keys(value: &Value) -> Vec<String> {
    value
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn normalize_verify(raw: &Value) -> Result<VerifyOutcome, NormalizeError> {
    let is_valid = pick_bool(raw, VERIFY_BOOL_KEYS).ok_or_else(|| NormalizeError {
        endpoint: "verify",
        detail: format!(
            "no boolean among {:?} (keys: {})",
            VERIFY_BOOL_KEYS,
            object_keys(raw).join(", ")
        ),
    })?;

    Ok(VerifyOutcome {
        is_valid,
        payer: pick_string(raw, PAYER_KEYS),
        invalid_reason: pick_string(raw, INVALID_REASON_KEYS),
    })
}

pub fn normalize_settle(raw: &Value) -> Result<SettleOutcome, NormalizeError> {
    let success = pick_bool(raw, SETTLE_BOOL_KEYS).ok_or_else(|| NormalizeError {
        endpoint: "settle",
        detail: format!(
            "no boolean among {:?} (keys: {})",
            SETTLE_BOOL_KEYS,
            object_keys(raw).join(", ")
        ),
    })?;

    Ok(SettleOutcome {
        success,
        payer: pick_string(raw, PAYER_KEYS),
        tx_hash: pick_string(raw, TX_HASH_KEYS),
        network: pick_string(raw, &["network"]),
        error_reason: pick_string(raw, SETTLE_ERROR_KEYS),
    })
}

/// Supported listings arrive in many shapes: a bare array, an array under
/// `schemes`/`supported`/`capabilities`/`extensions`, nested inside
/// `data`/`result`, or a map of scheme name to networks.
pub fn normalize_supported(raw: &Value) -> Result<SupportedResponse, NormalizeError> {
    let candidate = supported_candidate(raw).ok_or_else(|| NormalizeError {
        endpoint: "supported",
        detail: format!("missing schemes (keys: {})", object_keys(raw).join(", ")),
    })?;

    let schemes = match candidate {
        Value::Array(entries) => entries
            .iter()
            .map(entry_from_value)
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(map) => {
            let nested = map.get("schemes").or_else(|| map.get("supported"));
            if let Some(Value::Array(entries)) = nested {
                entries
                    .iter()
                    .map(entry_from_value)
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                map.iter()
                    .map(|(scheme, value)| entry_from_keyed(scheme, value))
                    .collect::<Result<Vec<_>, _>>()?
            }
        }
        _ => {
            return Err(NormalizeError {
                endpoint: "supported",
                detail: "schemes are neither a list nor a map".to_string(),
            })
        }
    };

    Ok(SupportedResponse { schemes })
}

fn supported_candidate(raw: &Value) -> Option<&Value> {
    if let Value::Object(map) = raw {
        for key in ["schemes", "supported", "capabilities", "extensions"] {
            if let Some(v) = map.get(key) {
                return Some(v);
            }
        }
        for outer in ["data", "result"] {
            if let Some(Value::Object(inner)) = map.get(outer) {
                for key in ["schemes", "supported", "extensions"] {
                    if let Some(v) = inner.get(key) {
                        return Some(v);
                    }
                }
            }
        }
        return None;
    }

    if raw.is_array() {
        return Some(raw);
    }

    None
}

fn entry_from_value(entry: &Value) -> Result<SchemeSupport, NormalizeError> {
    match entry {
        Value::String(scheme) => Ok(SchemeSupport {
            scheme: scheme.clone(),
            networks: Vec::new(),
        }),
        Value::Object(map) => {
            let scheme = map
                .get("scheme")
                .or_else(|| map.get("name"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| NormalizeError {
                    endpoint: "supported",
                    detail: "entry is missing a scheme name".to_string(),
                })?;
            Ok(SchemeSupport {
                scheme: scheme.to_string(),
                networks: networks_from(entry),
            })
        }
        _ => Err(NormalizeError {
            endpoint: "supported",
            detail: "entry is neither a string nor an object".to_string(),
        }),
    }
}

fn entry_from_keyed(scheme: &str, value: &Value) -> Result<SchemeSupport, NormalizeError> {
    if let Value::Object(map) = value {
        let named = map
            .get("scheme")
            .or_else(|| map.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        return Ok(SchemeSupport {
            scheme: named.unwrap_or(scheme).to_string(),
            networks: networks_from(value),
        });
    }

    Ok(SchemeSupport {
        scheme: scheme.to_string(),
        networks: networks_from(value),
    })
}

fn networks_from(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(s) => vec![s.clone()],
        Value::Object(map) => match map.get("networks").or_else(|| map.get("network")) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verify_accepts_each_boolean_spelling() {
        for key in ["isValid", "valid", "verified", "success"] {
            let raw = json!({ key: true, "payer": "0xabc" });
            let outcome = normalize_verify(&raw).unwrap();
            assert!(outcome.is_valid);
            assert_eq!(outcome.payer.as_deref(), Some("0xabc"));
        }
    }

    #[test]
    fn verify_first_spelling_wins() {
        let raw = json!({"isValid": false, "success": true});
        assert!(!normalize_verify(&raw).unwrap().is_valid);
    }

    #[test]
    fn verify_without_any_boolean_is_an_error() {
        let raw = json!({"status": "fine", "isValid": "yes"});
        let err = normalize_verify(&raw).unwrap_err();
        assert_eq!(err.endpoint, "verify");
    }

    #[test]
    fn settle_extracts_tx_hash_spellings() {
        for key in ["txHash", "tx_hash", "transactionHash", "hash"] {
            let raw = json!({"success": true, key: "0xdeadbeef", "network": "base"});
            let outcome = normalize_settle(&raw).unwrap();
            assert_eq!(outcome.tx_hash.as_deref(), Some("0xdeadbeef"));
            assert_eq!(outcome.network.as_deref(), Some("base"));
        }
    }

    #[test]
    fn settle_failure_carries_error_reason() {
        let raw = json!({"settled": false, "reason": "insufficient funds"});
        let outcome = normalize_settle(&raw).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error_reason.as_deref(), Some("insufficient funds"));
    }

    #[test]
    fn supported_accepts_array_of_objects() {
        let raw = json!({"schemes": [{"scheme": "exact", "networks": ["base", "polygon"]}]});
        let normalized = normalize_supported(&raw).unwrap();
        assert_eq!(normalized.schemes.len(), 1);
        assert_eq!(normalized.schemes[0].scheme, "exact");
        assert_eq!(normalized.schemes[0].networks, vec!["base", "polygon"]);
    }

    #[test]
    fn supported_accepts_scheme_map() {
        let raw = json!({"supported": {"exact": ["base"], "upto": {"networks": ["polygon"]}}});
        let normalized = normalize_supported(&raw).unwrap();
        let schemes: Vec<&str> = normalized.schemes.iter().map(|s| s.scheme.as_str()).collect();
        assert!(schemes.contains(&"exact"));
        assert!(schemes.contains(&"upto"));
    }

    #[test]
    fn supported_unwraps_result_envelope() {
        let raw = json!({"result": {"schemes": ["exact"]}});
        let normalized = normalize_supported(&raw).unwrap();
        assert_eq!(normalized.schemes[0].scheme, "exact");
        assert!(normalized.schemes[0].networks.is_empty());
    }

    #[test]
    fn supported_without_schemes_is_an_error() {
        let raw = json!({"hello": "world"});
        let err = normalize_supported(&raw).unwrap_err();
        assert!(err.detail.contains("hello"));
    }
}
