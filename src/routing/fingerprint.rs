use sha2::{Digest, Sha256};

/// Stable serialization: object keys sorted recursively so that two
/// payloads differing only in key order produce identical bytes.
pub fn stable_stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(k.clone()),
                        stable_stringify(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        serde_json::Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(stable_stringify).collect();
            format!("[{}]", entries.join(","))
        }
        other => other.to_string(),
    }
}

/// Idempotency key for a settlement request: SHA-256 of the stable
/// serialization of the `(paymentPayload, paymentRequirements)` pair.
pub fn fingerprint(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_stringify(value).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_fingerprint() {
        let a = json!({"paymentPayload": {"b": 1, "a": 2}, "paymentRequirements": {"scheme": "exact"}});
        let b = json!({"paymentRequirements": {"scheme": "exact"}, "paymentPayload": {"a": 2, "b": 1}});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn nested_key_order_is_normalized() {
        let a = json!({"x": {"outer": {"z": [1, 2], "a": null}}});
        let b = json!({"x": {"outer": {"a": null, "z": [1, 2]}}});
        assert_eq!(stable_stringify(&a), stable_stringify(&b));
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!({"v": [1, 2]});
        let b = json!({"v": [2, 1]});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn differing_payloads_differ() {
        let a = json!({"amount": "10"});
        let b = json!({"amount": "11"});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
