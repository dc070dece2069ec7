use route402::routing::fingerprint::{fingerprint, stable_stringify};
use serde_json::json;

#[test]
fn settle_pair_fingerprint_survives_key_reordering() {
    let a = json!({
        "paymentPayload": {"sig": "0xs", "from": "0xf"},
        "paymentRequirements": {"scheme": "exact", "network": "base"},
    });
    let b = json!({
        "paymentRequirements": {"network": "base", "scheme": "exact"},
        "paymentPayload": {"from": "0xf", "sig": "0xs"},
    });
    assert_eq!(fingerprint(&a), fingerprint(&b));
}

#[test]
fn different_requirements_produce_different_fingerprints() {
    let base = json!({
        "paymentPayload": {"sig": "0xs"},
        "paymentRequirements": {"scheme": "exact", "network": "base"},
    });
    let polygon = json!({
        "paymentPayload": {"sig": "0xs"},
        "paymentRequirements": {"scheme": "exact", "network": "polygon"},
    });
    assert_ne!(fingerprint(&base), fingerprint(&polygon));
}

#[test]
fn stable_stringify_matches_plain_json_for_scalars() {
    assert_eq!(stable_stringify(&json!(null)), "null");
    assert_eq!(stable_stringify(&json!("x")), "\"x\"");
    assert_eq!(stable_stringify(&json!(12)), "12");
    assert_eq!(stable_stringify(&json!(true)), "true");
}
