#[test]
fn internal_api_key_env_name_is_stable() {
    let cfg = route402::config::AppConfig::from_env();
    assert!(!cfg.internal_api_key.is_empty());
}

#[test]
fn timeout_defaults_match_documented_bounds() {
    let cfg = route402::config::AppConfig::from_env();
    assert!(cfg.verify_timeout_ms <= cfg.settle_timeout_ms);
}

#[test]
fn facade_endpoints_exist_in_readme() {
    let readme = std::fs::read_to_string("README.md").unwrap_or_default();
    assert!(readme.contains("/facilitator/verify"));
    assert!(readme.contains("/facilitator/settle"));
    assert!(readme.contains("/facilitator/supported"));
    assert!(readme.contains("/internal/reconcile"));
    assert!(readme.contains("/ops/readiness"));
    assert!(readme.contains("x-route402-connection"));
}

#[test]
fn error_codes_are_documented() {
    let readme = std::fs::read_to_string("README.md").unwrap_or_default();
    for code in [
        "unauthorized",
        "invalid_request",
        "ruleset_missing",
        "ruleset_invalid",
        "no_eligible_connections",
        "no_route",
        "upstream_error",
        "settle_unknown",
    ] {
        assert!(readme.contains(code), "README missing error code {code}");
    }
}
