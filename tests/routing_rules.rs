use route402::domain::decision::RoutingEndpoint;
use route402::routing::context::RoutingContext;
use route402::routing::dsl::{compile_document, RulesetError};
use route402::routing::eval::evaluate;

const BASE_USDC_RULESET: &str = r#"
default: B
rules:
  - name: base-usdc
    when:
      all:
        - eq: [network, base]
        - eq: [asset, USDC]
    then:
      use: A
"#;

fn ctx(
    scheme: Option<&str>,
    network: Option<&str>,
    asset: Option<&str>,
    endpoint: RoutingEndpoint,
) -> RoutingContext {
    RoutingContext {
        scheme: scheme.map(str::to_string),
        network: network.map(str::to_string),
        asset: asset.map(str::to_string),
        amount: None,
        pay_to: None,
        endpoint,
    }
}

#[test]
fn base_usdc_context_selects_rule_a() {
    let ruleset = compile_document(BASE_USDC_RULESET).unwrap();
    let decision = evaluate(
        &ruleset,
        &ctx(Some("exact"), Some("base"), Some("USDC"), RoutingEndpoint::Settle),
    );
    assert_eq!(decision.connection_name, "A");
    assert_eq!(decision.rule_name, "base-usdc");
}

#[test]
fn polygon_context_falls_through_to_default() {
    let ruleset = compile_document(BASE_USDC_RULESET).unwrap();
    let decision = evaluate(
        &ruleset,
        &ctx(Some("exact"), Some("polygon"), None, RoutingEndpoint::Settle),
    );
    assert_eq!(decision.connection_name, "B");
    assert_eq!(decision.rule_name, "default");
}

#[test]
fn zero_rule_ruleset_always_selects_default() {
    let ruleset = compile_document("default: only\n").unwrap();
    let decision = evaluate(
        &ruleset,
        &ctx(Some("exact"), Some("base"), None, RoutingEndpoint::Verify),
    );
    assert_eq!(decision.connection_name, "only");
    assert_eq!(decision.rule_name, "default");
}

#[test]
fn order_decides_between_two_matching_rules() {
    let doc = r#"
default: C
rules:
  - name: wins
    when:
      eq: [scheme, exact]
    then:
      use: A
  - name: shadowed
    when:
      in: [scheme, [exact, upto]]
    then:
      use: B
"#;
    let ruleset = compile_document(doc).unwrap();
    let decision = evaluate(&ruleset, &ctx(Some("exact"), None, None, RoutingEndpoint::Verify));
    assert_eq!(decision.connection_name, "A");
    assert_eq!(decision.rule_name, "wins");
}

#[test]
fn endpoint_is_a_routable_context_key() {
    let doc = r#"
default: reads
rules:
  - name: settlement-traffic
    when:
      eq: [endpoint, settle]
    then:
      use: writes
"#;
    let ruleset = compile_document(doc).unwrap();
    assert_eq!(
        evaluate(&ruleset, &ctx(Some("exact"), None, None, RoutingEndpoint::Settle)).connection_name,
        "writes"
    );
    assert_eq!(
        evaluate(&ruleset, &ctx(Some("exact"), None, None, RoutingEndpoint::Verify)).connection_name,
        "reads"
    );
}

#[test]
fn numeric_bounds_compare_as_numbers_not_strings() {
    let doc = r#"
default: small
rules:
  - name: large
    when:
      gte: [amount, 1000]
    then:
      use: big
"#;
    let ruleset = compile_document(doc).unwrap();

    let mut context = ctx(Some("exact"), None, None, RoutingEndpoint::Settle);
    context.amount = Some("999".to_string());
    assert_eq!(evaluate(&ruleset, &context).connection_name, "small");

    // "2000" < "999" lexicographically; numerically it crosses the bound
    context.amount = Some("2000".to_string());
    assert_eq!(evaluate(&ruleset, &context).connection_name, "big");
}

#[test]
fn duplicate_rule_names_are_all_reported() {
    let doc = r#"
default: d
rules:
  - name: twice
    when:
      eq: [scheme, exact]
    then:
      use: a
  - name: twice
    when:
      eq: [scheme, exact]
    then:
      use: b
  - name: twice
    when:
      eq: [scheme, exact]
    then:
      use: c
"#;
    let err = compile_document(doc).unwrap_err();
    match err {
        RulesetError::Validation(issues) => {
            let duplicates: Vec<&String> = issues
                .iter()
                .filter(|i| i.contains("duplicate rule name"))
                .collect();
            assert_eq!(duplicates.len(), 2);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn unknown_top_level_key_is_a_validation_error() {
    let doc = "default: a\nextra: nope\n";
    let err = compile_document(doc).unwrap_err();
    assert!(matches!(err, RulesetError::Validation(_)));
    assert!(err.issues().iter().any(|i| i.contains("unknown key \"extra\"")));
}

#[test]
fn missing_default_is_a_validation_error() {
    let doc = "rules: []\n";
    let err = compile_document(doc).unwrap_err();
    assert!(err.issues().iter().any(|i| i.contains("default: required")));
}

#[test]
fn compiled_ruleset_reevaluates_identically() {
    let ruleset = compile_document(BASE_USDC_RULESET).unwrap();
    let context = ctx(Some("exact"), Some("base"), Some("USDC"), RoutingEndpoint::Settle);

    let first = evaluate(&ruleset, &context);
    for _ in 0..50 {
        assert_eq!(evaluate(&ruleset, &context), first);
    }
}
