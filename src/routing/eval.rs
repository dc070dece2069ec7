use crate::routing::context::RoutingContext;
use crate::routing::dsl::{CompiledRuleset, Expr, Predicate, PredicateOp, PredicateValue};

pub const DEFAULT_RULE_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Decision {
    #[serde(rename = "connectionName")]
    pub connection_name: String,
    #[serde(rename = "ruleName")]
    pub rule_name: String,
}

/// First-match-wins over the rules in document order; the default
/// connection when nothing matches. Pure and deterministic.
pub fn evaluate(ruleset: &CompiledRuleset, context: &RoutingContext) -> Decision {
    for rule in &ruleset.rules {
        if evaluate_expr(&rule.when, context) {
            return Decision {
                connection_name: rule.target.clone(),
                rule_name: rule.name.clone(),
            };
        }
    }

    Decision {
        connection_name: ruleset.default.clone(),
        rule_name: DEFAULT_RULE_NAME.to_string(),
    }
}

fn evaluate_expr(expr: &Expr, context: &RoutingContext) -> bool {
    match expr {
        Expr::All(children) => children.iter().all(|c| evaluate_expr(c, context)),
        Expr::Any(children) => children.iter().any(|c| evaluate_expr(c, context)),
        Expr::Not(child) => !evaluate_expr(child, context),
        Expr::Predicate(predicate) => evaluate_predicate(predicate, context),
    }
}

/// An absent context field makes every predicate referencing it false.
fn evaluate_predicate(predicate: &Predicate, context: &RoutingContext) -> bool {
    let context_value = match context.get(predicate.key) {
        Some(v) => v,
        None => return false,
    };

    match (predicate.op, &predicate.value) {
        (PredicateOp::Eq, PredicateValue::One(literal)) => context_value == literal.normalized(),
        (PredicateOp::In, PredicateValue::Many(literals)) => literals
            .iter()
            .any(|literal| context_value == literal.normalized()),
        (PredicateOp::Lte, PredicateValue::One(literal)) => {
            match (coerce_number(context_value), literal.as_number()) {
                (Some(left), Some(right)) => left <= right,
                _ => false,
            }
        }
        (PredicateOp::Gte, PredicateValue::One(literal)) => {
            match (coerce_number(context_value), literal.as_number()) {
                (Some(left), Some(right)) => left >= right,
                _ => false,
            }
        }
        // compiler never produces these pairings
        _ => false,
    }
}

fn coerce_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::RoutingEndpoint;
    use crate::routing::dsl::compile_document;

    fn context(network: Option<&str>, asset: Option<&str>, amount: Option<&str>) -> RoutingContext {
        RoutingContext {
            scheme: Some("exact".to_string()),
            network: network.map(str::to_string),
            asset: asset.map(str::to_string),
            amount: amount.map(str::to_string),
            pay_to: None,
            endpoint: RoutingEndpoint::Settle,
        }
    }

    #[test]
    fn first_matching_rule_wins_in_document_order() {
        let doc = r#"
default: fallback
rules:
  - name: first
    when:
      eq: [scheme, exact]
    then:
      use: a
  - name: second
    when:
      eq: [scheme, exact]
    then:
      use: b
"#;
        let ruleset = compile_document(doc).unwrap();
        let decision = evaluate(&ruleset, &context(None, None, None));
        assert_eq!(decision.connection_name, "a");
        assert_eq!(decision.rule_name, "first");
    }

    #[test]
    fn absent_context_field_fails_predicate_without_panicking() {
        let doc = r#"
default: fallback
rules:
  - name: by-network
    when:
      eq: [network, base]
    then:
      use: a
  - name: negated
    when:
      not:
        eq: [network, base]
    then:
      use: b
"#;
        let ruleset = compile_document(doc).unwrap();
        // absent network: eq fails, so `not` matches
        let decision = evaluate(&ruleset, &context(None, None, None));
        assert_eq!(decision.connection_name, "b");
        assert_eq!(decision.rule_name, "negated");
    }

    #[test]
    fn numeric_comparison_fails_on_uncoercible_context() {
        let doc = r#"
default: fallback
rules:
  - name: small
    when:
      lte: [amount, 100]
    then:
      use: a
"#;
        let ruleset = compile_document(doc).unwrap();
        let hit = evaluate(&ruleset, &context(None, None, Some("99.5")));
        assert_eq!(hit.connection_name, "a");
        let miss = evaluate(&ruleset, &context(None, None, Some("lots")));
        assert_eq!(miss.connection_name, "fallback");
        assert_eq!(miss.rule_name, "default");
    }

    #[test]
    fn in_matches_any_normalized_element() {
        let doc = r#"
default: fallback
rules:
  - name: networks
    when:
      in: [network, [base, polygon]]
    then:
      use: a
"#;
        let ruleset = compile_document(doc).unwrap();
        assert_eq!(
            evaluate(&ruleset, &context(Some("polygon"), None, None)).connection_name,
            "a"
        );
        assert_eq!(
            evaluate(&ruleset, &context(Some("solana"), None, None)).connection_name,
            "fallback"
        );
    }

    #[test]
    fn evaluation_is_deterministic_for_repeated_calls() {
        let doc = r#"
default: fallback
rules:
  - name: combo
    when:
      all:
        - eq: [scheme, exact]
        - any:
            - eq: [network, base]
            - gte: [amount, 1000]
    then:
      use: a
"#;
        let ruleset = compile_document(doc).unwrap();
        let ctx = context(Some("base"), None, Some("5"));
        let first = evaluate(&ruleset, &ctx);
        for _ in 0..10 {
            assert_eq!(evaluate(&ruleset, &ctx), first);
        }
    }
}
