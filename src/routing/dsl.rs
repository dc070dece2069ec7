use crate::routing::context::ContextKey;
use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesetError {
    /// The document is not parseable YAML. Carries the parser message.
    #[error("invalid ruleset document: {0}")]
    Document(String),
    /// The document parsed but violates the schema. One message per
    /// violation, each prefixed with the offending path.
    #[error("ruleset validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

impl RulesetError {
    pub fn issues(&self) -> Vec<String> {
        match self {
            RulesetError::Document(msg) => vec![msg.clone()],
            RulesetError::Validation(issues) => issues.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Scalar {
    /// String normalization used by eq/in comparisons. Integral floats
    /// render without a fractional part, matching how literals written as
    /// `5` and `5.0` must compare equal to the context string "5".
    pub fn normalized(&self) -> String {
        match self {
            Scalar::Str(s) => s.clone(),
            Scalar::Num(n) => format!("{}", n),
            Scalar::Bool(b) => {
                if *b {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Num(n) if n.is_finite() => Some(*n),
            Scalar::Str(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Eq,
    In,
    Lte,
    Gte,
}

#[derive(Debug, Clone)]
pub enum PredicateValue {
    One(Scalar),
    Many(Vec<Scalar>),
}

#[derive(Debug, Clone)]
pub struct Predicate {
    pub op: PredicateOp,
    pub key: ContextKey,
    pub value: PredicateValue,
}

/// Compiled condition tree. Construction is total: every document that
/// passes validation maps to exactly one tree shape.
#[derive(Debug, Clone)]
pub enum Expr {
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Not(Box<Expr>),
    Predicate(Predicate),
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub target: String,
    pub when: Expr,
}

#[derive(Debug, Clone)]
pub struct CompiledRuleset {
    pub version: Option<i64>,
    pub default: String,
    pub rules: Vec<CompiledRule>,
}

const EXPR_OPS: &str = "all/any/not/eq/in/lte/gte";

/// Parse, validate and compile a YAML ruleset document.
pub fn compile_document(text: &str) -> Result<CompiledRuleset, RulesetError> {
    if text.trim().is_empty() {
        return Err(RulesetError::Document("document is empty".to_string()));
    }

    let root: Value =
        serde_yaml::from_str(text).map_err(|e| RulesetError::Document(e.to_string()))?;

    let mut issues: Vec<String> = Vec::new();

    let mapping = match root.as_mapping() {
        Some(m) => m,
        None => {
            return Err(RulesetError::Validation(vec![
                "ruleset: expected a mapping".to_string(),
            ]))
        }
    };

    let mut version: Option<i64> = None;
    let mut default: Option<String> = None;
    let mut rules_value: Option<&Value> = None;

    for (key, value) in mapping {
        match key.as_str() {
            Some("version") => match value.as_i64() {
                Some(v) => version = Some(v),
                None => issues.push("version: expected an integer".to_string()),
            },
            Some("default") => match value.as_str() {
                Some(s) if !s.is_empty() => default = Some(s.to_string()),
                _ => issues.push("default: expected a non-empty string".to_string()),
            },
            Some("rules") => rules_value = Some(value),
            Some(other) => issues.push(format!("ruleset: unknown key \"{}\"", other)),
            None => issues.push("ruleset: keys must be strings".to_string()),
        }
    }

    if default.is_none() && !issues.iter().any(|i| i.starts_with("default:")) {
        issues.push("default: required".to_string());
    }

    let mut rules: Vec<CompiledRule> = Vec::new();
    if let Some(value) = rules_value {
        match value.as_sequence() {
            Some(seq) => {
                // duplicates are detected on the raw names so every
                // occurrence is reported even when the rule has other
                // violations
                let mut seen: Vec<String> = Vec::new();
                for (i, entry) in seq.iter().enumerate() {
                    if let Some(name) = raw_rule_name(entry) {
                        if seen.iter().any(|s| s == name) {
                            issues.push(format!(
                                "rules[{}].name: duplicate rule name \"{}\"",
                                i, name
                            ));
                        } else {
                            seen.push(name.to_string());
                        }
                    }
                    if let Some(rule) = compile_rule(entry, i, &mut issues) {
                        rules.push(rule);
                    }
                }
            }
            None => issues.push("rules: expected a list".to_string()),
        }
    }

    if !issues.is_empty() {
        return Err(RulesetError::Validation(issues));
    }

    Ok(CompiledRuleset {
        version,
        // unwrap is unreachable: a missing default was recorded as an issue
        default: default.unwrap_or_default(),
        rules,
    })
}

fn raw_rule_name(entry: &Value) -> Option<&str> {
    entry.as_mapping().and_then(|m| {
        m.iter()
            .find(|(k, _)| k.as_str() == Some("name"))
            .and_then(|(_, v)| v.as_str())
    })
}

fn compile_rule(value: &Value, index: usize, issues: &mut Vec<String>) -> Option<CompiledRule> {
    let path = format!("rules[{}]", index);
    let mapping = match value.as_mapping() {
        Some(m) => m,
        None => {
            issues.push(format!("{}: expected a mapping", path));
            return None;
        }
    };

    let mut name: Option<String> = None;
    let mut when: Option<Expr> = None;
    let mut target: Option<String> = None;

    for (key, entry) in mapping {
        match key.as_str() {
            Some("name") => match entry.as_str() {
                Some(s) if !s.is_empty() => name = Some(s.to_string()),
                _ => issues.push(format!("{}.name: expected a non-empty string", path)),
            },
            Some("when") => {
                when = compile_expr(entry, &format!("{}.when", path), issues);
            }
            Some("then") => {
                target = compile_then(entry, &path, issues);
            }
            Some(other) => issues.push(format!("{}: unknown key \"{}\"", path, other)),
            None => issues.push(format!("{}: keys must be strings", path)),
        }
    }

    if name.is_none() && !issues.iter().any(|i| i.starts_with(&format!("{}.name", path))) {
        issues.push(format!("{}.name: required", path));
    }
    if when.is_none() && !issues.iter().any(|i| i.starts_with(&format!("{}.when", path))) {
        issues.push(format!("{}.when: required", path));
    }
    if target.is_none() && !issues.iter().any(|i| i.starts_with(&format!("{}.then", path))) {
        issues.push(format!("{}.then: required", path));
    }

    Some(CompiledRule {
        name: name?,
        target: target?,
        when: when?,
    })
}

fn compile_then(value: &Value, rule_path: &str, issues: &mut Vec<String>) -> Option<String> {
    let path = format!("{}.then", rule_path);
    let mapping = match value.as_mapping() {
        Some(m) => m,
        None => {
            issues.push(format!("{}: expected a mapping", path));
            return None;
        }
    };

    let mut target: Option<String> = None;
    for (key, entry) in mapping {
        match key.as_str() {
            Some("use") => match entry.as_str() {
                Some(s) if !s.is_empty() => target = Some(s.to_string()),
                _ => issues.push(format!("{}.use: expected a non-empty string", path)),
            },
            Some(other) => issues.push(format!("{}: unknown key \"{}\"", path, other)),
            None => issues.push(format!("{}: keys must be strings", path)),
        }
    }

    if target.is_none() && !issues.iter().any(|i| i.starts_with(&format!("{}.use", path))) {
        issues.push(format!("{}.use: required", path));
    }

    target
}

fn compile_expr(value: &Value, path: &str, issues: &mut Vec<String>) -> Option<Expr> {
    let mapping = match value.as_mapping() {
        Some(m) => m,
        None => {
            issues.push(format!("{}: expected a mapping with one of {}", path, EXPR_OPS));
            return None;
        }
    };

    if mapping.len() != 1 {
        issues.push(format!(
            "{}: expected exactly one of {}, found {} keys",
            path,
            EXPR_OPS,
            mapping.len()
        ));
        return None;
    }

    let (key, operand) = mapping.iter().next()?;
    let op = match key.as_str() {
        Some(op) => op,
        None => {
            issues.push(format!("{}: operator must be a string key", path));
            return None;
        }
    };

    match op {
        "all" | "any" => {
            let children_path = format!("{}.{}", path, op);
            let seq = match operand.as_sequence() {
                Some(seq) if !seq.is_empty() => seq,
                Some(_) => {
                    issues.push(format!("{}: expected a non-empty list", children_path));
                    return None;
                }
                None => {
                    issues.push(format!("{}: expected a list", children_path));
                    return None;
                }
            };
            let before = issues.len();
            let children: Vec<Expr> = seq
                .iter()
                .enumerate()
                .filter_map(|(i, child)| {
                    compile_expr(child, &format!("{}[{}]", children_path, i), issues)
                })
                .collect();
            if issues.len() > before {
                return None;
            }
            if op == "all" {
                Some(Expr::All(children))
            } else {
                Some(Expr::Any(children))
            }
        }
        "not" => {
            let child = compile_expr(operand, &format!("{}.not", path), issues)?;
            Some(Expr::Not(Box::new(child)))
        }
        "eq" | "lte" | "gte" => {
            let (context_key, operand_value) =
                predicate_operands(operand, &format!("{}.{}", path, op), issues)?;
            let scalar = match scalar_from(operand_value) {
                Some(s) => s,
                None => {
                    issues.push(format!("{}.{}: operand must be a scalar", path, op));
                    return None;
                }
            };
            let pred_op = match op {
                "eq" => PredicateOp::Eq,
                "lte" => PredicateOp::Lte,
                _ => PredicateOp::Gte,
            };
            if pred_op != PredicateOp::Eq && scalar.as_number().is_none() {
                issues.push(format!("{}.{}: operand must be a number", path, op));
                return None;
            }
            Some(Expr::Predicate(Predicate {
                op: pred_op,
                key: context_key,
                value: PredicateValue::One(scalar),
            }))
        }
        "in" => {
            let (context_key, operand_value) =
                predicate_operands(operand, &format!("{}.in", path), issues)?;
            let seq = match operand_value.as_sequence() {
                Some(seq) if !seq.is_empty() => seq,
                _ => {
                    issues.push(format!("{}.in: operand must be a non-empty list", path));
                    return None;
                }
            };
            let mut elements = Vec::with_capacity(seq.len());
            for (i, element) in seq.iter().enumerate() {
                match scalar_from(element) {
                    Some(s) => elements.push(s),
                    None => {
                        issues.push(format!("{}.in[{}]: element must be a scalar", path, i));
                        return None;
                    }
                }
            }
            Some(Expr::Predicate(Predicate {
                op: PredicateOp::In,
                key: context_key,
                value: PredicateValue::Many(elements),
            }))
        }
        other => {
            issues.push(format!("{}: unknown operator \"{}\"", path, other));
            None
        }
    }
}

/// Predicates are written as a two-element list: `[contextKey, operand]`.
fn predicate_operands<'a>(
    value: &'a Value,
    path: &str,
    issues: &mut Vec<String>,
) -> Option<(ContextKey, &'a Value)> {
    let seq = match value.as_sequence() {
        Some(seq) if seq.len() == 2 => seq,
        _ => {
            issues.push(format!("{}: expected [key, value]", path));
            return None;
        }
    };

    let key = match seq[0].as_str().and_then(ContextKey::parse) {
        Some(key) => key,
        None => {
            issues.push(format!(
                "{}: unknown context key {:?}",
                path,
                seq[0].as_str().unwrap_or("<non-string>")
            ));
            return None;
        }
    };

    Some((key, &seq[1]))
}

fn scalar_from(value: &Value) -> Option<Scalar> {
    match value {
        Value::String(s) => Some(Scalar::Str(s.clone())),
        Value::Bool(b) => Some(Scalar::Bool(*b)),
        Value::Number(n) => n.as_f64().map(Scalar::Num),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_document() {
        let doc = "default: primary\n";
        let compiled = compile_document(doc).unwrap();
        assert_eq!(compiled.default, "primary");
        assert!(compiled.rules.is_empty());
    }

    #[test]
    fn rejects_malformed_yaml_as_document_error() {
        let err = compile_document("default: [unclosed").unwrap_err();
        assert!(matches!(err, RulesetError::Document(_)));
    }

    #[test]
    fn collects_every_violation_with_paths() {
        let doc = r#"
default: primary
rules:
  - name: a
    when:
      eq: [scheme, exact]
    then:
      use: primary
  - name: a
    when:
      lte: [amount, not-a-number]
    then:
      use: primary
"#;
        let err = compile_document(doc).unwrap_err();
        let issues = err.issues();
        assert!(issues.iter().any(|i| i.contains("rules[1].when.lte")));
        assert!(issues.iter().any(|i| i.contains("duplicate rule name \"a\"")));
    }

    #[test]
    fn rejects_unknown_context_key() {
        let doc = r#"
default: primary
rules:
  - name: r
    when:
      eq: [color, blue]
    then:
      use: primary
"#;
        let err = compile_document(doc).unwrap_err();
        assert!(err.issues().iter().any(|i| i.contains("unknown context key")));
    }

    #[test]
    fn rejects_array_operand_for_eq() {
        let doc = r#"
default: primary
rules:
  - name: r
    when:
      eq: [network, [base, polygon]]
    then:
      use: primary
"#;
        let err = compile_document(doc).unwrap_err();
        assert!(err
            .issues()
            .iter()
            .any(|i| i.contains("operand must be a scalar")));
    }

    #[test]
    fn rejects_empty_all() {
        let doc = r#"
default: primary
rules:
  - name: r
    when:
      all: []
    then:
      use: primary
"#;
        let err = compile_document(doc).unwrap_err();
        assert!(err.issues().iter().any(|i| i.contains("non-empty list")));
    }
}
