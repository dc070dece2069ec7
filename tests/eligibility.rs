use route402::domain::connection::{CapabilityStatus, Provider};
use route402::domain::decision::RoutingEndpoint;
use route402::domain::x402::{SchemeSupport, SupportedResponse};
use route402::routing::context::RoutingContext;
use route402::routing::eligibility::{aggregate_supported, filter_eligible, CandidateConnection};
use uuid::Uuid;

fn supported(entries: &[(&str, &[&str])]) -> SupportedResponse {
    SupportedResponse {
        schemes: entries
            .iter()
            .map(|(scheme, networks)| SchemeSupport {
                scheme: scheme.to_string(),
                networks: networks.iter().map(|n| n.to_string()).collect(),
            })
            .collect(),
    }
}

fn candidate(
    name: &str,
    status: CapabilityStatus,
    capability: Option<SupportedResponse>,
) -> CandidateConnection {
    CandidateConnection {
        id: Uuid::new_v4(),
        name: name.to_string(),
        provider: Provider::Mock,
        credentials_enc: serde_json::json!({}),
        capability_status: status,
        supported: capability,
    }
}

fn ctx(scheme: &str, network: Option<&str>) -> RoutingContext {
    RoutingContext {
        scheme: Some(scheme.to_string()),
        network: network.map(str::to_string),
        asset: None,
        amount: None,
        pay_to: None,
        endpoint: RoutingEndpoint::Settle,
    }
}

#[test]
fn error_status_and_missing_capability_are_never_eligible() {
    let cap = supported(&[("exact", &["base"])]);
    let candidates = vec![
        candidate("healthy", CapabilityStatus::Ok, Some(cap.clone())),
        candidate("errored", CapabilityStatus::Error, Some(cap.clone())),
        candidate("unchecked", CapabilityStatus::Unknown, Some(cap)),
        candidate("bare", CapabilityStatus::Ok, None),
    ];

    let eligible = filter_eligible(candidates, &ctx("exact", Some("base")));
    let names: Vec<&str> = eligible.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["healthy"]);
}

#[test]
fn scheme_must_match() {
    let candidates = vec![candidate(
        "exact-only",
        CapabilityStatus::Ok,
        Some(supported(&[("exact", &[])])),
    )];
    assert!(filter_eligible(candidates.clone(), &ctx("upto", None)).is_empty());
    assert_eq!(filter_eligible(candidates, &ctx("exact", None)).len(), 1);
}

#[test]
fn empty_network_list_means_all_networks() {
    let candidates = vec![candidate(
        "wildcard",
        CapabilityStatus::Ok,
        Some(supported(&[("exact", &[])])),
    )];
    let eligible = filter_eligible(candidates, &ctx("exact", Some("some-obscure-net")));
    assert_eq!(eligible.len(), 1);
}

#[test]
fn declared_networks_are_enforced() {
    let candidates = vec![candidate(
        "base-only",
        CapabilityStatus::Ok,
        Some(supported(&[("exact", &["base"])])),
    )];
    assert!(filter_eligible(candidates.clone(), &ctx("exact", Some("polygon"))).is_empty());
    assert_eq!(
        filter_eligible(candidates, &ctx("exact", Some("base"))).len(),
        1
    );
}

#[test]
fn requests_without_network_only_need_the_scheme() {
    let candidates = vec![candidate(
        "base-only",
        CapabilityStatus::Ok,
        Some(supported(&[("exact", &["base"])])),
    )];
    assert_eq!(filter_eligible(candidates, &ctx("exact", None)).len(), 1);
}

#[test]
fn load_order_is_preserved() {
    let cap = supported(&[("exact", &[])]);
    let candidates = vec![
        candidate("first", CapabilityStatus::Ok, Some(cap.clone())),
        candidate("second", CapabilityStatus::Ok, Some(cap)),
    ];
    let names: Vec<String> = filter_eligible(candidates, &ctx("exact", None))
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn aggregation_unions_networks_and_sorts() {
    let a = supported(&[("exact", &["base"])]);
    let b = supported(&[("exact", &["base", "polygon"])]);

    let aggregated = aggregate_supported([&a, &b]);
    assert_eq!(aggregated.schemes.len(), 1);
    assert_eq!(aggregated.schemes[0].scheme, "exact");
    assert_eq!(aggregated.schemes[0].networks, vec!["base", "polygon"]);
}

#[test]
fn aggregation_sorts_schemes_lexicographically() {
    let a = supported(&[("upto", &["base"])]);
    let b = supported(&[("exact", &["base-sepolia"])]);

    let aggregated = aggregate_supported([&a, &b]);
    let schemes: Vec<&str> = aggregated.schemes.iter().map(|s| s.scheme.as_str()).collect();
    assert_eq!(schemes, vec!["exact", "upto"]);
}

#[test]
fn aggregation_of_nothing_is_empty() {
    let aggregated = aggregate_supported(std::iter::empty::<&SupportedResponse>());
    assert!(aggregated.schemes.is_empty());
}
