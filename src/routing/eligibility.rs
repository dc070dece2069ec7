use crate::domain::connection::{CapabilityStatus, Provider};
use crate::domain::x402::{SchemeSupport, SupportedResponse};
use crate::routing::context::RoutingContext;
use uuid::Uuid;

/// An enabled connection joined with its last-known capability, as loaded
/// for one routing pass.
#[derive(Debug, Clone)]
pub struct CandidateConnection {
    pub id: Uuid,
    pub name: String,
    pub provider: Provider,
    pub credentials_enc: serde_json::Value,
    pub capability_status: CapabilityStatus,
    pub supported: Option<SupportedResponse>,
}

/// Retains candidates whose capability is healthy and covers the request's
/// scheme/network. A connection with no capability row, or one in
/// `unknown`/`error`, is never eligible. Order is load order.
pub fn filter_eligible(
    candidates: Vec<CandidateConnection>,
    context: &RoutingContext,
) -> Vec<CandidateConnection> {
    candidates
        .into_iter()
        .filter(|candidate| {
            candidate.capability_status == CapabilityStatus::Ok
                && candidate
                    .supported
                    .as_ref()
                    .is_some_and(|supported| supports_context(supported, context))
        })
        .collect()
}

fn supports_context(supported: &SupportedResponse, context: &RoutingContext) -> bool {
    let scheme = match context.scheme.as_deref() {
        Some(s) => s,
        None => return false,
    };

    let entry = match supported.schemes.iter().find(|e| e.scheme == scheme) {
        Some(e) => e,
        None => return false,
    };

    let network = match context.network.as_deref() {
        Some(n) => n,
        None => return true,
    };

    // an empty network list declares support for all networks
    entry.networks.is_empty() || entry.networks.iter().any(|n| n == network)
}

/// Union of capabilities across connections: schemes sorted
/// lexicographically, networks deduplicated and sorted per scheme.
pub fn aggregate_supported<'a>(
    capabilities: impl IntoIterator<Item = &'a SupportedResponse>,
) -> SupportedResponse {
    let mut by_scheme: Vec<(String, Vec<String>)> = Vec::new();

    for capability in capabilities {
        for entry in &capability.schemes {
            match by_scheme.iter_mut().find(|(scheme, _)| *scheme == entry.scheme) {
                Some((_, networks)) => {
                    for network in &entry.networks {
                        if !networks.contains(network) {
                            networks.push(network.clone());
                        }
                    }
                }
                None => by_scheme.push((entry.scheme.clone(), entry.networks.clone())),
            }
        }
    }

    by_scheme.sort_by(|a, b| a.0.cmp(&b.0));

    SupportedResponse {
        schemes: by_scheme
            .into_iter()
            .map(|(scheme, mut networks)| {
                networks.sort();
                networks.dedup();
                SchemeSupport { scheme, networks }
            })
            .collect(),
    }
}
