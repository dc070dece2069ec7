use crate::domain::decision::RoutingEndpoint;
use crate::domain::x402::PaymentRequirements;

/// Context keys a rule predicate may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKey {
    Scheme,
    Network,
    Asset,
    Amount,
    PayTo,
    Endpoint,
}

impl ContextKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKey::Scheme => "scheme",
            ContextKey::Network => "network",
            ContextKey::Asset => "asset",
            ContextKey::Amount => "amount",
            ContextKey::PayTo => "payTo",
            ContextKey::Endpoint => "endpoint",
        }
    }

    pub fn parse(s: &str) -> Option<ContextKey> {
        match s {
            "scheme" => Some(ContextKey::Scheme),
            "network" => Some(ContextKey::Network),
            "asset" => Some(ContextKey::Asset),
            "amount" => Some(ContextKey::Amount),
            "payTo" => Some(ContextKey::PayTo),
            "endpoint" => Some(ContextKey::Endpoint),
            _ => None,
        }
    }
}

/// Built once per inbound request; immutable thereafter.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    pub scheme: Option<String>,
    pub network: Option<String>,
    pub asset: Option<String>,
    pub amount: Option<String>,
    pub pay_to: Option<String>,
    pub endpoint: RoutingEndpoint,
}

impl RoutingContext {
    pub fn get(&self, key: ContextKey) -> Option<&str> {
        match key {
            ContextKey::Scheme => self.scheme.as_deref(),
            ContextKey::Network => self.network.as_deref(),
            ContextKey::Asset => self.asset.as_deref(),
            ContextKey::Amount => self.amount.as_deref(),
            ContextKey::PayTo => self.pay_to.as_deref(),
            ContextKey::Endpoint => Some(self.endpoint.as_str()),
        }
    }
}

pub fn build_routing_context(
    requirements: &PaymentRequirements,
    endpoint: RoutingEndpoint,
) -> RoutingContext {
    RoutingContext {
        scheme: Some(requirements.scheme.clone()),
        network: requirements.network.clone(),
        asset: requirements.asset.clone(),
        amount: requirements.amount.clone(),
        pay_to: requirements.pay_to.clone(),
        endpoint,
    }
}
