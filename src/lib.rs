pub mod auth {
    pub mod api_keys;
}
pub mod config;
pub mod crypto;
pub mod domain {
    pub mod connection;
    pub mod decision;
    pub mod settlement;
    pub mod x402;
}
pub mod error;
pub mod facilitators;
pub mod http {
    pub mod handlers {
        pub mod connections;
        pub mod decisions;
        pub mod facilitator;
        pub mod internal;
        pub mod ops;
        pub mod rulesets;
    }
    pub mod middleware {
        pub mod admin_auth;
        pub mod api_key_auth;
        pub mod rate_limit;
    }
}
pub mod repo {
    pub mod api_keys_repo;
    pub mod connections_repo;
    pub mod decisions_repo;
    pub mod rulesets_repo;
    pub mod settlements_repo;
}
pub mod routing {
    pub mod context;
    pub mod dsl;
    pub mod eligibility;
    pub mod eval;
    pub mod fingerprint;
}
pub mod service {
    pub mod capability_service;
    pub mod reconciler;
    pub mod router_service;
}

#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub router_service: service::router_service::RouterService,
    pub capability_service: service::capability_service::CapabilityService,
    pub reconciler: service::reconciler::Reconciler,
    pub connections_repo: repo::connections_repo::ConnectionsRepo,
    pub rulesets_repo: repo::rulesets_repo::RulesetsRepo,
    pub decisions_repo: repo::decisions_repo::DecisionsRepo,
    pub cipher: crypto::CredentialCipher,
    pub redis_client: redis::Client,
}
