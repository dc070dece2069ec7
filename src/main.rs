use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use route402::config::AppConfig;
use route402::crypto::CredentialCipher;
use route402::facilitators::{AdapterRegistry, AdapterTimeouts};
use route402::http::middleware::api_key_auth::ApiKeyAuthState;
use route402::http::middleware::rate_limit::RateLimitState;
use route402::repo::api_keys_repo::ApiKeysRepo;
use route402::repo::connections_repo::ConnectionsRepo;
use route402::repo::decisions_repo::DecisionsRepo;
use route402::repo::rulesets_repo::RulesetsRepo;
use route402::repo::settlements_repo::SettlementsRepo;
use route402::service::capability_service::CapabilityService;
use route402::service::reconciler::Reconciler;
use route402::service::router_service::RouterService;
use route402::AppState;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;

    let cipher = CredentialCipher::from_base64(&cfg.master_key_base64)?;

    let connections_repo = ConnectionsRepo { pool: pool.clone() };
    let rulesets_repo = RulesetsRepo { pool: pool.clone() };
    let settlements_repo = SettlementsRepo { pool: pool.clone() };
    let decisions_repo = DecisionsRepo { pool: pool.clone() };
    let api_keys_repo = ApiKeysRepo { pool: pool.clone() };

    let adapters = AdapterRegistry::new(
        reqwest::Client::new(),
        AdapterTimeouts::from_millis(cfg.verify_timeout_ms, cfg.settle_timeout_ms),
    );

    let router_service = RouterService {
        connections_repo: connections_repo.clone(),
        rulesets_repo: rulesets_repo.clone(),
        settlements_repo: settlements_repo.clone(),
        decisions_repo: decisions_repo.clone(),
        adapters: adapters.clone(),
        cipher: cipher.clone(),
        verify_timeout: Duration::from_millis(cfg.verify_timeout_ms),
        settle_timeout: Duration::from_millis(cfg.settle_timeout_ms),
    };

    let capability_service = CapabilityService {
        connections_repo: connections_repo.clone(),
        adapters: adapters.clone(),
        cipher: cipher.clone(),
    };

    let reconciler = Reconciler {
        settlements_repo: settlements_repo.clone(),
        connections_repo: connections_repo.clone(),
        adapters,
        cipher: cipher.clone(),
        settle_timeout: Duration::from_millis(cfg.settle_timeout_ms),
    };

    tokio::spawn(
        reconciler
            .clone()
            .run(Duration::from_secs(cfg.reconcile_interval_secs)),
    );
    tokio::spawn(
        capability_service
            .clone()
            .run(Duration::from_secs(cfg.capability_refresh_interval_secs)),
    );

    let state = AppState {
        pool,
        router_service,
        capability_service,
        reconciler,
        connections_repo,
        rulesets_repo,
        decisions_repo,
        cipher,
        redis_client,
    };

    let facilitator_routes = Router::new()
        .route(
            "/facilitator/verify",
            post(route402::http::handlers::facilitator::verify),
        )
        .route(
            "/facilitator/settle",
            post(route402::http::handlers::facilitator::settle),
        )
        .route(
            "/facilitator/supported",
            get(route402::http::handlers::facilitator::supported),
        )
        .layer(from_fn_with_state(
            ApiKeyAuthState { api_keys_repo },
            route402::http::middleware::api_key_auth::authenticate,
        ));

    let admin_key = cfg.internal_api_key.clone();
    let admin_routes = Router::new()
        .route(
            "/tenants/:tenant_id/connections",
            get(route402::http::handlers::connections::list_connections)
                .post(route402::http::handlers::connections::create_connection),
        )
        .route(
            "/tenants/:tenant_id/connections/:connection_id",
            patch(route402::http::handlers::connections::update_connection),
        )
        .route(
            "/tenants/:tenant_id/connections/:connection_id/test",
            post(route402::http::handlers::connections::test_connection),
        )
        .route(
            "/tenants/:tenant_id/rulesets/active",
            get(route402::http::handlers::rulesets::get_active_ruleset),
        )
        .route(
            "/tenants/:tenant_id/rulesets/validate",
            post(route402::http::handlers::rulesets::validate_ruleset),
        )
        .route(
            "/tenants/:tenant_id/rulesets/dry-run",
            post(route402::http::handlers::rulesets::dry_run_ruleset),
        )
        .route(
            "/tenants/:tenant_id/rulesets",
            post(route402::http::handlers::rulesets::activate_ruleset),
        )
        .route(
            "/tenants/:tenant_id/decisions",
            get(route402::http::handlers::decisions::list_decisions),
        )
        .route(
            "/internal/reconcile",
            post(route402::http::handlers::internal::reconcile_sweep),
        )
        .route(
            "/internal/capabilities/refresh",
            post(route402::http::handlers::internal::capability_refresh_sweep),
        )
        .layer(from_fn_with_state(
            admin_key,
            route402::http::middleware::admin_auth::require_internal_api_key,
        ));

    let app = Router::new()
        .route("/health", get(route402::http::handlers::ops::health))
        .route("/ops/readiness", get(route402::http::handlers::ops::readiness))
        .route("/ops/liveness", get(route402::http::handlers::ops::liveness))
        .merge(facilitator_routes)
        .merge(admin_routes)
        .layer(from_fn_with_state(
            RateLimitState {
                redis_client: redis::Client::open(cfg.redis_url.clone())?,
                max_per_minute: cfg.rate_limit_per_minute,
            },
            route402::http::middleware::rate_limit::enforce,
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
