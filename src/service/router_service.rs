use crate::crypto::{CredentialCipher, EncryptedPayload};
use crate::domain::connection::{CapabilityStatus, Connection, Provider};
use crate::domain::decision::{DecisionRecord, RoutingEndpoint};
use crate::domain::settlement::{SettlementRow, SettlementStatus};
use crate::domain::x402::{SettleOutcome, SettleRequest, SupportedResponse, VerifyOutcome, VerifyRequest};
use crate::error::ApiError;
use crate::facilitators::{AdapterContext, AdapterError, AdapterRegistry};
use crate::repo::connections_repo::ConnectionsRepo;
use crate::repo::decisions_repo::DecisionsRepo;
use crate::repo::rulesets_repo::RulesetsRepo;
use crate::repo::settlements_repo::SettlementsRepo;
use crate::routing::context::{build_routing_context, RoutingContext};
use crate::routing::dsl::{compile_document, CompiledRuleset};
use crate::routing::eligibility::{aggregate_supported, filter_eligible, CandidateConnection};
use crate::routing::eval::evaluate;
use crate::routing::fingerprint::fingerprint;
use serde_json::json;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const STICKY_RULE_NAME: &str = "sticky";

/// Echoed back to the caller in response headers.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    pub request_id: String,
    pub connection_name: String,
    pub rule_name: String,
}

#[derive(Debug, Clone)]
struct SelectedConnection {
    id: Uuid,
    name: String,
    provider: Provider,
    credentials_enc: serde_json::Value,
}

impl From<&CandidateConnection> for SelectedConnection {
    fn from(candidate: &CandidateConnection) -> Self {
        SelectedConnection {
            id: candidate.id,
            name: candidate.name.clone(),
            provider: candidate.provider,
            credentials_enc: candidate.credentials_enc.clone(),
        }
    }
}

impl From<Connection> for SelectedConnection {
    fn from(connection: Connection) -> Self {
        SelectedConnection {
            id: connection.id,
            name: connection.name,
            provider: connection.provider,
            credentials_enc: connection.credentials_enc,
        }
    }
}

#[derive(Clone)]
pub struct RouterService {
    pub connections_repo: ConnectionsRepo,
    pub rulesets_repo: RulesetsRepo,
    pub settlements_repo: SettlementsRepo,
    pub decisions_repo: DecisionsRepo,
    pub adapters: AdapterRegistry,
    pub cipher: CredentialCipher,
    pub verify_timeout: Duration,
    pub settle_timeout: Duration,
}

impl RouterService {
    pub async fn verify(
        &self,
        tenant_id: Uuid,
        req: VerifyRequest,
    ) -> Result<(VerifyOutcome, RouteMeta), ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        validate_requirements(&req.payment_requirements)?;

        let ruleset = self.load_compiled_ruleset(tenant_id).await?;
        let context = build_routing_context(&req.payment_requirements, RoutingEndpoint::Verify);

        let eligible = self.eligible_connections(tenant_id, &context).await?;
        if eligible.is_empty() {
            self.log(tenant_id, &request_id, RoutingEndpoint::Verify, None, None, None, started, false, Some("no_eligible_connections")).await;
            return Err(ApiError::NoEligibleConnections);
        }

        let decision = evaluate(&ruleset, &context);
        let primary = match eligible.iter().find(|c| c.name == decision.connection_name) {
            Some(candidate) => SelectedConnection::from(candidate),
            None => {
                self.log(tenant_id, &request_id, RoutingEndpoint::Verify, None, Some(&decision.rule_name), None, started, false, Some("no_route")).await;
                return Err(ApiError::NoRoute);
            }
        };

        let (outcome, used) = match self.dispatch_verify(tenant_id, &primary, &req).await {
            Ok(outcome) => (outcome, primary),
            Err(primary_err) => {
                tracing::warn!(
                    provider = primary.provider.as_str(),
                    connection = %primary.id,
                    error = %primary_err,
                    "verify dispatch failed, attempting fallback"
                );

                // verify only: one sequential attempt against a single
                // other eligible connection
                let fallback = eligible
                    .iter()
                    .find(|c| c.id != primary.id)
                    .map(SelectedConnection::from);

                match fallback {
                    Some(fallback) => match self.dispatch_verify(tenant_id, &fallback, &req).await {
                        Ok(outcome) => (outcome, fallback),
                        Err(fallback_err) => {
                            tracing::warn!(
                                provider = fallback.provider.as_str(),
                                connection = %fallback.id,
                                error = %fallback_err,
                                "verify fallback failed"
                            );
                            self.log(tenant_id, &request_id, RoutingEndpoint::Verify, Some(fallback.id), Some(&decision.rule_name), None, started, false, Some("upstream_error")).await;
                            return Err(ApiError::Upstream);
                        }
                    },
                    None => {
                        self.log(tenant_id, &request_id, RoutingEndpoint::Verify, Some(primary.id), Some(&decision.rule_name), None, started, false, Some("upstream_error")).await;
                        return Err(ApiError::Upstream);
                    }
                }
            }
        };

        let error_code = if outcome.is_valid { None } else { Some("verify_invalid") };
        self.log(tenant_id, &request_id, RoutingEndpoint::Verify, Some(used.id), Some(&decision.rule_name), None, started, outcome.is_valid, error_code).await;

        Ok((
            outcome,
            RouteMeta {
                request_id,
                connection_name: used.name,
                rule_name: decision.rule_name,
            },
        ))
    }

    pub async fn settle(
        &self,
        tenant_id: Uuid,
        req: SettleRequest,
    ) -> Result<(SettleOutcome, RouteMeta), ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        validate_requirements(&req.payment_requirements)?;

        let fp = fingerprint(&json!({
            "paymentPayload": &req.payment_payload,
            "paymentRequirements": &req.payment_requirements,
        }));

        let ruleset = self.load_compiled_ruleset(tenant_id).await?;
        let context = build_routing_context(&req.payment_requirements, RoutingEndpoint::Settle);

        let eligible = self.eligible_connections(tenant_id, &context).await?;
        if eligible.is_empty() {
            self.log(tenant_id, &request_id, RoutingEndpoint::Settle, None, None, Some(&fp), started, false, Some("no_eligible_connections")).await;
            return Err(ApiError::NoEligibleConnections);
        }

        let existing = self
            .settlements_repo
            .find(tenant_id, &fp)
            .await
            .map_err(ApiError::Internal)?;

        if let Some(row) = &existing {
            if row.status.is_terminal() {
                return self.answer_from_terminal_row(tenant_id, request_id, row, started).await;
            }
        }

        let (selected, rule_name) = match existing.as_ref().and_then(|row| row.connection_id) {
            // the fingerprint is already bound: dispatch to that
            // connection regardless of what the ruleset says today
            Some(bound_id) => {
                let connection = self.bound_connection(tenant_id, &request_id, &fp, bound_id, started).await?;
                (connection, STICKY_RULE_NAME.to_string())
            }
            None => {
                let decision = evaluate(&ruleset, &context);
                let candidate = match eligible.iter().find(|c| c.name == decision.connection_name) {
                    Some(candidate) => SelectedConnection::from(candidate),
                    None => {
                        self.log(tenant_id, &request_id, RoutingEndpoint::Settle, None, Some(&decision.rule_name), Some(&fp), started, false, Some("no_route")).await;
                        return Err(ApiError::NoRoute);
                    }
                };

                // stored alongside the state row so reconciliation can
                // replay the exact request
                let request_enc = self
                    .cipher
                    .encrypt(
                        tenant_id,
                        &serde_json::to_value(&req).map_err(anyhow::Error::from)?,
                    )
                    .map_err(|e| ApiError::Internal(e.into()))?
                    .to_json()
                    .map_err(|e| ApiError::Internal(e.into()))?;

                let inserted = self
                    .settlements_repo
                    .try_insert_pending(tenant_id, &fp, candidate.id, request_enc)
                    .await
                    .map_err(ApiError::Internal)?;

                if inserted {
                    (candidate, decision.rule_name)
                } else {
                    // a concurrent settle won the insert race; adopt its
                    // binding instead of ours
                    let winner = self
                        .settlements_repo
                        .find(tenant_id, &fp)
                        .await
                        .map_err(ApiError::Internal)?
                        .ok_or_else(|| {
                            ApiError::Internal(anyhow::anyhow!("settlement row missing after conflict"))
                        })?;

                    if winner.status.is_terminal() {
                        return self.answer_from_terminal_row(tenant_id, request_id, &winner, started).await;
                    }

                    match winner.connection_id {
                        Some(bound_id) => {
                            let connection = self
                                .bound_connection(tenant_id, &request_id, &fp, bound_id, started)
                                .await?;
                            (connection, STICKY_RULE_NAME.to_string())
                        }
                        None => (candidate, decision.rule_name),
                    }
                }
            }
        };

        let adapter_ctx = match self.adapter_context(tenant_id, &selected) {
            Ok(ctx) => ctx,
            Err(err) => {
                // the call never left the building, but the row is bound:
                // park it for reconciliation rather than guessing
                tracing::error!(
                    provider = selected.provider.as_str(),
                    connection = %selected.id,
                    error = %err,
                    "settle credentials unavailable"
                );
                return self
                    .settle_unknown(tenant_id, request_id, &fp, &selected, &rule_name, started)
                    .await;
            }
        };

        let adapter = self.adapters.get(selected.provider);
        let dispatched = tokio::time::timeout(self.settle_timeout, adapter.settle(&adapter_ctx, &req)).await;

        let outcome = match dispatched {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(
                    provider = selected.provider.as_str(),
                    connection = %selected.id,
                    error = %err,
                    "settle dispatch failed"
                );
                return self
                    .settle_unknown(tenant_id, request_id, &fp, &selected, &rule_name, started)
                    .await;
            }
            Err(_elapsed) => {
                tracing::warn!(
                    provider = selected.provider.as_str(),
                    connection = %selected.id,
                    "settle dispatch timed out"
                );
                return self
                    .settle_unknown(tenant_id, request_id, &fp, &selected, &rule_name, started)
                    .await;
            }
        };

        // fail closed: if the outcome cannot be recorded the caller must
        // not believe the settlement concluded
        self.settlements_repo
            .record_outcome(tenant_id, &fp, &outcome)
            .await
            .map_err(ApiError::Internal)?;

        let error_code = if outcome.success { None } else { Some("settle_failed") };
        self.log(tenant_id, &request_id, RoutingEndpoint::Settle, Some(selected.id), Some(&rule_name), Some(&fp), started, outcome.success, error_code).await;

        Ok((
            outcome,
            RouteMeta {
                request_id,
                connection_name: selected.name,
                rule_name,
            },
        ))
    }

    /// Union of capabilities across every enabled, healthy connection.
    pub async fn supported(&self, tenant_id: Uuid) -> Result<SupportedResponse, ApiError> {
        let candidates = self
            .connections_repo
            .list_enabled_with_capability(tenant_id)
            .await
            .map_err(ApiError::Internal)?;

        let healthy: Vec<&SupportedResponse> = candidates
            .iter()
            .filter(|c| c.capability_status == CapabilityStatus::Ok)
            .filter_map(|c| c.supported.as_ref())
            .collect();

        Ok(aggregate_supported(healthy))
    }

    async fn load_compiled_ruleset(&self, tenant_id: Uuid) -> Result<CompiledRuleset, ApiError> {
        let stored = self
            .rulesets_repo
            .load_active(tenant_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::RulesetMissing)?;

        compile_document(&stored.document).map_err(|e| ApiError::RulesetInvalid(e.issues()))
    }

    async fn eligible_connections(
        &self,
        tenant_id: Uuid,
        context: &RoutingContext,
    ) -> Result<Vec<CandidateConnection>, ApiError> {
        let candidates = self
            .connections_repo
            .list_enabled_with_capability(tenant_id)
            .await
            .map_err(ApiError::Internal)?;
        Ok(filter_eligible(candidates, context))
    }

    async fn bound_connection(
        &self,
        tenant_id: Uuid,
        request_id: &str,
        fp: &str,
        bound_id: Uuid,
        started: Instant,
    ) -> Result<SelectedConnection, ApiError> {
        match self
            .connections_repo
            .find_by_id(bound_id)
            .await
            .map_err(ApiError::Internal)?
        {
            Some(connection) => Ok(SelectedConnection::from(connection)),
            None => {
                self.log(tenant_id, request_id, RoutingEndpoint::Settle, None, Some(STICKY_RULE_NAME), Some(fp), started, false, Some("no_route")).await;
                Err(ApiError::NoRoute)
            }
        }
    }

    async fn answer_from_terminal_row(
        &self,
        tenant_id: Uuid,
        request_id: String,
        row: &SettlementRow,
        started: Instant,
    ) -> Result<(SettleOutcome, RouteMeta), ApiError> {
        let success = row.status == SettlementStatus::Settled;
        let outcome = SettleOutcome {
            success,
            payer: row.payer.clone(),
            tx_hash: row.tx_hash.clone(),
            network: row.network.clone(),
            error_reason: row.error_reason.clone(),
        };

        let connection_name = match row.connection_id {
            Some(id) => self
                .connections_repo
                .find_by_id(id)
                .await
                .map_err(ApiError::Internal)?
                .map(|c| c.name)
                .unwrap_or_else(|| id.to_string()),
            None => "unknown".to_string(),
        };

        let error_code = if success { None } else { Some("settle_failed") };
        self.log(tenant_id, &request_id, RoutingEndpoint::Settle, row.connection_id, Some(STICKY_RULE_NAME), Some(&row.fingerprint), started, success, error_code).await;

        Ok((
            outcome,
            RouteMeta {
                request_id,
                connection_name,
                rule_name: STICKY_RULE_NAME.to_string(),
            },
        ))
    }

    async fn settle_unknown(
        &self,
        tenant_id: Uuid,
        request_id: String,
        fp: &str,
        selected: &SelectedConnection,
        rule_name: &str,
        started: Instant,
    ) -> Result<(SettleOutcome, RouteMeta), ApiError> {
        // fail closed: losing the unknown marker would let a later retry
        // rebind or double-dispatch the fingerprint
        self.settlements_repo
            .mark_unknown(tenant_id, fp)
            .await
            .map_err(ApiError::Internal)?;

        self.log(tenant_id, &request_id, RoutingEndpoint::Settle, Some(selected.id), Some(rule_name), Some(fp), started, false, Some("upstream_error")).await;

        Err(ApiError::SettleUnknown { request_id })
    }

    async fn dispatch_verify(
        &self,
        tenant_id: Uuid,
        connection: &SelectedConnection,
        req: &VerifyRequest,
    ) -> Result<VerifyOutcome, AdapterError> {
        let ctx = self.adapter_context(tenant_id, connection)?;
        let adapter = self.adapters.get(connection.provider);

        match tokio::time::timeout(self.verify_timeout, adapter.verify(&ctx, req)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(AdapterError::Timeout),
        }
    }

    fn adapter_context(
        &self,
        tenant_id: Uuid,
        connection: &SelectedConnection,
    ) -> Result<AdapterContext, AdapterError> {
        let payload = EncryptedPayload::from_json(&connection.credentials_enc).map_err(|e| {
            AdapterError::Credentials {
                provider: connection.provider.as_str(),
                detail: e.to_string(),
            }
        })?;
        let credentials =
            self.cipher
                .decrypt(tenant_id, &payload)
                .map_err(|e| AdapterError::Credentials {
                    provider: connection.provider.as_str(),
                    detail: e.to_string(),
                })?;

        Ok(AdapterContext {
            tenant_id,
            connection_id: connection.id,
            provider: connection.provider,
            credentials,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn log(
        &self,
        tenant_id: Uuid,
        request_id: &str,
        endpoint: RoutingEndpoint,
        connection_id: Option<Uuid>,
        rule_name: Option<&str>,
        fingerprint: Option<&str>,
        started: Instant,
        ok: bool,
        error_code: Option<&str>,
    ) {
        let record = DecisionRecord {
            tenant_id,
            request_id: request_id.to_string(),
            endpoint,
            connection_id,
            rule_name: rule_name.map(str::to_string),
            fingerprint: fingerprint.map(str::to_string),
            latency_ms: started.elapsed().as_millis() as i32,
            ok,
            error_code: error_code.map(str::to_string),
        };

        if let Err(err) = self.decisions_repo.insert(&record).await {
            tracing::error!(error = %err, "failed to append routing decision");
        }
    }
}

fn validate_requirements(
    requirements: &crate::domain::x402::PaymentRequirements,
) -> Result<(), ApiError> {
    if requirements.scheme.trim().is_empty() {
        return Err(ApiError::InvalidRequest(vec![
            "paymentRequirements.scheme: required".to_string(),
        ]));
    }
    Ok(())
}
