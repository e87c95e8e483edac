use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use stride_chain::TokenGateway;
use stride_core::{ChallengeId, DateKey, ErrorKind, JobId, StrideError, SubmissionId, TokenAddress};
use stride_payout::PayoutQueue;
use stride_settlement::{ApprovalHook, ChallengeAdmin, Finalizer, NewChallenge, SettlementEngine};
use stride_store::Store;
use stride_time::ChallengeZone;

use crate::api::AdminApiServer;
use crate::types::{
    RpcChallenge, RpcChallengeSummary, RpcCloseResult, RpcModerationResult, RpcNewChallenge,
    RpcParticipantOutcome, RpcPayoutJob, RpcPayoutStatus, RpcRetryAllResult,
    RpcRunSettlementsResult, RpcSettlement,
};

/// Map a core error to a JSON-RPC error. The numeric code buckets follow
/// the error taxonomy; the stable string code rides in `data`.
fn rpc_err(e: StrideError) -> ErrorObject<'static> {
    let code = match e.kind() {
        ErrorKind::Validation => -32602,
        ErrorKind::NotFound => -32001,
        ErrorKind::StateConflict => -32002,
        ErrorKind::Misconfiguration => -32003,
        ErrorKind::Transient => -32005,
        ErrorKind::Internal => -32603,
    };
    ErrorObject::owned(code, e.to_string(), Some(e.code()))
}

/// Shared state behind the admin RPC server.
pub struct AdminState {
    pub store: Arc<Store>,
    pub queue: Arc<PayoutQueue>,
    pub gateway: Arc<dyn TokenGateway>,
    pub admin: ChallengeAdmin,
    pub hook: ApprovalHook,
    pub engine: SettlementEngine,
    pub finalizer: Finalizer,
    pub zone: ChallengeZone,
}

/// The admin RPC server implementation.
pub struct AdminServer {
    state: Arc<AdminState>,
}

impl AdminServer {
    pub fn new(state: Arc<AdminState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new()
            .allow_methods(Any)
            .allow_origin(Any)
            .allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "admin RPC server started");
        Ok(handle)
    }

    /// Best-effort audit append. A failed audit write never blocks the
    /// mutation it describes.
    fn audit(&self, actor: &str, action: &str, entity: &str, detail: serde_json::Value) {
        let entry = stride_core::AuditEntry {
            actor: actor.to_string(),
            action: action.to_string(),
            entity: entity.to_string(),
            detail,
            at: chrono::Utc::now(),
        };
        if let Err(e) = self.state.store.append_audit(&entry) {
            warn!(action, entity, error = %e, "audit append failed");
        }
    }
}

#[async_trait]
impl AdminApiServer for AdminServer {
    async fn create_challenge(&self, params: RpcNewChallenge) -> RpcResult<RpcChallenge> {
        let stake_micros: u64 = params
            .stake_micros
            .parse()
            .map_err(|_| rpc_err(StrideError::InvalidAmount(params.stake_micros.clone())))?;
        let start = self
            .state
            .zone
            .parse_date_input(&params.start_date)
            .map_err(rpc_err)?;
        let end = self
            .state
            .zone
            .parse_date_input(&params.end_date)
            .map_err(rpc_err)?;

        let challenge = self
            .state
            .admin
            .create_challenge(
                NewChallenge {
                    title: params.title,
                    stake_micros,
                    start_date: start,
                    end_date: end,
                },
                chrono::Utc::now(),
            )
            .map_err(rpc_err)?;

        self.audit(
            "operator",
            "challenge.create",
            challenge.id.as_str(),
            serde_json::json!({ "stake_micros": stake_micros }),
        );
        Ok(RpcChallenge::from(&challenge))
    }

    async fn approve_proof(
        &self,
        submission_id: String,
        reviewer: String,
    ) -> RpcResult<RpcModerationResult> {
        let id = SubmissionId::from(submission_id);
        let outcome = self
            .state
            .hook
            .approve(&id, &reviewer, chrono::Utc::now())
            .map_err(rpc_err)?;

        self.audit(
            &reviewer,
            "proof.approve",
            id.as_str(),
            serde_json::json!({ "progress": outcome.new_progress }),
        );
        Ok(RpcModerationResult {
            submission_id: outcome.submission.id.to_string(),
            status: outcome.submission.status.label().to_string(),
            new_progress: outcome.new_progress,
            payout: outcome.payout.as_ref().map(RpcPayoutJob::from),
        })
    }

    async fn reject_proof(
        &self,
        submission_id: String,
        reviewer: String,
        reason: String,
        category: String,
    ) -> RpcResult<RpcModerationResult> {
        let id = SubmissionId::from(submission_id);
        let outcome = self
            .state
            .hook
            .reject(&id, &reviewer, &reason, &category, chrono::Utc::now())
            .map_err(rpc_err)?;

        self.audit(
            &reviewer,
            "proof.reject",
            id.as_str(),
            serde_json::json!({ "reason": reason, "category": category }),
        );
        Ok(RpcModerationResult {
            submission_id: outcome.submission.id.to_string(),
            status: outcome.submission.status.label().to_string(),
            new_progress: outcome.new_progress,
            payout: None,
        })
    }

    async fn run_settlements(&self) -> RpcResult<RpcRunSettlementsResult> {
        let settled = self
            .state
            .engine
            .run_due(chrono::Utc::now())
            .map_err(rpc_err)?;
        self.audit(
            "operator",
            "settlement.run",
            "all",
            serde_json::json!({ "settled": settled.len() }),
        );
        Ok(RpcRunSettlementsResult {
            settled: settled.iter().map(RpcSettlement::from).collect(),
        })
    }

    async fn settle_day(
        &self,
        challenge_id: String,
        day_date: String,
    ) -> RpcResult<RpcSettlement> {
        let challenge_id = ChallengeId::from(challenge_id);
        let day = DateKey::parse(&day_date).map_err(rpc_err)?;
        let settlement = self
            .state
            .engine
            .settle_day(&challenge_id, &day, chrono::Utc::now())
            .map_err(rpc_err)?;
        self.audit(
            "operator",
            "settlement.day",
            challenge_id.as_str(),
            serde_json::json!({ "day": day_date }),
        );
        Ok(RpcSettlement::from(&settlement))
    }

    async fn payout_status(&self) -> RpcResult<RpcPayoutStatus> {
        let stats = self.state.queue.stats().map_err(rpc_err)?;
        let recent = self.state.queue.recent_completions(20).map_err(rpc_err)?;
        Ok(RpcPayoutStatus {
            queued: stats.queued,
            processing: stats.processing,
            completed: stats.completed,
            failed: stats.failed,
            total_paid_micros: stats.total_paid_micros.to_string(),
            total_paid_tokens: stats.total_paid_micros as f64
                / stride_core::MICROS_PER_TOKEN as f64,
            recent: recent.iter().map(RpcPayoutJob::from).collect(),
        })
    }

    async fn failed_payouts(
        &self,
        challenge_id: Option<String>,
    ) -> RpcResult<Vec<RpcPayoutJob>> {
        let scope = challenge_id.map(ChallengeId::from);
        let failed = self
            .state
            .queue
            .list_failed(scope.as_ref())
            .map_err(rpc_err)?;
        Ok(failed.iter().map(RpcPayoutJob::from).collect())
    }

    async fn retry_payout(
        &self,
        job_id: String,
        wallet_address: Option<String>,
    ) -> RpcResult<RpcPayoutJob> {
        let id = JobId::from(job_id);
        let wallet = wallet_address
            .map(|w| TokenAddress::from_b58(&w))
            .transpose()
            .map_err(rpc_err)?;
        let job = self.state.queue.retry(&id, wallet).map_err(rpc_err)?;
        self.audit(
            "operator",
            "payout.retry",
            id.as_str(),
            serde_json::json!({ "challenge": job.challenge_id.as_str() }),
        );
        Ok(RpcPayoutJob::from(&job))
    }

    async fn retry_all_payouts(
        &self,
        challenge_id: Option<String>,
    ) -> RpcResult<RpcRetryAllResult> {
        let scope = challenge_id.clone().map(ChallengeId::from);
        let retried = self
            .state
            .queue
            .retry_all_failed(scope.as_ref())
            .map_err(rpc_err)?;
        self.audit(
            "operator",
            "payout.retry_all",
            challenge_id.as_deref().unwrap_or("all"),
            serde_json::json!({ "retried": retried }),
        );
        Ok(RpcRetryAllResult { retried })
    }

    async fn close_challenge(&self, challenge_id: String) -> RpcResult<RpcCloseResult> {
        let id = ChallengeId::from(challenge_id);
        let outcome = self
            .state
            .finalizer
            .close_challenge(&id, chrono::Utc::now())
            .await
            .map_err(rpc_err)?;

        self.audit(
            "operator",
            "challenge.close",
            id.as_str(),
            serde_json::json!({
                "participants": outcome.outcomes.len(),
                "dust_swept": outcome.dust_sweep.is_some(),
            }),
        );
        Ok(RpcCloseResult {
            outcomes: outcome
                .outcomes
                .iter()
                .map(|o| RpcParticipantOutcome {
                    user_id: o.user_id.to_string(),
                    status: o.status.label().to_string(),
                    completion_rate: o.completion_rate,
                    max_consecutive_misses: o.max_consecutive_misses,
                })
                .collect(),
            dust_sweep: outcome.dust_sweep.as_ref().map(RpcPayoutJob::from),
        })
    }

    async fn pause_challenge(
        &self,
        challenge_id: String,
        paused: bool,
    ) -> RpcResult<RpcChallenge> {
        let id = ChallengeId::from(challenge_id);
        let challenge = self
            .state
            .admin
            .set_paused(&id, paused, chrono::Utc::now())
            .map_err(rpc_err)?;
        self.audit(
            "operator",
            "challenge.pause",
            id.as_str(),
            serde_json::json!({ "paused": paused }),
        );
        Ok(RpcChallenge::from(&challenge))
    }

    async fn end_challenge_early(&self, challenge_id: String) -> RpcResult<RpcChallenge> {
        let id = ChallengeId::from(challenge_id);
        let challenge = self
            .state
            .admin
            .end_early(&id, chrono::Utc::now())
            .map_err(rpc_err)?;
        self.audit("operator", "challenge.end_early", id.as_str(), serde_json::json!({}));
        Ok(RpcChallenge::from(&challenge))
    }

    async fn challenge_summary(&self, challenge_id: String) -> RpcResult<RpcChallengeSummary> {
        let id = ChallengeId::from(challenge_id);
        let challenge = self.state.store.require_challenge(&id).map_err(rpc_err)?;
        let participants = self
            .state
            .store
            .iter_memberships(&id)
            .map_err(rpc_err)?
            .len() as u32;

        // Live balance is advisory; RPC trouble degrades to "unknown".
        let escrow_balance_micros = match &challenge.escrow_address {
            Some(address) => match self.state.gateway.token_balance(address).await {
                Ok(balance) => Some(balance.to_string()),
                Err(e) => {
                    warn!(challenge = %id, error = %e, "escrow balance read failed");
                    None
                }
            },
            None => None,
        };

        Ok(RpcChallengeSummary {
            challenge: RpcChallenge::from(&challenge),
            participants,
            escrow_balance_micros,
        })
    }

    async fn list_settlements(&self, challenge_id: String) -> RpcResult<Vec<RpcSettlement>> {
        let id = ChallengeId::from(challenge_id);
        let mut settlements = self.state.store.iter_settlements(&id).map_err(rpc_err)?;
        settlements.sort_by(|a, b| a.day_date.cmp(&b.day_date));
        Ok(settlements.iter().map(RpcSettlement::from).collect())
    }
}
