use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{
    RpcChallenge, RpcChallengeSummary, RpcCloseResult, RpcModerationResult, RpcNewChallenge,
    RpcPayoutJob, RpcPayoutStatus, RpcRetryAllResult, RpcRunSettlementsResult, RpcSettlement,
};

/// Operator JSON-RPC 2.0 API.
///
/// All method names are prefixed with "admin_" via `namespace = "admin"`.
#[rpc(server, namespace = "admin")]
pub trait AdminApi {
    /// Create a challenge and seed its escrow wallet. Returns the challenge
    /// with its published escrow address.
    #[method(name = "createChallenge")]
    async fn create_challenge(&self, params: RpcNewChallenge) -> RpcResult<RpcChallenge>;

    /// Approve a pending proof: records the moderator verdict, bumps the
    /// participant's progress, and queues the DAILY_BASE payout.
    #[method(name = "approveProof")]
    async fn approve_proof(
        &self,
        submission_id: String,
        reviewer: String,
    ) -> RpcResult<RpcModerationResult>;

    /// Reject a pending proof with a reason and category. Frees the
    /// participant's slot for that day.
    #[method(name = "rejectProof")]
    async fn reject_proof(
        &self,
        submission_id: String,
        reviewer: String,
        reason: String,
        category: String,
    ) -> RpcResult<RpcModerationResult>;

    /// Run the hourly settlement pass now: settles yesterday for every
    /// running challenge. Idempotent.
    #[method(name = "runSettlements")]
    async fn run_settlements(&self) -> RpcResult<RpcRunSettlementsResult>;

    /// Settle one (challenge, day) pair. Returns the existing row when the
    /// day is already settled.
    #[method(name = "settleDay")]
    async fn settle_day(&self, challenge_id: String, day_date: String)
        -> RpcResult<RpcSettlement>;

    /// Queue counters and the most recent completions.
    #[method(name = "payoutStatus")]
    async fn payout_status(&self) -> RpcResult<RpcPayoutStatus>;

    /// Terminal-FAILED jobs, optionally scoped to one challenge.
    #[method(name = "failedPayouts")]
    async fn failed_payouts(&self, challenge_id: Option<String>) -> RpcResult<Vec<RpcPayoutJob>>;

    /// Reset one job to QUEUED with a fresh attempt budget; optionally
    /// override its destination wallet.
    #[method(name = "retryPayout")]
    async fn retry_payout(
        &self,
        job_id: String,
        wallet_address: Option<String>,
    ) -> RpcResult<RpcPayoutJob>;

    /// Reset every FAILED job in scope to QUEUED.
    #[method(name = "retryAllPayouts")]
    async fn retry_all_payouts(&self, challenge_id: Option<String>)
        -> RpcResult<RpcRetryAllResult>;

    /// Finalize a challenge: resolve participant outcomes, sweep dust to
    /// treasury, and latch payouts shut.
    #[method(name = "closeChallenge")]
    async fn close_challenge(&self, challenge_id: String) -> RpcResult<RpcCloseResult>;

    /// Pause or resume the settlement cron for one challenge.
    #[method(name = "pauseChallenge")]
    async fn pause_challenge(&self, challenge_id: String, paused: bool)
        -> RpcResult<RpcChallenge>;

    /// End a running challenge now; finalization becomes eligible
    /// immediately.
    #[method(name = "endChallengeEarly")]
    async fn end_challenge_early(&self, challenge_id: String) -> RpcResult<RpcChallenge>;

    /// Challenge row, participant count, and live escrow balance.
    #[method(name = "challengeSummary")]
    async fn challenge_summary(&self, challenge_id: String) -> RpcResult<RpcChallengeSummary>;

    /// All settled days for a challenge, oldest first.
    #[method(name = "listSettlements")]
    async fn list_settlements(&self, challenge_id: String) -> RpcResult<Vec<RpcSettlement>>;
}
