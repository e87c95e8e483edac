use serde::{Deserialize, Serialize};

use stride_core::MICROS_PER_TOKEN;

/// JSON rendering helpers: micro amounts travel as strings (JSON number
/// implementations disagree above 2^53), with a display-unit float beside
/// them for human eyes.
fn tokens(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_TOKEN as f64
}

/// Challenge summary returned by mutating challenge methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcChallenge {
    pub id: String,
    pub title: String,
    pub stake_micros: String,
    pub stake_tokens: f64,
    pub start_date: String,
    pub end_date: String,
    pub escrow_address: Option<String>,
    pub is_paused: bool,
    pub ended_early: bool,
    pub is_completed: bool,
    pub payouts_finalized: bool,
}

impl From<&stride_core::Challenge> for RpcChallenge {
    fn from(c: &stride_core::Challenge) -> Self {
        Self {
            id: c.id.to_string(),
            title: c.title.clone(),
            stake_micros: c.stake_micros.to_string(),
            stake_tokens: tokens(c.stake_micros),
            start_date: c.start_date.to_rfc3339(),
            end_date: c.end_date.to_rfc3339(),
            escrow_address: c.escrow_address.as_ref().map(|a| a.to_b58()),
            is_paused: c.is_paused,
            ended_early: c.ended_early,
            is_completed: c.is_completed,
            payouts_finalized: c.payouts_finalized,
        }
    }
}

/// Request body for `admin_createChallenge`. Dates accept an ISO instant or
/// a bare date-key (anchored to challenge-zone midnight).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNewChallenge {
    pub title: String,
    pub stake_micros: String,
    pub start_date: String,
    pub end_date: String,
}

/// Queued-payout summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPayoutJob {
    pub id: String,
    pub user_id: String,
    pub challenge_id: String,
    pub amount_micros: String,
    pub amount_tokens: f64,
    pub kind: String,
    pub day_date: String,
    pub wallet_address: Option<String>,
    pub status: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: Option<String>,
    pub last_error: Option<String>,
    pub transaction_signature: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

impl From<&stride_core::PayoutJob> for RpcPayoutJob {
    fn from(j: &stride_core::PayoutJob) -> Self {
        Self {
            id: j.id.to_string(),
            user_id: j.user_id.to_string(),
            challenge_id: j.challenge_id.to_string(),
            amount_micros: j.amount_micros.to_string(),
            amount_tokens: tokens(j.amount_micros),
            kind: j.kind.label().to_string(),
            day_date: j.day_date.to_string(),
            wallet_address: j.wallet_address.as_ref().map(|a| a.to_b58()),
            status: j.status.label().to_string(),
            attempts: j.attempts,
            max_attempts: j.max_attempts,
            next_attempt_at: j.next_attempt_at.map(|t| t.to_rfc3339()),
            last_error: j.last_error.clone(),
            transaction_signature: j.transaction_signature.clone(),
            created_at: j.created_at.to_rfc3339(),
            processed_at: j.processed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Outcome of a moderation call. `payout` is present on approval; its
/// status tells the operator whether the base payout is already queued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcModerationResult {
    pub submission_id: String,
    pub status: String,
    pub new_progress: f64,
    pub payout: Option<RpcPayoutJob>,
}

/// One settled day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettlement {
    pub challenge_id: String,
    pub day_date: String,
    pub total_active: u32,
    pub showed_up: u32,
    pub missed: u32,
    pub base_daily_rate_micros: String,
    pub bonus_per_person_micros: String,
    pub total_distributed_micros: String,
}

impl From<&stride_core::DailySettlement> for RpcSettlement {
    fn from(s: &stride_core::DailySettlement) -> Self {
        Self {
            challenge_id: s.challenge_id.to_string(),
            day_date: s.day_date.to_string(),
            total_active: s.total_active,
            showed_up: s.showed_up,
            missed: s.missed,
            base_daily_rate_micros: s.base_daily_rate.to_string(),
            bonus_per_person_micros: s.bonus_per_person.to_string(),
            total_distributed_micros: s.total_distributed.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRunSettlementsResult {
    pub settled: Vec<RpcSettlement>,
}

/// Queue counters plus recent completions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPayoutStatus {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub total_paid_micros: String,
    pub total_paid_tokens: f64,
    pub recent: Vec<RpcPayoutJob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRetryAllResult {
    pub retried: u32,
}

/// One participant's terminal verdict from finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcParticipantOutcome {
    pub user_id: String,
    pub status: String,
    pub completion_rate: f64,
    pub max_consecutive_misses: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcCloseResult {
    pub outcomes: Vec<RpcParticipantOutcome>,
    pub dust_sweep: Option<RpcPayoutJob>,
}

/// Operator overview of one challenge: row plus live escrow balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcChallengeSummary {
    pub challenge: RpcChallenge,
    pub participants: u32,
    pub escrow_balance_micros: Option<String>,
}
