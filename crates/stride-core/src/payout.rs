//! Payout jobs and the completed-payout ledger.

use serde::{Deserialize, Serialize};

use crate::types::{ChallengeId, DateKey, Instant, JobId, Micros, TokenAddress, UserId};

// ── PayoutKind ───────────────────────────────────────────────────────────────

/// What a payout job pays for. The uppercase label is part of the
/// idempotency-key wire format and must never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutKind {
    /// A participant's own per-day stake share, released on proof approval.
    DailyBase,
    /// A showed-up participant's share of the day's forfeited pool.
    DailyBonus,
    /// Residual escrow balance swept to treasury at finalization.
    DustSweep,
}

impl PayoutKind {
    pub fn label(&self) -> &'static str {
        match self {
            PayoutKind::DailyBase => "DAILY_BASE",
            PayoutKind::DailyBonus => "DAILY_BONUS",
            PayoutKind::DustSweep => "DUST_SWEEP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DAILY_BASE" => Some(PayoutKind::DailyBase),
            "DAILY_BONUS" => Some(PayoutKind::DailyBonus),
            "DUST_SWEEP" => Some(PayoutKind::DustSweep),
            _ => None,
        }
    }
}

/// Deterministic fingerprint of a logical payout intent:
/// `"{challenge_id}:{user_id}:{day_date}:{TYPE}"`.
///
/// Two jobs with the same fingerprint cannot both exist; this is the string
/// the queue uses as its primary key.
pub fn idempotency_key(
    challenge_id: &ChallengeId,
    user_id: &UserId,
    day_date: &DateKey,
    kind: PayoutKind,
) -> String {
    format!("{challenge_id}:{user_id}:{day_date}:{}", kind.label())
}

// ── PayoutJob ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// COMPLETED and FAILED rows never transition again (operator retry is
    /// the single escape hatch).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One queued on-chain transfer. The queue's concurrency object: leased by
/// at most one worker at a time, completed at most once ever.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayoutJob {
    pub id: JobId,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,

    /// Transfer amount in micro-units.
    pub amount_micros: Micros,

    pub kind: PayoutKind,

    /// The civil day this payout settles.
    pub day_date: DateKey,

    /// Destination wallet. None means the worker resolves it from the
    /// membership row and persists it back to short-circuit retries.
    pub wallet_address: Option<TokenAddress>,

    pub status: JobStatus,

    /// Incremented on lease, not on failure.
    pub attempts: u32,
    pub max_attempts: u32,

    /// Earliest instant the job may be leased again after a retryable
    /// failure. None = leasable now.
    pub next_attempt_at: Option<Instant>,

    pub last_error: Option<String>,

    /// Chain signature; set exactly when status becomes COMPLETED.
    pub transaction_signature: Option<String>,

    pub created_at: Instant,
    pub processed_at: Option<Instant>,
}

impl PayoutJob {
    pub fn idempotency_key(&self) -> String {
        idempotency_key(&self.challenge_id, &self.user_id, &self.day_date, self.kind)
    }

    /// Whether a QUEUED row is currently leasable.
    pub fn is_due(&self, now: Instant) -> bool {
        self.status == JobStatus::Queued
            && self.next_attempt_at.map(|at| at <= now).unwrap_or(true)
    }
}

// ── Ledger ───────────────────────────────────────────────────────────────────

/// Append-only record of one completed payout. One row per COMPLETED job,
/// linked by `payout_job_id`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,

    /// Display-unit amount (micros / 1e6), the unit operator tooling reads.
    pub amount_tokens: f64,

    pub transaction_signature: String,
    pub payout_job_id: JobId,

    /// Free-form context: payout kind, day, escrow address.
    pub metadata: serde_json::Value,

    pub created_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateKey;

    #[test]
    fn idempotency_key_format_is_stable() {
        let key = idempotency_key(
            &ChallengeId::from("ch1"),
            &UserId::from("u1"),
            &DateKey::parse("2025-03-04").unwrap(),
            PayoutKind::DailyBase,
        );
        assert_eq!(key, "ch1:u1:2025-03-04:DAILY_BASE");
    }

    #[test]
    fn kind_labels_roundtrip() {
        for kind in [PayoutKind::DailyBase, PayoutKind::DailyBonus, PayoutKind::DustSweep] {
            assert_eq!(PayoutKind::parse(kind.label()), Some(kind));
        }
        assert_eq!(PayoutKind::parse("BASE"), None);
    }
}
