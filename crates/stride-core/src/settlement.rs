//! Daily settlement audit rows and the operator audit log.

use serde::{Deserialize, Serialize};

use crate::types::{ChallengeId, DateKey, Instant, Micros};

/// Immutable audit of one day's bonus math for one challenge. Created exactly
/// once per (challenge, day); its existence is what makes `settle_day`
/// idempotent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailySettlement {
    pub challenge_id: ChallengeId,
    pub day_date: DateKey,

    /// Participants still ACTIVE on this day.
    pub total_active: u32,

    /// ACTIVE participants with at least one approved submission this day.
    pub showed_up: u32,

    /// Forfeited shares: active participants who missed, plus participants
    /// already FAILED (their daily share is forfeit every remaining day).
    pub missed: u32,

    /// floor(stake_micros / total_days) — each participant's per-day share.
    pub base_daily_rate: Micros,

    /// floor(missed_pool / showed_up); zero when nobody showed up.
    pub bonus_per_person: Micros,

    /// showed_up * bonus_per_person. Floor residue stays in escrow as dust.
    pub total_distributed: Micros,

    pub created_at: Instant,
}

/// Append-only record of an operator action. Best-effort: a failed audit
/// write is logged and never blocks the mutation it describes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Who performed the action (reviewer handle or "system").
    pub actor: String,
    /// Machine-readable action name, e.g. "proof.approve".
    pub action: String,
    /// The entity the action touched (submission id, challenge id, job id).
    pub entity: String,
    pub detail: serde_json::Value,
    pub at: Instant,
}
