use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use stride_core::{
    Challenge, ChallengeId, DailySettlement, DateKey, Instant, MembershipStatus, PayoutKind,
    StrideError, SubmissionStatus, UserId,
};
use stride_payout::{EnqueueRequest, PayoutQueue};
use stride_store::Store;
use stride_time::ChallengeZone;

use crate::base_daily_rate;

/// The daily settlement engine. `settle_day` is idempotent: the settlement
/// row is created exactly once per (challenge, day), and the bonus jobs it
/// queues collapse onto their idempotency fingerprints on re-runs.
pub struct SettlementEngine {
    store: Arc<Store>,
    queue: Arc<PayoutQueue>,
    zone: ChallengeZone,
}

impl SettlementEngine {
    pub fn new(store: Arc<Store>, queue: Arc<PayoutQueue>, zone: ChallengeZone) -> Self {
        Self { store, queue, zone }
    }

    /// Settle one civil day for one challenge: who showed up, who forfeited,
    /// and the resulting bonus payouts.
    pub fn settle_day(
        &self,
        challenge_id: &ChallengeId,
        day: &DateKey,
        now: Instant,
    ) -> Result<DailySettlement, StrideError> {
        if let Some(existing) = self.store.get_settlement(challenge_id, day)? {
            return Ok(existing);
        }

        let challenge = self.store.require_challenge(challenge_id)?;
        if challenge.payouts_finalized {
            return Err(StrideError::ChallengeFinalized);
        }
        let start_key = self.zone.date_key(challenge.start_date);
        let end_key = self.zone.date_key(challenge.end_date);
        if *day < start_key || *day >= end_key {
            return Err(StrideError::InvalidDateInput(format!(
                "{day} is not a settlement day of this challenge"
            )));
        }

        // Participants still in the game forfeit nothing they showed up for;
        // FAILED participants forfeit their share every remaining day.
        let participants = self
            .store
            .iter_memberships(challenge_id)?
            .into_iter()
            .filter(|m| {
                matches!(m.status, MembershipStatus::Active | MembershipStatus::Failed)
            })
            .collect::<Vec<_>>();

        let showed_up = self.showed_up_on(challenge_id, day)?;
        let active: Vec<_> = participants
            .iter()
            .filter(|m| m.status == MembershipStatus::Active)
            .collect();
        let showed: Vec<_> = active
            .iter()
            .filter(|m| showed_up.contains(&m.user_id))
            .collect();

        let total = participants.len() as u32;
        let showed_count = showed.len() as u32;
        let missed_count = total - showed_count;

        let total_days = self.zone.total_days(challenge.start_date, challenge.end_date);
        let rate = base_daily_rate(challenge.stake_micros, total_days);
        let missed_pool = missed_count as u64 * rate;
        let bonus_per_person = if showed_count > 0 {
            missed_pool / showed_count as u64
        } else {
            0
        };

        if bonus_per_person > 0 {
            for member in &showed {
                self.queue.enqueue(
                    EnqueueRequest {
                        user_id: member.user_id.clone(),
                        challenge_id: challenge_id.clone(),
                        amount_micros: bonus_per_person,
                        kind: PayoutKind::DailyBonus,
                        day_date: day.clone(),
                        wallet_address: Some(member.wallet_address.clone()),
                    },
                    now,
                )?;
            }
        }

        let settlement = DailySettlement {
            challenge_id: challenge_id.clone(),
            day_date: day.clone(),
            total_active: total,
            showed_up: showed_count,
            missed: missed_count,
            base_daily_rate: rate,
            bonus_per_person,
            total_distributed: showed_count as u64 * bonus_per_person,
            created_at: now,
        };
        let stored = self.store.insert_settlement_if_absent(&settlement)?;
        info!(
            challenge = %challenge_id,
            day = %day,
            showed_up = stored.showed_up,
            missed = stored.missed,
            bonus = stored.bonus_per_person,
            "day settled"
        );
        Ok(stored)
    }

    /// The hourly cron body: settle yesterday for every running challenge
    /// whose date range includes it. Per-challenge errors are logged, never
    /// propagated — the next tick retries, and settle_day is idempotent.
    pub fn run_due(&self, now: Instant) -> Result<Vec<DailySettlement>, StrideError> {
        let yesterday = self.zone.yesterday(now);
        let mut settled = Vec::new();
        for challenge in self.store.iter_challenges()? {
            if !self.is_due(&challenge, &yesterday) {
                continue;
            }
            match self.settle_day(&challenge.id, &yesterday, now) {
                Ok(s) => settled.push(s),
                Err(e) => {
                    warn!(challenge = %challenge.id, day = %yesterday, error = %e, "settlement failed")
                }
            }
        }
        Ok(settled)
    }

    fn is_due(&self, challenge: &Challenge, day: &DateKey) -> bool {
        if !challenge.is_settling() {
            return false;
        }
        let start_key = self.zone.date_key(challenge.start_date);
        let end_key = self.zone.date_key(challenge.end_date);
        *day >= start_key && *day < end_key
    }

    /// User ids with at least one APPROVED submission whose civil day is `day`.
    fn showed_up_on(
        &self,
        challenge_id: &ChallengeId,
        day: &DateKey,
    ) -> Result<BTreeSet<UserId>, StrideError> {
        Ok(self
            .store
            .iter_submissions(challenge_id)?
            .into_iter()
            .filter(|s| {
                s.status == SubmissionStatus::Approved
                    && self.zone.date_key(s.submitted_at) == *day
            })
            .map(|s| s.user_id)
            .collect())
    }
}
