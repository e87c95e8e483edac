use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use stride_chain::TokenGateway;
use stride_core::{
    ChallengeId, DateKey, Instant, MembershipStatus, Micros, PayoutJob, PayoutKind, StrideError,
    SubmissionStatus, TokenAddress, UserId, COMPLETION_RATE_THRESHOLD,
    DEFAULT_DUST_THRESHOLD_MICROS, MAX_CONSECUTIVE_MISSES,
};
use stride_payout::{EnqueueRequest, PayoutQueue};
use stride_store::Store;
use stride_time::ChallengeZone;

/// Terminal verdict for one participant.
#[derive(Clone, Debug)]
pub struct ParticipantOutcome {
    pub user_id: UserId,
    pub status: MembershipStatus,
    pub completion_rate: f64,
    pub max_consecutive_misses: u32,
}

#[derive(Debug)]
pub struct CloseOutcome {
    pub outcomes: Vec<ParticipantOutcome>,
    pub dust_sweep: Option<PayoutJob>,
}

/// Challenge finalization: resolve every ACTIVE participant to COMPLETED or
/// FAILED, sweep residual escrow to treasury, and latch the challenge shut.
pub struct Finalizer {
    store: Arc<Store>,
    queue: Arc<PayoutQueue>,
    gateway: Arc<dyn TokenGateway>,
    zone: ChallengeZone,
    treasury: Option<TokenAddress>,
    dust_threshold_micros: Micros,
}

impl Finalizer {
    pub fn new(
        store: Arc<Store>,
        queue: Arc<PayoutQueue>,
        gateway: Arc<dyn TokenGateway>,
        zone: ChallengeZone,
        treasury: Option<TokenAddress>,
    ) -> Self {
        Self {
            store,
            queue,
            gateway,
            zone,
            treasury,
            dust_threshold_micros: DEFAULT_DUST_THRESHOLD_MICROS,
        }
    }

    pub fn with_dust_threshold(mut self, micros: Micros) -> Self {
        self.dust_threshold_micros = micros;
        self
    }

    pub async fn close_challenge(
        &self,
        challenge_id: &ChallengeId,
        now: Instant,
    ) -> Result<CloseOutcome, StrideError> {
        let mut challenge = self.store.require_challenge(challenge_id)?;
        if challenge.payouts_finalized {
            return Err(StrideError::ChallengeFinalized);
        }
        if now < challenge.end_date {
            return Err(StrideError::ChallengeNotEnded {
                end: challenge.end_date.to_rfc3339(),
            });
        }

        // ── Participant outcomes ─────────────────────────────────────────
        let total_days = self.zone.total_days(challenge.start_date, challenge.end_date);
        let start_key = self.zone.date_key(challenge.start_date);
        let mut outcomes = Vec::new();

        for mut membership in self.store.iter_memberships(challenge_id)? {
            if membership.status != MembershipStatus::Active {
                continue;
            }
            let approved = self.approved_day_keys(challenge_id, &membership.user_id)?;
            let completion_rate = approved.len() as f64 / total_days as f64;
            let misses = max_consecutive_misses(&start_key, total_days, &approved);

            let status = if misses >= MAX_CONSECUTIVE_MISSES {
                MembershipStatus::Failed
            } else if completion_rate >= COMPLETION_RATE_THRESHOLD {
                MembershipStatus::Completed
            } else {
                MembershipStatus::Failed
            };

            membership.status = status;
            membership.progress = (completion_rate * 100.0).min(100.0);
            membership.end_date = now;
            self.store.put_membership(&membership)?;

            outcomes.push(ParticipantOutcome {
                user_id: membership.user_id,
                status,
                completion_rate,
                max_consecutive_misses: misses,
            });
        }

        // ── Dust sweep ───────────────────────────────────────────────────
        // The balance read is allowed to fail without blocking the close;
        // residue stays recoverable by a later manual sweep.
        let dust_sweep = match self.sweep_dust(&challenge, now).await {
            Ok(job) => job,
            Err(e) => {
                warn!(challenge = %challenge_id, error = %e, "dust sweep skipped");
                None
            }
        };

        // ── Latch shut ───────────────────────────────────────────────────
        challenge.payouts_finalized = true;
        challenge.is_completed = true;
        challenge.completed_at = Some(now);
        self.store.put_challenge(&challenge)?;
        info!(
            challenge = %challenge_id,
            participants = outcomes.len(),
            swept = dust_sweep.is_some(),
            "challenge finalized"
        );

        Ok(CloseOutcome { outcomes, dust_sweep })
    }

    async fn sweep_dust(
        &self,
        challenge: &stride_core::Challenge,
        now: Instant,
    ) -> Result<Option<PayoutJob>, StrideError> {
        let Some(treasury) = &self.treasury else {
            return Ok(None);
        };
        let Some(escrow_address) = &challenge.escrow_address else {
            return Ok(None);
        };
        let balance = self.gateway.token_balance(escrow_address).await?;
        if balance <= self.dust_threshold_micros {
            return Ok(None);
        }
        let job = self.queue.enqueue(
            EnqueueRequest {
                // Dust belongs to nobody; the system is the payee of record.
                user_id: UserId::from("system"),
                challenge_id: challenge.id.clone(),
                amount_micros: balance,
                kind: PayoutKind::DustSweep,
                day_date: self.zone.date_key(now),
                wallet_address: Some(treasury.clone()),
            },
            now,
        )?;
        Ok(Some(job))
    }

    fn approved_day_keys(
        &self,
        challenge_id: &ChallengeId,
        user_id: &UserId,
    ) -> Result<BTreeSet<DateKey>, StrideError> {
        Ok(self
            .store
            .iter_submissions(challenge_id)?
            .into_iter()
            .filter(|s| s.user_id == *user_id && s.status == SubmissionStatus::Approved)
            .map(|s| self.zone.date_key(s.submitted_at))
            .collect())
    }
}

/// Longest run of challenge days with no approved submission.
fn max_consecutive_misses(start_key: &DateKey, total_days: u32, approved: &BTreeSet<DateKey>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    for offset in 0..total_days {
        let day = stride_time::add_days(start_key, offset as i64);
        if approved.contains(&day) {
            run = 0;
        } else {
            run += 1;
            longest = longest.max(run);
        }
    }
    longest
}
