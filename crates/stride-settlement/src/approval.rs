use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use stride_core::{
    DateKey, Instant, JobId, JobStatus, PayoutJob, PayoutKind, StrideError, Submission,
    SubmissionId, SubmissionStatus,
};
use stride_payout::PayoutQueue;
use stride_store::Store;
use stride_time::ChallengeZone;

use crate::base_daily_rate;

/// What a moderator decision produced: the updated submission, the new
/// progress, and (for approvals) the base payout row.
#[derive(Clone, Debug)]
pub struct ApprovalOutcome {
    pub submission: Submission,
    pub new_progress: f64,
    pub payout: Option<PayoutJob>,
}

/// The side-effect bundle behind "a moderator approved this proof":
/// progress update and DAILY_BASE enqueue, committed atomically with the
/// submission row.
pub struct ApprovalHook {
    store: Arc<Store>,
    queue: Arc<PayoutQueue>,
    zone: ChallengeZone,
}

impl ApprovalHook {
    pub fn new(store: Arc<Store>, queue: Arc<PayoutQueue>, zone: ChallengeZone) -> Self {
        Self { store, queue, zone }
    }

    pub fn approve(
        &self,
        submission_id: &SubmissionId,
        reviewer: &str,
        now: Instant,
    ) -> Result<ApprovalOutcome, StrideError> {
        let mut submission = self
            .store
            .get_submission(submission_id)?
            .ok_or_else(|| StrideError::SubmissionNotFound(submission_id.to_string()))?;
        if submission.status != SubmissionStatus::Pending {
            return Err(StrideError::SubmissionNotPending {
                current: submission.status.label().to_string(),
            });
        }

        let challenge = self.store.require_challenge(&submission.challenge_id)?;
        if challenge.payouts_finalized {
            return Err(StrideError::ChallengeFinalized);
        }
        let mut membership = self
            .store
            .get_membership(&submission.challenge_id, &submission.user_id)?
            .ok_or_else(|| StrideError::MembershipNotFound(submission.challenge_id.to_string()))?;

        submission.status = SubmissionStatus::Approved;
        submission.reviewed_by = Some(reviewer.to_string());
        submission.reviewed_at = Some(now);

        let total_days = self.zone.total_days(challenge.start_date, challenge.end_date);
        let day = self.zone.date_key(submission.submitted_at);

        // Progress counts distinct approved days, including the one being
        // approved right now.
        let mut approved_days = self.approved_day_keys(&submission)?;
        approved_days.insert(day.clone());
        membership.progress =
            (approved_days.len() as f64 / total_days as f64 * 100.0).min(100.0);

        let job = PayoutJob {
            id: JobId::generate(),
            user_id: submission.user_id.clone(),
            challenge_id: submission.challenge_id.clone(),
            amount_micros: base_daily_rate(challenge.stake_micros, total_days),
            kind: PayoutKind::DailyBase,
            day_date: day,
            wallet_address: Some(membership.wallet_address.clone()),
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: self.queue.config().max_attempts,
            next_attempt_at: None,
            last_error: None,
            transaction_signature: None,
            created_at: now,
            processed_at: None,
        };

        // One transaction: approval, progress, and base payout land together
        // (or the payout collapses onto an existing row with the same
        // fingerprint — double-fired approvals are a no-op on the queue).
        let queued = self.store.commit_approval(&submission, &membership, &job)?;
        info!(
            submission = %submission.id,
            user = %submission.user_id,
            amount = queued.amount_micros,
            "proof approved, base payout queued"
        );

        Ok(ApprovalOutcome {
            submission,
            new_progress: membership.progress,
            payout: Some(queued),
        })
    }

    pub fn reject(
        &self,
        submission_id: &SubmissionId,
        reviewer: &str,
        reason: &str,
        category: &str,
        now: Instant,
    ) -> Result<ApprovalOutcome, StrideError> {
        let mut submission = self
            .store
            .get_submission(submission_id)?
            .ok_or_else(|| StrideError::SubmissionNotFound(submission_id.to_string()))?;
        if submission.status != SubmissionStatus::Pending {
            return Err(StrideError::SubmissionNotPending {
                current: submission.status.label().to_string(),
            });
        }

        submission.status = SubmissionStatus::Rejected;
        submission.reviewed_by = Some(reviewer.to_string());
        submission.reviewed_at = Some(now);
        submission.review_comments = Some(format!("[{category}] {reason}"));

        // Rejection frees the day slot: the participant may submit again.
        let day = self.zone.date_key(submission.submitted_at);
        self.store.put_submission(&submission, &day, true)?;

        let progress = self
            .store
            .get_membership(&submission.challenge_id, &submission.user_id)?
            .map(|m| m.progress)
            .unwrap_or(0.0);

        Ok(ApprovalOutcome {
            submission,
            new_progress: progress,
            payout: None,
        })
    }

    fn approved_day_keys(
        &self,
        submission: &Submission,
    ) -> Result<BTreeSet<DateKey>, StrideError> {
        Ok(self
            .store
            .iter_submissions(&submission.challenge_id)?
            .into_iter()
            .filter(|s| {
                s.user_id == submission.user_id && s.status == SubmissionStatus::Approved
            })
            .map(|s| self.zone.date_key(s.submitted_at))
            .collect())
    }
}
