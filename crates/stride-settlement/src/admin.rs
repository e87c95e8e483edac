use std::sync::Arc;

use tracing::info;

use stride_chain::TokenGateway;
use stride_core::{
    Challenge, ChallengeId, Instant, Membership, MembershipStatus, Micros, StrideError,
    Submission, SubmissionId, SubmissionStatus, TokenAddress, UserId,
};
use stride_escrow::EscrowWallets;
use stride_store::Store;
use stride_time::ChallengeZone;

/// Parameters for challenge creation.
#[derive(Clone, Debug)]
pub struct NewChallenge {
    pub title: String,
    pub stake_micros: Micros,
    pub start_date: Instant,
    pub end_date: Instant,
}

/// Challenge lifecycle operations: create (with escrow seeding), join with
/// stake-deposit verification, proof intake, pause, and early end.
pub struct ChallengeAdmin {
    store: Arc<Store>,
    escrow: Arc<EscrowWallets>,
    gateway: Arc<dyn TokenGateway>,
    zone: ChallengeZone,
}

impl ChallengeAdmin {
    pub fn new(
        store: Arc<Store>,
        escrow: Arc<EscrowWallets>,
        gateway: Arc<dyn TokenGateway>,
        zone: ChallengeZone,
    ) -> Self {
        Self {
            store,
            escrow,
            gateway,
            zone,
        }
    }

    /// Create a challenge and seed its escrow wallet in one atomic commit;
    /// the published address always has a key behind it.
    pub fn create_challenge(
        &self,
        params: NewChallenge,
        now: Instant,
    ) -> Result<Challenge, StrideError> {
        if params.stake_micros == 0 {
            return Err(StrideError::ZeroAmount);
        }
        let id = ChallengeId::generate();
        let record = self.escrow.provision(&id)?;
        let challenge = Challenge {
            id: id.clone(),
            title: params.title,
            stake_micros: params.stake_micros,
            start_date: params.start_date,
            end_date: params.end_date,
            escrow_address: Some(record.public_key.clone()),
            is_paused: false,
            ended_early: false,
            is_completed: false,
            payouts_finalized: false,
            completed_at: None,
            created_at: now,
        };
        self.store.put_challenge_with_escrow(&challenge, &record)?;
        info!(challenge = %id, escrow = %record.public_key, "challenge created");
        Ok(challenge)
    }

    /// Join: only before the start date, never on a completed challenge,
    /// once per user. When a stake transaction signature is supplied, the
    /// deposit (participant wallet → escrow, full stake amount) is verified
    /// on chain before the membership is created; an unconfirmed transfer
    /// rejects the join so the participant can retry once it lands.
    pub async fn join_challenge(
        &self,
        challenge_id: &ChallengeId,
        user_id: &UserId,
        wallet_address: TokenAddress,
        stake_signature: Option<&str>,
        now: Instant,
    ) -> Result<Membership, StrideError> {
        let challenge = self.store.require_challenge(challenge_id)?;
        if challenge.is_completed || challenge.payouts_finalized {
            return Err(StrideError::JoinCompletedChallenge);
        }
        if now >= challenge.start_date {
            return Err(StrideError::JoinAfterStart);
        }

        if let Some(signature) = stake_signature {
            let escrow_address = challenge
                .escrow_address
                .as_ref()
                .ok_or_else(|| StrideError::EscrowWalletMissing(challenge_id.to_string()))?;
            let verified = self
                .gateway
                .verify_transfer(
                    signature,
                    &wallet_address,
                    escrow_address,
                    challenge.stake_micros,
                )
                .await?;
            if !verified {
                return Err(StrideError::StakeNotVerified(signature.to_string()));
            }
        }

        let membership = Membership {
            user_id: user_id.clone(),
            challenge_id: challenge_id.clone(),
            stake_micros: challenge.stake_micros,
            wallet_address,
            status: MembershipStatus::Active,
            progress: 0.0,
            start_date: challenge.start_date,
            end_date: challenge.end_date,
            joined_at: now,
        };
        self.store.insert_membership(&membership)?;
        Ok(membership)
    }

    /// Record a proof submission for the civil day of `now`. One
    /// non-REJECTED submission per day per participant.
    pub fn submit_proof(
        &self,
        challenge_id: &ChallengeId,
        user_id: &UserId,
        now: Instant,
    ) -> Result<Submission, StrideError> {
        let challenge = self.store.require_challenge(challenge_id)?;
        if challenge.is_completed || challenge.payouts_finalized {
            return Err(StrideError::ChallengeFinalized);
        }
        self.store
            .get_membership(challenge_id, user_id)?
            .ok_or_else(|| StrideError::MembershipNotFound(challenge_id.to_string()))?;

        let day = self.zone.date_key(now);
        let start_key = self.zone.date_key(challenge.start_date);
        let end_key = self.zone.date_key(challenge.end_date);
        if day < start_key || day >= end_key {
            return Err(StrideError::InvalidDateInput(format!(
                "{day} is outside the challenge window"
            )));
        }

        let submission = Submission {
            id: SubmissionId::generate(),
            user_id: user_id.clone(),
            challenge_id: challenge_id.clone(),
            submitted_at: now,
            status: SubmissionStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_comments: None,
        };
        self.store.insert_submission(&submission, &day)?;
        Ok(submission)
    }

    /// Toggle the pause flag. Valid only while the challenge is running and
    /// not finalized. Paused challenges skip the settlement cron; queued
    /// payouts keep draining.
    pub fn set_paused(
        &self,
        challenge_id: &ChallengeId,
        paused: bool,
        now: Instant,
    ) -> Result<Challenge, StrideError> {
        let mut challenge = self.store.require_challenge(challenge_id)?;
        if challenge.payouts_finalized
            || now < challenge.start_date
            || now >= challenge.end_date
        {
            return Err(StrideError::PauseOutsideWindow);
        }
        challenge.is_paused = paused;
        self.store.put_challenge(&challenge)?;
        Ok(challenge)
    }

    /// Cut a running challenge short: the end date advances to `now`, which
    /// makes finalization eligible immediately.
    pub fn end_early(
        &self,
        challenge_id: &ChallengeId,
        now: Instant,
    ) -> Result<Challenge, StrideError> {
        let mut challenge = self.store.require_challenge(challenge_id)?;
        if challenge.payouts_finalized {
            return Err(StrideError::ChallengeFinalized);
        }
        challenge.end_date = now;
        challenge.ended_early = true;
        self.store.put_challenge(&challenge)?;
        info!(challenge = %challenge_id, "challenge ended early");
        Ok(challenge)
    }
}
