//! Challenge, membership and submission records.
//!
//! These are the durable rows the settlement engine and finalization read.
//! Instants are stored UTC; every "day" decision goes through stride-time
//! with the deployment's challenge zone.

use serde::{Deserialize, Serialize};

use crate::types::{ChallengeId, Instant, Micros, SubmissionId, TokenAddress, UserId};

// ── Challenge ────────────────────────────────────────────────────────────────

/// A time-bounded staking challenge with its own escrow account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,

    /// Stake each participant deposits at join, in micro-units.
    pub stake_micros: Micros,

    /// First settlement day is `date_key(start_date)`.
    pub start_date: Instant,

    /// Exclusive: the day whose date-key equals `date_key(end_date)` is NOT
    /// a settlement day.
    pub end_date: Instant,

    /// Escrow public address; None until the wallet store seeds it.
    pub escrow_address: Option<TokenAddress>,

    /// Suspends the settlement cron for this challenge. Queued payouts keep
    /// draining while paused.
    pub is_paused: bool,

    /// Set when an operator ends the challenge before the scheduled end_date
    /// (end_date is advanced to the moment of the cut).
    pub ended_early: bool,

    pub is_completed: bool,

    /// One-way latch: once true it never reverts, and no new payout job may
    /// be enqueued for this challenge.
    pub payouts_finalized: bool,

    pub completed_at: Option<Instant>,
    pub created_at: Instant,
}

impl Challenge {
    /// Whether the settlement cron should consider this challenge at all.
    pub fn is_settling(&self) -> bool {
        !self.is_completed && !self.is_paused && !self.payouts_finalized
    }
}

// ── Membership (user ↔ challenge) ────────────────────────────────────────────

/// Terminal outcome of a participant. ACTIVE until finalization resolves it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipStatus {
    Active,
    Completed,
    Failed,
}

impl MembershipStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Completed => "COMPLETED",
            MembershipStatus::Failed => "FAILED",
        }
    }
}

/// One user's participation in one challenge. Unique per (user, challenge).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,

    /// Copy of the challenge stake at join time, for historical accuracy if
    /// the challenge row is ever edited.
    pub stake_micros: Micros,

    /// The wallet the participant staked from; daily payouts return here.
    pub wallet_address: TokenAddress,

    pub status: MembershipStatus,

    /// Percent 0–100 of challenge days with an approved submission.
    pub progress: f64,

    pub start_date: Instant,
    pub end_date: Instant,
    pub joined_at: Instant,
}

// ── EscrowRecord ─────────────────────────────────────────────────────────────

/// Persisted escrow keypair for one challenge. The secret key is stored as
/// AEAD ciphertext; only stride-escrow can open it, and the plaintext never
/// leaves the process except as transaction signatures.
#[derive(Clone, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub challenge_id: ChallengeId,
    pub public_key: TokenAddress,
    /// AES-256-GCM ciphertext of the 32-byte ed25519 seed.
    pub secret_ciphertext: Vec<u8>,
    /// 96-bit AEAD nonce, unique per record.
    pub nonce: [u8; 12],
    pub created_at: Instant,
}

impl std::fmt::Debug for EscrowRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EscrowRecord {{ challenge: {}, public_key: {} }}",
            self.challenge_id, self.public_key
        )
    }
}

// ── Submission ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Approved => "APPROVED",
            SubmissionStatus::Rejected => "REJECTED",
        }
    }
}

/// A single proof-of-activity submission. Counts for the civil day of its
/// `submitted_at` in the challenge zone. At most one non-REJECTED submission
/// per (user, challenge, day); rejection frees the slot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub submitted_at: Instant,
    pub status: SubmissionStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<Instant>,
    pub review_comments: Option<String>,
}
