use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrideError {
    // ── Validation (caller-fixable) ──────────────────────────────────────────
    #[error("invalid token address: {0}")]
    InvalidAddress(String),

    #[error("invalid date key: {0}")]
    InvalidDateKey(String),

    #[error("invalid timezone spec: {0}")]
    InvalidTimezone(String),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid date input: {0}")]
    InvalidDateInput(String),

    #[error("stake deposit could not be verified on chain: {0}")]
    StakeNotVerified(String),

    // ── Not found ────────────────────────────────────────────────────────────
    #[error("challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("user is not a participant of challenge {0}")]
    MembershipNotFound(String),

    #[error("submission not found: {0}")]
    SubmissionNotFound(String),

    #[error("payout job not found: {0}")]
    JobNotFound(String),

    // ── State machine (never mutates) ────────────────────────────────────────
    #[error("submission is {current}, expected PENDING")]
    SubmissionNotPending { current: String },

    #[error("a submission for {day} already exists for this participant")]
    DuplicateDailySubmission { day: String },

    #[error("challenge payouts already finalized")]
    ChallengeFinalized,

    #[error("challenge has not ended yet (ends {end})")]
    ChallengeNotEnded { end: String },

    #[error("cannot join after the challenge start date")]
    JoinAfterStart,

    #[error("cannot join a completed challenge")]
    JoinCompletedChallenge,

    #[error("user already joined this challenge")]
    AlreadyJoined,

    #[error("pause toggle only valid while the challenge is running")]
    PauseOutsideWindow,

    #[error("payout job {id} is {status}; cannot {op}")]
    JobStateConflict {
        id: String,
        status: String,
        op: &'static str,
    },

    // ── Transient infrastructure ─────────────────────────────────────────────
    #[error("chain rpc error: {0}")]
    ChainRpc(String),

    #[error("transfer not yet confirmed: {0}")]
    TransferUnconfirmed(String),

    #[error("insufficient escrow balance: need {need} micros, have {have}")]
    InsufficientEscrowBalance { need: u64, have: u64 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // ── Fatal misconfiguration ───────────────────────────────────────────────
    #[error("escrow key unavailable: {0}")]
    EscrowKeyUnavailable(String),

    #[error("fee-payer keypair unavailable: {0}")]
    FeePayerUnavailable(String),

    #[error("treasury address not configured")]
    TreasuryUnconfigured,

    #[error("escrow wallet missing for challenge {0}")]
    EscrowWalletMissing(String),

    #[error("{0}")]
    Other(String),
}

/// Error buckets, one per row of the handling policy table. The RPC layer
/// maps each bucket to a stable JSON-RPC error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    Transient,
    Misconfiguration,
    Internal,
}

impl StrideError {
    pub fn kind(&self) -> ErrorKind {
        use StrideError::*;
        match self {
            InvalidAddress(_) | InvalidDateKey(_) | InvalidTimezone(_) | ZeroAmount
            | InvalidAmount(_) | InvalidDateInput(_) | StakeNotVerified(_) => {
                ErrorKind::Validation
            }

            ChallengeNotFound(_) | MembershipNotFound(_) | SubmissionNotFound(_)
            | JobNotFound(_) => ErrorKind::NotFound,

            SubmissionNotPending { .. }
            | DuplicateDailySubmission { .. }
            | ChallengeFinalized
            | ChallengeNotEnded { .. }
            | JoinAfterStart
            | JoinCompletedChallenge
            | AlreadyJoined
            | PauseOutsideWindow
            | JobStateConflict { .. } => ErrorKind::StateConflict,

            ChainRpc(_) | TransferUnconfirmed(_) | InsufficientEscrowBalance { .. } => {
                ErrorKind::Transient
            }

            EscrowKeyUnavailable(_) | FeePayerUnavailable(_) | TreasuryUnconfigured
            | EscrowWalletMissing(_) => ErrorKind::Misconfiguration,

            Storage(_) | Serialization(_) | Other(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code surfaced to admin clients.
    pub fn code(&self) -> &'static str {
        use StrideError::*;
        match self {
            InvalidAddress(_) => "INVALID_ADDRESS",
            InvalidDateKey(_) => "INVALID_DATE_KEY",
            InvalidTimezone(_) => "INVALID_TIMEZONE",
            ZeroAmount => "ZERO_AMOUNT",
            InvalidAmount(_) => "INVALID_AMOUNT",
            InvalidDateInput(_) => "INVALID_DATE_INPUT",
            StakeNotVerified(_) => "STAKE_NOT_VERIFIED",
            ChallengeNotFound(_) => "CHALLENGE_NOT_FOUND",
            MembershipNotFound(_) => "MEMBERSHIP_NOT_FOUND",
            SubmissionNotFound(_) => "SUBMISSION_NOT_FOUND",
            JobNotFound(_) => "JOB_NOT_FOUND",
            SubmissionNotPending { .. } => "SUBMISSION_NOT_PENDING",
            DuplicateDailySubmission { .. } => "DUPLICATE_DAILY_SUBMISSION",
            ChallengeFinalized => "CHALLENGE_FINALIZED",
            ChallengeNotEnded { .. } => "CHALLENGE_NOT_ENDED",
            JoinAfterStart => "JOIN_AFTER_START",
            JoinCompletedChallenge => "JOIN_COMPLETED_CHALLENGE",
            AlreadyJoined => "ALREADY_JOINED",
            PauseOutsideWindow => "PAUSE_OUTSIDE_WINDOW",
            JobStateConflict { .. } => "JOB_STATE_CONFLICT",
            ChainRpc(_) => "CHAIN_RPC",
            TransferUnconfirmed(_) => "TRANSFER_UNCONFIRMED",
            InsufficientEscrowBalance { .. } => "INSUFFICIENT_ESCROW_BALANCE",
            Storage(_) => "STORAGE",
            Serialization(_) => "SERIALIZATION",
            EscrowKeyUnavailable(_) => "ESCROW_KEY_UNAVAILABLE",
            FeePayerUnavailable(_) => "FEE_PAYER_UNAVAILABLE",
            TreasuryUnconfigured => "TREASURY_UNCONFIGURED",
            EscrowWalletMissing(_) => "ESCROW_WALLET_MISSING",
            Other(_) => "INTERNAL",
        }
    }
}
