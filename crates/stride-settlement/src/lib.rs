//! stride-settlement
//!
//! The accountability pipeline: challenge lifecycle admin, the approval
//! hook that releases daily base payouts, the once-per-day settlement that
//! redistributes forfeited shares, and the finalization pass that resolves
//! outcomes and sweeps dust.
//!
//! Everything here computes against the store and the payout queue; chain
//! access is limited to stake-deposit verification at join and the escrow
//! balance read at finalization.

pub mod admin;
pub mod approval;
pub mod engine;
pub mod finalize;

pub use admin::{ChallengeAdmin, NewChallenge};
pub use approval::{ApprovalHook, ApprovalOutcome};
pub use engine::SettlementEngine;
pub use finalize::{CloseOutcome, Finalizer, ParticipantOutcome};

use stride_core::Micros;

/// floor(stake / total_days): each participant's per-day stake share in
/// micro-units. The floor residue accumulates in escrow as dust.
pub fn base_daily_rate(stake_micros: Micros, total_days: u32) -> Micros {
    stake_micros / total_days.max(1) as u64
}
