//! ─── Stride payout-core constants ───────────────────────────────────────────
//!
//! Token: 6-decimal fixed-point ("micros"). All queue and settlement math is
//! integer micro-units; display conversion happens only at the RPC edge.

use crate::types::Micros;

// ── Token units ──────────────────────────────────────────────────────────────

/// 1 display token expressed in micro-units.
pub const MICROS_PER_TOKEN: Micros = 1_000_000;

// ── Payout queue ─────────────────────────────────────────────────────────────

/// Attempts before a job turns terminal FAILED. Overridable per deployment.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry backoff base: delay = BACKOFF_BASE_SECS * 4^(attempts-1),
/// i.e. 30 s, 120 s, 480 s with the defaults.
pub const DEFAULT_BACKOFF_BASE_SECS: i64 = 30;

/// Backoff growth factor per failed attempt.
pub const BACKOFF_FACTOR: i64 = 4;

// ── Payout worker ────────────────────────────────────────────────────────────

/// Seconds between worker ticks.
pub const DEFAULT_WORKER_TICK_SECS: u64 = 30;

/// Jobs leased per tick. Processed sequentially within the tick.
pub const DEFAULT_WORKER_BATCH: usize = 10;

// ── Settlement / finalization ────────────────────────────────────────────────

/// Completion rate at or above which a participant finishes COMPLETED.
pub const COMPLETION_RATE_THRESHOLD: f64 = 0.8;

/// A run of missed days at or beyond this length fails the participant
/// outright, regardless of overall completion rate.
pub const MAX_CONSECUTIVE_MISSES: u32 = 2;

/// Escrow residue below this many micros (0.001 display tokens) is not worth
/// a sweep transfer; finalization leaves it behind.
pub const DEFAULT_DUST_THRESHOLD_MICROS: Micros = 1_000;

// ── Chain verification ───────────────────────────────────────────────────────

/// Tolerance when matching an observed balance delta against an expected
/// transfer amount: 0.01 display tokens.
pub const TRANSFER_VERIFY_TOLERANCE_MICROS: Micros = 10_000;
