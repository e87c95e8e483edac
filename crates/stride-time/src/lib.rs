//! stride-time
//!
//! Civil-day arithmetic over the fixed challenge timezone. Every "day" in
//! the system is a civil day in this zone, encoded as a [`DateKey`]
//! ("YYYY-MM-DD"). Pure functions, no I/O, no shared state.
//!
//! The zone is a fixed UTC offset (reference deployment: +05:30). Fixed
//! offsets have no DST, so every day window is exactly 24 hours.

pub mod zone;

pub use zone::{ChallengeZone, DayWindow};

use stride_core::DateKey;

/// Civil-day addition, robust across month and year boundaries.
pub fn add_days(key: &DateKey, n: i64) -> DateKey {
    DateKey::from_naive(key.to_naive() + chrono::Duration::days(n))
}

/// Whole civil days from `a` to `b` (positive when `b` is later).
pub fn diff_days(a: &DateKey, b: &DateKey) -> i64 {
    (b.to_naive() - a.to_naive()).num_days()
}
