//! stride-payout
//!
//! The payout job queue and the worker that drains it. The queue is a sled
//! tree keyed by the idempotency fingerprint — it survives restarts, and
//! enqueue is an upsert by construction. The worker leases jobs with an
//! atomic compare-and-swap, performs the on-chain transfer, and records a
//! ledger row for every completion.

pub mod queue;
pub mod worker;

pub use queue::{EnqueueRequest, PayoutQueue, QueueConfig, QueueStats};
pub use worker::{PayoutWorker, TickSummary, WorkerConfig};
