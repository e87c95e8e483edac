use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use stride_core::{
    ChallengeId, DateKey, Instant, JobId, JobStatus, Micros, PayoutJob, PayoutKind, StrideError,
    TokenAddress, UserId, BACKOFF_FACTOR, DEFAULT_BACKOFF_BASE_SECS, DEFAULT_MAX_ATTEMPTS,
};
use stride_store::Store;

#[derive(Clone, Copy, Debug)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub backoff_base_secs: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
        }
    }
}

/// A logical payout intent, before it becomes (or collides with) a job row.
#[derive(Clone, Debug)]
pub struct EnqueueRequest {
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub amount_micros: Micros,
    pub kind: PayoutKind,
    pub day_date: DateKey,
    pub wallet_address: Option<TokenAddress>,
}

/// Operator-facing queue counters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub total_paid_micros: Micros,
}

/// The persistent payout queue. All transitions go through here; the worker
/// and the admin surface never touch job rows directly.
pub struct PayoutQueue {
    store: Arc<Store>,
    config: QueueConfig,
}

impl PayoutQueue {
    pub fn new(store: Arc<Store>, config: QueueConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Idempotent enqueue. If a job with the same fingerprint exists — any
    /// status — that row is returned unchanged: approval hooks may fire
    /// twice and settlement may re-run a day, and both must be safe.
    ///
    /// Finalized challenges accept no new jobs.
    pub fn enqueue(&self, request: EnqueueRequest, now: Instant) -> Result<PayoutJob, StrideError> {
        if let Some(challenge) = self.store.get_challenge(&request.challenge_id)? {
            if challenge.payouts_finalized {
                return Err(StrideError::ChallengeFinalized);
            }
        }
        let job = PayoutJob {
            id: JobId::generate(),
            user_id: request.user_id,
            challenge_id: request.challenge_id,
            amount_micros: request.amount_micros,
            kind: request.kind,
            day_date: request.day_date,
            wallet_address: request.wallet_address,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: self.config.max_attempts,
            next_attempt_at: None,
            last_error: None,
            transaction_signature: None,
            created_at: now,
            processed_at: None,
        };
        self.store.insert_job_if_absent(&job)
    }

    /// Atomically move one due QUEUED row to PROCESSING, oldest first, and
    /// increment its attempt counter. Returns None when nothing is due.
    ///
    /// The compare-and-swap makes this safe against concurrent leasers: a
    /// row stolen between read and swap is simply skipped.
    pub fn lease_one(&self, now: Instant) -> Result<Option<PayoutJob>, StrideError> {
        let mut due: Vec<PayoutJob> = self
            .store
            .iter_jobs()?
            .into_iter()
            .filter(|j| j.is_due(now))
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        for candidate in due {
            let mut leased = candidate.clone();
            leased.status = JobStatus::Processing;
            leased.attempts = candidate.attempts + 1;
            leased.next_attempt_at = None;
            if self.store.compare_and_swap_job(&candidate, &leased)? {
                return Ok(Some(leased));
            }
            // Lost the race for this row; try the next one.
        }
        Ok(None)
    }

    /// Terminal success: record the signature and the ledger row in one
    /// commit. Only PROCESSING rows may complete.
    pub fn complete(
        &self,
        job: &PayoutJob,
        tx_signature: String,
        now: Instant,
    ) -> Result<PayoutJob, StrideError> {
        let current = self.require_current(job)?;
        if current.status != JobStatus::Processing {
            return Err(StrideError::JobStateConflict {
                id: current.id.to_string(),
                status: current.status.label().to_string(),
                op: "complete",
            });
        }

        let mut done = current;
        done.status = JobStatus::Completed;
        done.transaction_signature = Some(tx_signature.clone());
        done.last_error = None;
        done.processed_at = Some(now);

        let entry = stride_core::LedgerEntry {
            user_id: done.user_id.clone(),
            challenge_id: done.challenge_id.clone(),
            amount_tokens: done.amount_micros as f64 / stride_core::MICROS_PER_TOKEN as f64,
            transaction_signature: tx_signature,
            payout_job_id: done.id.clone(),
            metadata: serde_json::json!({
                "kind": done.kind.label(),
                "day": done.day_date.as_str(),
            }),
            created_at: now,
        };
        self.store.commit_completion(&done, &entry)?;
        info!(job = %done.id, kind = done.kind.label(), amount = done.amount_micros, "payout completed");
        Ok(done)
    }

    /// Record a failure. Below the attempt cap the row returns to QUEUED
    /// with exponential backoff (base · 4^(attempts−1)); at the cap it goes
    /// terminal FAILED and becomes operator-visible.
    pub fn fail(
        &self,
        job: &PayoutJob,
        error: String,
        now: Instant,
    ) -> Result<PayoutJob, StrideError> {
        let current = self.require_current(job)?;
        if current.status != JobStatus::Processing {
            return Err(StrideError::JobStateConflict {
                id: current.id.to_string(),
                status: current.status.label().to_string(),
                op: "fail",
            });
        }

        let mut next = current;
        next.last_error = Some(error);
        if next.attempts < next.max_attempts {
            let exponent = next.attempts.saturating_sub(1);
            let delay = self.config.backoff_base_secs * BACKOFF_FACTOR.pow(exponent);
            next.status = JobStatus::Queued;
            next.next_attempt_at = Some(now + Duration::seconds(delay));
        } else {
            next.status = JobStatus::Failed;
            next.processed_at = Some(now);
        }
        self.store.put_job(&next)?;
        Ok(next)
    }

    /// Operator escape hatch: force a row back to QUEUED with a fresh
    /// attempt budget, regardless of its current status. An optional wallet
    /// override replaces the recorded destination.
    pub fn retry(
        &self,
        job_id: &JobId,
        wallet_override: Option<TokenAddress>,
    ) -> Result<PayoutJob, StrideError> {
        let mut job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| StrideError::JobNotFound(job_id.to_string()))?;
        job.status = JobStatus::Queued;
        job.attempts = 0;
        job.next_attempt_at = None;
        job.last_error = None;
        job.processed_at = None;
        // Leaving COMPLETED via retry also drops the signature so that a
        // signature is present exactly on COMPLETED rows.
        job.transaction_signature = None;
        if let Some(wallet) = wallet_override {
            job.wallet_address = Some(wallet);
        }
        self.store.put_job(&job)?;
        info!(job = %job.id, "payout job reset to QUEUED by operator");
        Ok(job)
    }

    /// Persist a wallet address resolved by the worker, so later retries
    /// skip the lookup.
    pub fn record_wallet(
        &self,
        job: &PayoutJob,
        wallet: TokenAddress,
    ) -> Result<PayoutJob, StrideError> {
        let mut updated = self.require_current(job)?;
        updated.wallet_address = Some(wallet);
        self.store.put_job(&updated)?;
        Ok(updated)
    }

    pub fn list_failed(
        &self,
        challenge_id: Option<&ChallengeId>,
    ) -> Result<Vec<PayoutJob>, StrideError> {
        let jobs = match challenge_id {
            Some(id) => self.store.iter_jobs_for_challenge(id)?,
            None => self.store.iter_jobs()?,
        };
        Ok(jobs
            .into_iter()
            .filter(|j| j.status == JobStatus::Failed)
            .collect())
    }

    /// Reset every FAILED job in scope. Returns how many were retried.
    pub fn retry_all_failed(
        &self,
        challenge_id: Option<&ChallengeId>,
    ) -> Result<u32, StrideError> {
        let failed = self.list_failed(challenge_id)?;
        let mut retried = 0;
        for job in failed {
            self.retry(&job.id, None)?;
            retried += 1;
        }
        Ok(retried)
    }

    pub fn stats(&self) -> Result<QueueStats, StrideError> {
        let mut stats = QueueStats::default();
        for job in self.store.iter_jobs()? {
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => {
                    stats.completed += 1;
                    stats.total_paid_micros += job.amount_micros;
                }
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    /// Most recent completions, newest first.
    pub fn recent_completions(&self, limit: usize) -> Result<Vec<PayoutJob>, StrideError> {
        let mut completed: Vec<PayoutJob> = self
            .store
            .iter_jobs()?
            .into_iter()
            .filter(|j| j.status == JobStatus::Completed)
            .collect();
        completed.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        completed.truncate(limit);
        Ok(completed)
    }

    fn require_current(&self, job: &PayoutJob) -> Result<PayoutJob, StrideError> {
        self.store
            .get_job_by_fingerprint(&job.idempotency_key())?
            .ok_or_else(|| StrideError::JobNotFound(job.id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn queue() -> (tempfile::TempDir, Arc<Store>, PayoutQueue) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let q = PayoutQueue::new(Arc::clone(&store), QueueConfig::default());
        (dir, store, q)
    }

    fn t0() -> Instant {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn request(user: &str, day: &str) -> EnqueueRequest {
        EnqueueRequest {
            user_id: UserId::from(user),
            challenge_id: ChallengeId::from("ch1"),
            amount_micros: 10_000_000,
            kind: PayoutKind::DailyBase,
            day_date: DateKey::parse(day).unwrap(),
            wallet_address: Some(TokenAddress::from_bytes([1u8; 32])),
        }
    }

    #[test]
    fn enqueue_is_an_upsert() {
        let (_dir, _store, q) = queue();
        let first = q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        let second = q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(q.stats().unwrap().queued, 1);
    }

    #[test]
    fn distinct_fingerprints_make_distinct_rows() {
        let (_dir, _store, q) = queue();
        q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        q.enqueue(request("u1", "2025-06-11"), t0()).unwrap();
        q.enqueue(request("u2", "2025-06-10"), t0()).unwrap();
        assert_eq!(q.stats().unwrap().queued, 3);
    }

    #[test]
    fn lease_is_fifo_by_creation() {
        let (_dir, _store, q) = queue();
        q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        q.enqueue(request("u2", "2025-06-10"), t0() + Duration::seconds(1)).unwrap();

        let first = q.lease_one(t0() + Duration::minutes(1)).unwrap().unwrap();
        assert_eq!(first.user_id, UserId::from("u1"));
        assert_eq!(first.status, JobStatus::Processing);
        assert_eq!(first.attempts, 1);

        let second = q.lease_one(t0() + Duration::minutes(1)).unwrap().unwrap();
        assert_eq!(second.user_id, UserId::from("u2"));

        // Both rows are PROCESSING now; nothing left to lease.
        assert!(q.lease_one(t0() + Duration::minutes(1)).unwrap().is_none());
    }

    #[test]
    fn complete_records_signature_and_ledger_row() {
        let (_dir, store, q) = queue();
        q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        let leased = q.lease_one(t0()).unwrap().unwrap();
        let done = q.complete(&leased, "sig-1".into(), t0()).unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.transaction_signature.as_deref(), Some("sig-1"));
        let entry = store.get_ledger_entry(&done.id).unwrap().unwrap();
        assert_eq!(entry.transaction_signature, "sig-1");
        assert_eq!(entry.payout_job_id, done.id);
        assert!((entry.amount_tokens - 10.0).abs() < 1e-9);
    }

    #[test]
    fn completed_is_terminal() {
        let (_dir, _store, q) = queue();
        q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        let leased = q.lease_one(t0()).unwrap().unwrap();
        q.complete(&leased, "sig-1".into(), t0()).unwrap();

        assert!(matches!(
            q.complete(&leased, "sig-2".into(), t0()),
            Err(StrideError::JobStateConflict { .. })
        ));
        assert!(matches!(
            q.fail(&leased, "boom".into(), t0()),
            Err(StrideError::JobStateConflict { .. })
        ));
    }

    #[test]
    fn failure_backs_off_exponentially() {
        let (_dir, _store, q) = queue();
        q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();

        // Attempt 1 → retry in 30 s.
        let leased = q.lease_one(t0()).unwrap().unwrap();
        let failed = q.fail(&leased, "rpc timeout".into(), t0()).unwrap();
        assert_eq!(failed.status, JobStatus::Queued);
        assert_eq!(failed.next_attempt_at, Some(t0() + Duration::seconds(30)));
        assert_eq!(failed.last_error.as_deref(), Some("rpc timeout"));

        // Not leasable before the backoff elapses.
        assert!(q.lease_one(t0() + Duration::seconds(29)).unwrap().is_none());

        // Attempt 2 → retry in 120 s.
        let leased = q.lease_one(t0() + Duration::seconds(30)).unwrap().unwrap();
        let failed = q.fail(&leased, "rpc timeout".into(), t0()).unwrap();
        assert_eq!(failed.next_attempt_at, Some(t0() + Duration::seconds(120)));

        // Attempt 3 exhausts the budget: terminal FAILED.
        let leased = q.lease_one(t0() + Duration::seconds(120)).unwrap().unwrap();
        assert_eq!(leased.attempts, 3);
        let failed = q.fail(&leased, "rpc timeout".into(), t0()).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(q.list_failed(None).unwrap().len(), 1);
    }

    #[test]
    fn retry_resets_the_attempt_budget() {
        let (_dir, _store, q) = queue();
        q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        for _ in 0..3 {
            let leased = q.lease_one(t0() + Duration::hours(1)).unwrap().unwrap();
            q.fail(&leased, "down".into(), t0()).unwrap();
        }
        let failed = &q.list_failed(None).unwrap()[0];

        let reset = q.retry(&failed.id, None).unwrap();
        assert_eq!(reset.status, JobStatus::Queued);
        assert_eq!(reset.attempts, 0);
        assert!(reset.next_attempt_at.is_none());
        assert!(reset.last_error.is_none());
        assert!(reset.transaction_signature.is_none());
    }

    #[test]
    fn retry_can_override_the_wallet() {
        let (_dir, _store, q) = queue();
        let job = q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        let other = TokenAddress::from_bytes([9u8; 32]);
        let reset = q.retry(&job.id, Some(other.clone())).unwrap();
        assert_eq!(reset.wallet_address, Some(other));
    }

    #[test]
    fn retry_all_scopes_by_challenge() {
        let (_dir, _store, q) = queue();
        let mut other = request("u1", "2025-06-10");
        other.challenge_id = ChallengeId::from("ch2");
        q.enqueue(other, t0()).unwrap();
        q.enqueue(request("u2", "2025-06-10"), t0()).unwrap();
        // Fail both to terminal; hop forward an hour per round so every
        // backoff window has elapsed.
        for i in 0..6 {
            let now = t0() + Duration::hours(24 + i);
            if let Some(leased) = q.lease_one(now).unwrap() {
                let _ = q.fail(&leased, "down".into(), now);
            }
        }
        assert_eq!(q.list_failed(None).unwrap().len(), 2);

        let retried = q.retry_all_failed(Some(&ChallengeId::from("ch2"))).unwrap();
        assert_eq!(retried, 1);
        assert_eq!(q.list_failed(None).unwrap().len(), 1);
    }

    #[test]
    fn stats_count_by_status() {
        let (_dir, _store, q) = queue();
        q.enqueue(request("u1", "2025-06-10"), t0()).unwrap();
        q.enqueue(request("u2", "2025-06-10"), t0()).unwrap();
        let leased = q.lease_one(t0()).unwrap().unwrap();
        q.complete(&leased, "sig".into(), t0()).unwrap();

        let stats = q.stats().unwrap();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total_paid_micros, 10_000_000);
    }
}
