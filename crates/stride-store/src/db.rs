use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};

use stride_core::{
    AuditEntry, Challenge, ChallengeId, DailySettlement, DateKey, EscrowRecord, JobId,
    LedgerEntry, Membership, PayoutJob, StrideError, Submission, SubmissionId, UserId,
};

/// Persistent store backed by sled (pure-Rust, no C dependencies).
///
/// Named trees:
///   challenges       — challenge id utf8      → bincode(Challenge)
///   memberships      — "{ch}:{user}"          → bincode(Membership)
///   submissions      — submission id utf8     → bincode(Submission)
///   submission_days  — "{ch}:{user}:{day}"    → submission id (non-REJECTED slot)
///   submission_index — "{ch}:{submission id}" → [] (membership set)
///   escrow_wallets   — challenge id utf8      → bincode(EscrowRecord)
///   payout_jobs      — idempotency key utf8   → bincode(PayoutJob)
///   job_index        — job id utf8            → idempotency key bytes
///   settlements      — "{ch}:{day}"           → bincode(DailySettlement)
///   ledger           — job id utf8            → json(LedgerEntry)
///   audit            — u64 be bytes           → json(AuditEntry)
///
/// Keying payout_jobs by the idempotency fingerprint is what makes enqueue a
/// structural upsert: a second row with the same fingerprint cannot exist.
pub struct Store {
    db: sled::Db,
    challenges: sled::Tree,
    memberships: sled::Tree,
    submissions: sled::Tree,
    submission_days: sled::Tree,
    submission_index: sled::Tree,
    escrow_wallets: sled::Tree,
    payout_jobs: sled::Tree,
    job_index: sled::Tree,
    settlements: sled::Tree,
    ledger: sled::Tree,
    audit: sled::Tree,
}

fn storage(e: impl std::fmt::Display) -> StrideError {
    StrideError::Storage(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StrideError> {
    bincode::serialize(value).map_err(|e| StrideError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StrideError> {
    bincode::deserialize(bytes).map_err(|e| StrideError::Serialization(e.to_string()))
}

// Ledger and audit rows carry free-form `serde_json::Value` fields, which
// bincode cannot deserialize (it is not self-describing); those two trees
// store JSON bytes instead.
fn encode_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StrideError> {
    serde_json::to_vec(value).map_err(|e| StrideError::Serialization(e.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StrideError> {
    serde_json::from_slice(bytes).map_err(|e| StrideError::Serialization(e.to_string()))
}

fn tx_err(e: TransactionError<StrideError>) -> StrideError {
    match e {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(inner) => storage(inner),
    }
}

fn abort<T>(e: StrideError) -> Result<T, ConflictableTransactionError<StrideError>> {
    Err(ConflictableTransactionError::Abort(e))
}

fn membership_key(challenge_id: &ChallengeId, user_id: &UserId) -> String {
    format!("{challenge_id}:{user_id}")
}

fn day_slot_key(challenge_id: &ChallengeId, user_id: &UserId, day: &DateKey) -> String {
    format!("{challenge_id}:{user_id}:{day}")
}

fn settlement_key(challenge_id: &ChallengeId, day: &DateKey) -> String {
    format!("{challenge_id}:{day}")
}

impl Store {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StrideError> {
        let db = sled::open(path).map_err(storage)?;
        let challenges       = db.open_tree("challenges").map_err(storage)?;
        let memberships      = db.open_tree("memberships").map_err(storage)?;
        let submissions      = db.open_tree("submissions").map_err(storage)?;
        let submission_days  = db.open_tree("submission_days").map_err(storage)?;
        let submission_index = db.open_tree("submission_index").map_err(storage)?;
        let escrow_wallets   = db.open_tree("escrow_wallets").map_err(storage)?;
        let payout_jobs      = db.open_tree("payout_jobs").map_err(storage)?;
        let job_index        = db.open_tree("job_index").map_err(storage)?;
        let settlements      = db.open_tree("settlements").map_err(storage)?;
        let ledger           = db.open_tree("ledger").map_err(storage)?;
        let audit            = db.open_tree("audit").map_err(storage)?;
        Ok(Self {
            db, challenges, memberships, submissions, submission_days, submission_index,
            escrow_wallets, payout_jobs, job_index, settlements, ledger, audit,
        })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), StrideError> {
        self.db.flush().map_err(storage)?;
        Ok(())
    }

    // ── Challenges ───────────────────────────────────────────────────────────

    pub fn get_challenge(&self, id: &ChallengeId) -> Result<Option<Challenge>, StrideError> {
        match self.challenges.get(id.as_str()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch a challenge that must exist.
    pub fn require_challenge(&self, id: &ChallengeId) -> Result<Challenge, StrideError> {
        self.get_challenge(id)?
            .ok_or_else(|| StrideError::ChallengeNotFound(id.to_string()))
    }

    pub fn put_challenge(&self, challenge: &Challenge) -> Result<(), StrideError> {
        self.challenges
            .insert(challenge.id.as_str(), encode(challenge)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_challenges(&self) -> Result<Vec<Challenge>, StrideError> {
        let mut out = Vec::new();
        for item in self.challenges.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Persist a challenge and its escrow wallet in one atomic commit, so a
    /// crash cannot leave a challenge whose published address has no key.
    pub fn put_challenge_with_escrow(
        &self,
        challenge: &Challenge,
        escrow: &EscrowRecord,
    ) -> Result<(), StrideError> {
        let ch_bytes = encode(challenge)?;
        let es_bytes = encode(escrow)?;
        (&self.challenges, &self.escrow_wallets)
            .transaction(|(challenges, escrows)| {
                challenges.insert(challenge.id.as_str(), ch_bytes.as_slice())?;
                escrows.insert(challenge.id.as_str(), es_bytes.as_slice())?;
                Ok(())
            })
            .map_err(tx_err)?;
        Ok(())
    }

    // ── Memberships ──────────────────────────────────────────────────────────

    pub fn get_membership(
        &self,
        challenge_id: &ChallengeId,
        user_id: &UserId,
    ) -> Result<Option<Membership>, StrideError> {
        let key = membership_key(challenge_id, user_id);
        match self.memberships.get(key).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_membership(&self, membership: &Membership) -> Result<(), StrideError> {
        let key = membership_key(&membership.challenge_id, &membership.user_id);
        self.memberships
            .insert(key.as_str(), encode(membership)?)
            .map_err(storage)?;
        Ok(())
    }

    /// Insert a membership only if none exists for (challenge, user).
    pub fn insert_membership(&self, membership: &Membership) -> Result<(), StrideError> {
        let key = membership_key(&membership.challenge_id, &membership.user_id);
        let prior = self
            .memberships
            .compare_and_swap(key.as_str(), None::<&[u8]>, Some(encode(membership)?))
            .map_err(storage)?;
        if prior.is_err() {
            return Err(StrideError::AlreadyJoined);
        }
        Ok(())
    }

    pub fn iter_memberships(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<Vec<Membership>, StrideError> {
        let prefix = format!("{challenge_id}:");
        let mut out = Vec::new();
        for item in self.memberships.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Submissions ──────────────────────────────────────────────────────────

    pub fn get_submission(&self, id: &SubmissionId) -> Result<Option<Submission>, StrideError> {
        match self.submissions.get(id.as_str()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Create a submission, claiming the (user, challenge, day) slot. Fails
    /// with `DuplicateDailySubmission` while a PENDING or APPROVED submission
    /// holds the slot.
    pub fn insert_submission(
        &self,
        submission: &Submission,
        day: &DateKey,
    ) -> Result<(), StrideError> {
        let sub_bytes = encode(submission)?;
        let slot_key = day_slot_key(&submission.challenge_id, &submission.user_id, day);
        let index_key = format!("{}:{}", submission.challenge_id, submission.id);
        let day_owned = day.clone();
        (&self.submissions, &self.submission_days, &self.submission_index)
            .transaction(move |(submissions, slots, index)| {
                if slots.get(slot_key.as_str())?.is_some() {
                    return abort(StrideError::DuplicateDailySubmission {
                        day: day_owned.to_string(),
                    });
                }
                slots.insert(slot_key.as_str(), submission.id.as_str().as_bytes())?;
                submissions.insert(submission.id.as_str(), sub_bytes.as_slice())?;
                index.insert(index_key.as_str(), b"".as_ref())?;
                Ok(())
            })
            .map_err(tx_err)?;
        Ok(())
    }

    /// Overwrite a submission row. Approval keeps the day slot; rejection
    /// releases it so the participant may submit again for that day.
    pub fn put_submission(
        &self,
        submission: &Submission,
        day: &DateKey,
        release_day_slot: bool,
    ) -> Result<(), StrideError> {
        self.submissions
            .insert(submission.id.as_str(), encode(submission)?)
            .map_err(storage)?;
        if release_day_slot {
            let slot_key = day_slot_key(&submission.challenge_id, &submission.user_id, day);
            self.submission_days.remove(slot_key.as_str()).map_err(storage)?;
        }
        Ok(())
    }

    pub fn iter_submissions(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<Vec<Submission>, StrideError> {
        let prefix = format!("{challenge_id}:");
        let mut out = Vec::new();
        for item in self.submission_index.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item.map_err(storage)?;
            let key = String::from_utf8_lossy(&key);
            let sub_id = SubmissionId::from(&key[prefix.len()..]);
            if let Some(sub) = self.get_submission(&sub_id)? {
                out.push(sub);
            }
        }
        Ok(out)
    }

    /// Commit a moderator approval: the updated submission, the recomputed
    /// membership progress, and the DAILY_BASE job, in one transaction.
    /// Observers never see "approved with no base payout queued".
    ///
    /// The job insert is an upsert on the idempotency key: if a job with the
    /// same fingerprint exists, that row is returned unchanged.
    pub fn commit_approval(
        &self,
        submission: &Submission,
        membership: &Membership,
        job: &PayoutJob,
    ) -> Result<PayoutJob, StrideError> {
        let sub_bytes = encode(submission)?;
        let mem_bytes = encode(membership)?;
        let mem_key = membership_key(&membership.challenge_id, &membership.user_id);
        let job_bytes = encode(job)?;
        let fingerprint = job.idempotency_key();

        let existing = (
            &self.submissions,
            &self.memberships,
            &self.payout_jobs,
            &self.job_index,
        )
            .transaction(move |(submissions, memberships, jobs, index)| {
                submissions.insert(submission.id.as_str(), sub_bytes.as_slice())?;
                memberships.insert(mem_key.as_str(), mem_bytes.as_slice())?;
                if let Some(prior) = jobs.get(fingerprint.as_str())? {
                    return Ok(Some(prior.to_vec()));
                }
                jobs.insert(fingerprint.as_str(), job_bytes.as_slice())?;
                index.insert(job.id.as_str(), fingerprint.as_str().as_bytes())?;
                Ok(None)
            })
            .map_err(tx_err)?;

        match existing {
            Some(bytes) => decode(&bytes),
            None => Ok(job.clone()),
        }
    }

    // ── Escrow wallets ───────────────────────────────────────────────────────

    pub fn get_escrow(&self, challenge_id: &ChallengeId) -> Result<Option<EscrowRecord>, StrideError> {
        match self.escrow_wallets.get(challenge_id.as_str()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_escrow(&self, record: &EscrowRecord) -> Result<(), StrideError> {
        self.escrow_wallets
            .insert(record.challenge_id.as_str(), encode(record)?)
            .map_err(storage)?;
        Ok(())
    }

    // ── Payout jobs ──────────────────────────────────────────────────────────

    pub fn get_job_by_fingerprint(&self, key: &str) -> Result<Option<PayoutJob>, StrideError> {
        match self.payout_jobs.get(key).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_job(&self, id: &JobId) -> Result<Option<PayoutJob>, StrideError> {
        let Some(fingerprint) = self.job_index.get(id.as_str()).map_err(storage)? else {
            return Ok(None);
        };
        self.get_job_by_fingerprint(&String::from_utf8_lossy(&fingerprint))
    }

    /// Idempotent enqueue: insert the job unless its fingerprint is taken,
    /// in which case the existing row is returned unchanged.
    pub fn insert_job_if_absent(&self, job: &PayoutJob) -> Result<PayoutJob, StrideError> {
        let job_bytes = encode(job)?;
        let fingerprint = job.idempotency_key();
        let existing = (&self.payout_jobs, &self.job_index)
            .transaction(move |(jobs, index)| {
                if let Some(prior) = jobs.get(fingerprint.as_str())? {
                    return Ok(Some(prior.to_vec()));
                }
                jobs.insert(fingerprint.as_str(), job_bytes.as_slice())?;
                index.insert(job.id.as_str(), fingerprint.as_str().as_bytes())?;
                Ok(None)
            })
            .map_err(tx_err)?;
        match existing {
            Some(bytes) => decode(&bytes),
            None => Ok(job.clone()),
        }
    }

    /// Unconditional overwrite of an existing job row (status transitions,
    /// resolved wallet persistence). The fingerprint never changes.
    pub fn put_job(&self, job: &PayoutJob) -> Result<(), StrideError> {
        self.payout_jobs
            .insert(job.idempotency_key().as_str(), encode(job)?)
            .map_err(storage)?;
        Ok(())
    }

    /// Atomic conditional transition: succeeds only if the stored row still
    /// byte-equals `expected`. This is the lease primitive — no two workers
    /// can win the same swap.
    pub fn compare_and_swap_job(
        &self,
        expected: &PayoutJob,
        new: &PayoutJob,
    ) -> Result<bool, StrideError> {
        let outcome = self
            .payout_jobs
            .compare_and_swap(
                expected.idempotency_key().as_str(),
                Some(encode(expected)?),
                Some(encode(new)?),
            )
            .map_err(storage)?;
        Ok(outcome.is_ok())
    }

    pub fn iter_jobs(&self) -> Result<Vec<PayoutJob>, StrideError> {
        let mut out = Vec::new();
        for item in self.payout_jobs.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn iter_jobs_for_challenge(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<Vec<PayoutJob>, StrideError> {
        let prefix = format!("{challenge_id}:");
        let mut out = Vec::new();
        for item in self.payout_jobs.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    /// Complete a job and append its ledger row in one transaction: a
    /// COMPLETED job without a ledger entry cannot be observed.
    pub fn commit_completion(
        &self,
        job: &PayoutJob,
        entry: &LedgerEntry,
    ) -> Result<(), StrideError> {
        let job_bytes = encode(job)?;
        let entry_bytes = encode_json(entry)?;
        let fingerprint = job.idempotency_key();
        (&self.payout_jobs, &self.ledger)
            .transaction(move |(jobs, ledger)| {
                jobs.insert(fingerprint.as_str(), job_bytes.as_slice())?;
                ledger.insert(job.id.as_str(), entry_bytes.as_slice())?;
                Ok(())
            })
            .map_err(tx_err)?;
        Ok(())
    }

    // ── Ledger ───────────────────────────────────────────────────────────────

    pub fn get_ledger_entry(&self, job_id: &JobId) -> Result<Option<LedgerEntry>, StrideError> {
        match self.ledger.get(job_id.as_str()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode_json(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn iter_ledger(&self) -> Result<Vec<LedgerEntry>, StrideError> {
        let mut out = Vec::new();
        for item in self.ledger.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode_json(&bytes)?);
        }
        Ok(out)
    }

    // ── Settlements ──────────────────────────────────────────────────────────

    pub fn get_settlement(
        &self,
        challenge_id: &ChallengeId,
        day: &DateKey,
    ) -> Result<Option<DailySettlement>, StrideError> {
        let key = settlement_key(challenge_id, day);
        match self.settlements.get(key).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// First writer wins; later writers get the stored row back. Settlement
    /// rows are immutable once created.
    pub fn insert_settlement_if_absent(
        &self,
        settlement: &DailySettlement,
    ) -> Result<DailySettlement, StrideError> {
        let key = settlement_key(&settlement.challenge_id, &settlement.day_date);
        let outcome = self
            .settlements
            .compare_and_swap(key.as_str(), None::<&[u8]>, Some(encode(settlement)?))
            .map_err(storage)?;
        match outcome {
            Ok(()) => Ok(settlement.clone()),
            Err(cas) => {
                let bytes = cas.current.ok_or_else(|| {
                    StrideError::Storage("settlement row vanished mid-swap".into())
                })?;
                decode(&bytes)
            }
        }
    }

    pub fn iter_settlements(
        &self,
        challenge_id: &ChallengeId,
    ) -> Result<Vec<DailySettlement>, StrideError> {
        let prefix = format!("{challenge_id}:");
        let mut out = Vec::new();
        for item in self.settlements.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Audit log ────────────────────────────────────────────────────────────

    /// Best-effort append; callers log failures and move on.
    pub fn append_audit(&self, entry: &AuditEntry) -> Result<(), StrideError> {
        let seq = self.db.generate_id().map_err(storage)?;
        self.audit
            .insert(seq.to_be_bytes(), encode_json(entry)?)
            .map_err(storage)?;
        Ok(())
    }

    pub fn iter_audit(&self) -> Result<Vec<AuditEntry>, StrideError> {
        let mut out = Vec::new();
        for item in self.audit.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode_json(&bytes)?);
        }
        Ok(out)
    }
}
