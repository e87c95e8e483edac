//! End-to-end settlement and payout scenarios, driven through the real
//! store, queue, escrow, and worker against the in-memory chain gateway.

use std::sync::Arc;

use base64::Engine;
use chrono::{Duration, TimeZone, Utc};

use stride_chain::{mock::MockGateway, ChainKeypair, TokenGateway};
use stride_core::{
    Challenge, ChallengeId, Instant, JobStatus, MembershipStatus, PayoutKind, StrideError,
    SubmissionStatus, TokenAddress, UserId, MICROS_PER_TOKEN,
};
use stride_escrow::{EscrowWallets, MasterKey};
use stride_payout::{EnqueueRequest, PayoutQueue, PayoutWorker, QueueConfig, WorkerConfig};
use stride_settlement::{
    ApprovalHook, ChallengeAdmin, Finalizer, NewChallenge, SettlementEngine,
};
use stride_store::Store;
use stride_time::ChallengeZone;

// ── Harness ──────────────────────────────────────────────────────────────────

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<Store>,
    queue: Arc<PayoutQueue>,
    escrow: Arc<EscrowWallets>,
    gateway: Arc<MockGateway>,
    admin: ChallengeAdmin,
    hook: ApprovalHook,
    engine: SettlementEngine,
    zone: ChallengeZone,
    fee_payer: Arc<ChainKeypair>,
    treasury: TokenAddress,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let master = MasterKey::from_base64(
            &base64::engine::general_purpose::STANDARD.encode([7u8; 32]),
        )
        .unwrap();
        let escrow = Arc::new(EscrowWallets::new(Arc::clone(&store), Some(master)));
        let queue = Arc::new(PayoutQueue::new(Arc::clone(&store), QueueConfig::default()));
        let gateway = Arc::new(MockGateway::new());
        let zone = ChallengeZone::utc();
        Self {
            admin: ChallengeAdmin::new(
                Arc::clone(&store),
                Arc::clone(&escrow),
                Arc::clone(&gateway) as Arc<dyn TokenGateway>,
                zone,
            ),
            hook: ApprovalHook::new(Arc::clone(&store), Arc::clone(&queue), zone),
            engine: SettlementEngine::new(Arc::clone(&store), Arc::clone(&queue), zone),
            _dir: dir,
            store,
            queue,
            escrow,
            gateway,
            zone,
            fee_payer: Arc::new(ChainKeypair::generate()),
            treasury: TokenAddress::from_bytes([255u8; 32]),
        }
    }

    fn finalizer(&self) -> Finalizer {
        Finalizer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.queue),
            Arc::clone(&self.gateway) as Arc<dyn TokenGateway>,
            self.zone,
            Some(self.treasury.clone()),
        )
    }

    fn worker(&self) -> PayoutWorker {
        PayoutWorker::new(
            Arc::clone(&self.store),
            Arc::clone(&self.queue),
            Arc::clone(&self.escrow),
            Arc::clone(&self.gateway) as Arc<dyn TokenGateway>,
            Arc::clone(&self.fee_payer),
            WorkerConfig {
                tick_secs: 1,
                batch: 10,
                treasury: Some(self.treasury.clone()),
            },
        )
    }

    /// Stake `stake_tokens` display units per participant, `days`-day
    /// window from June 1. Escrow is funded with `participants * stake`.
    fn challenge(&self, stake_tokens: u64, days: i64, participants: u64) -> Challenge {
        let challenge = self
            .admin
            .create_challenge(
                NewChallenge {
                    title: "daily workout".into(),
                    stake_micros: stake_tokens * MICROS_PER_TOKEN,
                    start_date: start(),
                    end_date: start() + Duration::days(days),
                },
                start() - Duration::days(3),
            )
            .unwrap();
        self.gateway.fund(
            challenge.escrow_address.as_ref().unwrap(),
            participants * stake_tokens * MICROS_PER_TOKEN,
        );
        challenge
    }

    async fn join(&self, challenge: &ChallengeId, user: &str, wallet_byte: u8) -> TokenAddress {
        let wallet = TokenAddress::from_bytes([wallet_byte; 32]);
        self.admin
            .join_challenge(
                challenge,
                &UserId::from(user),
                wallet.clone(),
                None,
                start() - Duration::days(1),
            )
            .await
            .unwrap();
        wallet
    }

    /// Submit and approve a proof for challenge-day `day` (1-based).
    fn show_up(&self, challenge: &ChallengeId, user: &str, day: i64) {
        let at = day_instant(day);
        let submission = self
            .admin
            .submit_proof(challenge, &UserId::from(user), at)
            .unwrap();
        self.hook
            .approve(&submission.id, "mod-1", at + Duration::hours(1))
            .unwrap();
    }

    fn settle_all_days(&self, challenge: &ChallengeId, days: i64) {
        for day in 1..=days {
            let key = self.zone.date_key(day_instant(day));
            self.engine
                .settle_day(challenge, &key, after_end(days))
                .unwrap();
        }
    }

    /// Run worker ticks until the queue has no leasable work left.
    async fn drain(&self, now: Instant) {
        let worker = self.worker();
        loop {
            let summary = worker.tick(now).await.unwrap();
            if summary.leased == 0 {
                break;
            }
        }
    }

    fn jobs_of_kind(&self, kind: PayoutKind) -> Vec<stride_core::PayoutJob> {
        self.store
            .iter_jobs()
            .unwrap()
            .into_iter()
            .filter(|j| j.kind == kind)
            .collect()
    }
}

fn start() -> Instant {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

/// 10:00 on challenge-day `day` (1-based).
fn day_instant(day: i64) -> Instant {
    start() + Duration::days(day - 1) + Duration::hours(10)
}

fn after_end(days: i64) -> Instant {
    start() + Duration::days(days) + Duration::hours(1)
}

// ── Scenario 1: solo perfect attendance ──────────────────────────────────────

#[tokio::test]
async fn solo_perfect_attendance_pays_the_whole_stake_back() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);

    let wallet = h.join(&challenge.id, "alice", 1).await;
    for day in 1..=10 {
        h.show_up(&challenge.id, "alice", day);
    }
    h.settle_all_days(&challenge.id, 10);

    // Ten base jobs of 10 tokens each; no bonuses anywhere.
    let base = h.jobs_of_kind(PayoutKind::DailyBase);
    assert_eq!(base.len(), 10);
    assert!(base.iter().all(|j| j.amount_micros == 10 * MICROS_PER_TOKEN));
    assert!(h.jobs_of_kind(PayoutKind::DailyBonus).is_empty());

    let settlements = h.store.iter_settlements(&challenge.id).unwrap();
    assert_eq!(settlements.len(), 10);
    for s in &settlements {
        assert_eq!((s.total_active, s.showed_up, s.missed), (1, 1, 0));
        assert_eq!(s.bonus_per_person, 0);
        assert_eq!(s.total_distributed, 0);
    }

    h.drain(after_end(10)).await;
    assert_eq!(h.gateway.balance_of(&wallet), 100 * MICROS_PER_TOKEN);

    // Every completed job has exactly one matching ledger row.
    for job in h.store.iter_jobs().unwrap() {
        assert_eq!(job.status, JobStatus::Completed);
        let entry = h.store.get_ledger_entry(&job.id).unwrap().unwrap();
        assert_eq!(Some(entry.transaction_signature), job.transaction_signature);
    }

    let outcome = h
        .finalizer()
        .close_challenge(&challenge.id, after_end(10))
        .await
        .unwrap();
    assert_eq!(outcome.outcomes.len(), 1);
    assert_eq!(outcome.outcomes[0].status, MembershipStatus::Completed);
    assert!(outcome.dust_sweep.is_none());

    let membership = h
        .store
        .get_membership(&challenge.id, &UserId::from("alice"))
        .unwrap()
        .unwrap();
    assert_eq!(membership.status, MembershipStatus::Completed);
    assert!((membership.progress - 100.0).abs() < 1e-9);
}

// ── Scenario 2: bonus redistribution ─────────────────────────────────────────

#[tokio::test]
async fn missed_days_redistribute_to_those_who_showed_up() {
    let h = Harness::new();
    let challenge = h.challenge(100, 5, 2);
    let wallet_a = h.join(&challenge.id, "a", 1).await;
    let wallet_b = h.join(&challenge.id, "b", 2).await;

    for day in 1..=5 {
        h.show_up(&challenge.id, "a", day);
    }
    for day in 1..=3 {
        h.show_up(&challenge.id, "b", day);
    }
    h.settle_all_days(&challenge.id, 5);

    // Base: A x5 + B x3, all at 20 tokens.
    let base = h.jobs_of_kind(PayoutKind::DailyBase);
    assert_eq!(base.len(), 8);
    assert!(base.iter().all(|j| j.amount_micros == 20 * MICROS_PER_TOKEN));

    // Bonus: days 4 and 5 pay A the forfeited 20 tokens; days 1-3 enqueue
    // nothing.
    let bonus = h.jobs_of_kind(PayoutKind::DailyBonus);
    assert_eq!(bonus.len(), 2);
    assert!(bonus
        .iter()
        .all(|j| j.user_id == UserId::from("a") && j.amount_micros == 20 * MICROS_PER_TOKEN));

    let settlements = h.store.iter_settlements(&challenge.id).unwrap();
    for s in &settlements {
        // The settlement arithmetic invariant.
        assert_eq!(s.total_distributed, s.showed_up as u64 * s.bonus_per_person);
        assert_eq!(s.showed_up + s.missed, s.total_active);
    }

    h.drain(after_end(5)).await;
    assert_eq!(h.gateway.balance_of(&wallet_a), 140 * MICROS_PER_TOKEN);
    assert_eq!(h.gateway.balance_of(&wallet_b), 60 * MICROS_PER_TOKEN);

    let outcome = h
        .finalizer()
        .close_challenge(&challenge.id, after_end(5))
        .await
        .unwrap();
    let verdict = |user: &str| {
        outcome
            .outcomes
            .iter()
            .find(|o| o.user_id == UserId::from(user))
            .unwrap()
            .status
    };
    assert_eq!(verdict("a"), MembershipStatus::Completed);
    assert_eq!(verdict("b"), MembershipStatus::Failed); // 3/5 = 60% < 80%
}

// ── Scenario 3: consecutive misses fail despite the rate ─────────────────────

#[tokio::test]
async fn two_consecutive_misses_fail_a_participant() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;

    for day in [1, 2, 5, 6, 7, 8, 9, 10] {
        h.show_up(&challenge.id, "alice", day);
    }

    let outcome = h
        .finalizer()
        .close_challenge(&challenge.id, after_end(10))
        .await
        .unwrap();
    // 8/10 = 80% meets the completion bar, but days 3-4 were missed
    // back to back.
    assert_eq!(outcome.outcomes[0].status, MembershipStatus::Failed);
    assert_eq!(outcome.outcomes[0].max_consecutive_misses, 2);
    assert!((outcome.outcomes[0].completion_rate - 0.8).abs() < 1e-9);
}

// ── Scenario 4: idempotent double approval ───────────────────────────────────

#[tokio::test]
async fn double_approval_is_rejected_and_queues_one_job() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;

    let at = day_instant(1);
    let submission = h
        .admin
        .submit_proof(&challenge.id, &UserId::from("alice"), at)
        .unwrap();

    h.hook.approve(&submission.id, "mod-1", at).unwrap();
    let second = h.hook.approve(&submission.id, "mod-2", at);
    assert!(matches!(
        second,
        Err(StrideError::SubmissionNotPending { .. })
    ));
    assert_eq!(h.store.iter_jobs().unwrap().len(), 1);
}

#[tokio::test]
async fn enqueue_twice_returns_the_same_row() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;

    let request = || EnqueueRequest {
        user_id: UserId::from("alice"),
        challenge_id: challenge.id.clone(),
        amount_micros: 5 * MICROS_PER_TOKEN,
        kind: PayoutKind::DailyBonus,
        day_date: h.zone.date_key(day_instant(2)),
        wallet_address: None,
    };
    let first = h.queue.enqueue(request(), day_instant(2)).unwrap();
    let second = h.queue.enqueue(request(), day_instant(3)).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at, second.created_at);
}

// ── Scenario 5: worker restart mid-transfer ──────────────────────────────────

#[tokio::test]
async fn processing_rows_survive_a_crash_until_operator_retry() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;
    h.show_up(&challenge.id, "alice", 1);

    // Lease the job, then "die" before transferring.
    let leased = h.queue.lease_one(day_instant(1)).unwrap().unwrap();
    assert_eq!(leased.status, JobStatus::Processing);

    // A restarted worker leaves the row alone: it is operator-visible, not
    // silently re-run.
    let summary = h.worker().tick(day_instant(1)).await.unwrap();
    assert_eq!(summary.leased, 0);
    assert_eq!(h.queue.stats().unwrap().processing, 1);

    // Manual retry resets it; the next tick pays exactly once.
    h.queue.retry(&leased.id, None).unwrap();
    h.drain(day_instant(1)).await;
    assert_eq!(h.queue.stats().unwrap().completed, 1);
    assert_eq!(h.gateway.transfers().len(), 1);
}

// ── Scenario 6: dust sweeping ────────────────────────────────────────────────

#[tokio::test]
async fn one_micro_of_dust_is_below_the_sweep_threshold() {
    let h = Harness::new();
    let challenge = h.challenge(100, 3, 1);
    h.join(&challenge.id, "alice", 1).await;
    for day in 1..=3 {
        h.show_up(&challenge.id, "alice", day);
    }
    h.settle_all_days(&challenge.id, 3);
    h.drain(after_end(3)).await;

    // floor(100e6 / 3) * 3 = 99_999_999 paid; exactly 1 micro remains.
    let escrow_address = challenge.escrow_address.as_ref().unwrap();
    assert_eq!(h.gateway.balance_of(escrow_address), 1);

    let outcome = h
        .finalizer()
        .close_challenge(&challenge.id, after_end(3))
        .await
        .unwrap();
    assert!(outcome.dust_sweep.is_none());
}

#[tokio::test]
async fn meaningful_residue_is_swept_to_treasury() {
    let h = Harness::new();
    let challenge = h.challenge(100, 3, 1);
    h.join(&challenge.id, "alice", 1).await;
    h.show_up(&challenge.id, "alice", 1);
    h.settle_all_days(&challenge.id, 3);
    h.drain(after_end(3)).await;

    // One base payout of 33.333333 left the escrow; the rest is forfeit.
    let outcome = h
        .finalizer()
        .close_challenge(&challenge.id, after_end(3))
        .await
        .unwrap();
    let sweep = outcome.dust_sweep.expect("residue exceeds the threshold");
    assert_eq!(sweep.kind, PayoutKind::DustSweep);
    assert_eq!(sweep.amount_micros, 100 * MICROS_PER_TOKEN - 33_333_333);

    h.drain(after_end(3) + Duration::hours(1)).await;
    assert_eq!(
        h.gateway.balance_of(&h.treasury),
        100 * MICROS_PER_TOKEN - 33_333_333
    );

    // The latch holds: nothing further may be enqueued for this challenge.
    let refused = h.queue.enqueue(
        EnqueueRequest {
            user_id: UserId::from("alice"),
            challenge_id: challenge.id.clone(),
            amount_micros: 1,
            kind: PayoutKind::DailyBonus,
            day_date: h.zone.date_key(day_instant(1)),
            wallet_address: None,
        },
        after_end(3),
    );
    assert!(matches!(refused, Err(StrideError::ChallengeFinalized)));
}

// ── Transient failures and the backoff path ──────────────────────────────────

#[tokio::test]
async fn transfer_failures_back_off_and_eventually_surface() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;
    h.show_up(&challenge.id, "alice", 1);

    h.gateway.fail_next_transfers(3);

    // Three ticks spaced beyond every backoff window exhaust the budget.
    let worker = h.worker();
    for hours in [0, 1, 2] {
        let summary = worker
            .tick(after_end(10) + Duration::hours(hours))
            .await
            .unwrap();
        assert_eq!(summary.failed, 1);
    }

    let failed = h.queue.list_failed(Some(&challenge.id)).unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].last_error.as_deref().unwrap().contains("injected"));

    // Operator retry-all clears the way; the gateway is healthy again.
    assert_eq!(h.queue.retry_all_failed(Some(&challenge.id)).unwrap(), 1);
    h.drain(after_end(10) + Duration::hours(3)).await;
    assert_eq!(h.queue.stats().unwrap().completed, 1);
}

#[tokio::test]
async fn underfunded_escrow_is_a_retryable_failure() {
    let h = Harness::new();
    let challenge = h
        .admin
        .create_challenge(
            NewChallenge {
                title: "unfunded".into(),
                stake_micros: 100 * MICROS_PER_TOKEN,
                start_date: start(),
                end_date: start() + Duration::days(10),
            },
            start() - Duration::days(3),
        )
        .unwrap();
    h.join(&challenge.id, "alice", 1).await;
    h.show_up(&challenge.id, "alice", 1);

    let summary = h.worker().tick(day_instant(1)).await.unwrap();
    assert_eq!(summary.failed, 1);

    let job = &h.store.iter_jobs().unwrap()[0];
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job
        .last_error
        .as_deref()
        .unwrap()
        .contains("insufficient escrow balance"));
}

// ── Day-slot and moderation guards ───────────────────────────────────────────

#[tokio::test]
async fn one_submission_slot_per_day_until_rejection() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;
    let alice = UserId::from("alice");

    let first = h
        .admin
        .submit_proof(&challenge.id, &alice, day_instant(1))
        .unwrap();
    let blocked = h
        .admin
        .submit_proof(&challenge.id, &alice, day_instant(1) + Duration::hours(2));
    assert!(matches!(
        blocked,
        Err(StrideError::DuplicateDailySubmission { .. })
    ));

    // Rejection frees the slot for a second try the same day.
    h.hook
        .reject(&first.id, "mod-1", "blurry photo", "quality", day_instant(1))
        .unwrap();
    let retried = h
        .admin
        .submit_proof(&challenge.id, &alice, day_instant(1) + Duration::hours(3))
        .unwrap();
    assert_eq!(retried.status, SubmissionStatus::Pending);

    // Next day is its own slot.
    h.admin
        .submit_proof(&challenge.id, &alice, day_instant(2))
        .unwrap();
}

#[tokio::test]
async fn settle_day_is_idempotent_and_range_checked() {
    let h = Harness::new();
    let challenge = h.challenge(100, 5, 2);
    h.join(&challenge.id, "a", 1).await;
    h.join(&challenge.id, "b", 2).await;
    h.show_up(&challenge.id, "a", 1);

    let day1 = h.zone.date_key(day_instant(1));
    let first = h.engine.settle_day(&challenge.id, &day1, after_end(5)).unwrap();
    let second = h.engine.settle_day(&challenge.id, &day1, after_end(5)).unwrap();
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(h.jobs_of_kind(PayoutKind::DailyBonus).len(), 1);

    // endDate's own key is not a settlement day.
    let end_key = h.zone.date_key(start() + Duration::days(5));
    assert!(matches!(
        h.engine.settle_day(&challenge.id, &end_key, after_end(5)),
        Err(StrideError::InvalidDateInput(_))
    ));
}

#[tokio::test]
async fn paused_challenges_skip_the_cron_but_keep_draining() {
    let h = Harness::new();
    let challenge = h.challenge(100, 5, 1);
    let wallet = h.join(&challenge.id, "alice", 1).await;
    h.show_up(&challenge.id, "alice", 1);

    h.admin
        .set_paused(&challenge.id, true, day_instant(2))
        .unwrap();

    // Cron pass the morning after day 1: nothing settles while paused.
    let settled = h.engine.run_due(day_instant(2)).unwrap();
    assert!(settled.is_empty());

    // The already-queued base payout still pays out.
    h.drain(day_instant(2)).await;
    assert_eq!(h.gateway.balance_of(&wallet), 20 * MICROS_PER_TOKEN);

    // Unpause and the same cron pass settles yesterday.
    h.admin
        .set_paused(&challenge.id, false, day_instant(2))
        .unwrap();
    let settled = h.engine.run_due(day_instant(2)).unwrap();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].day_date, h.zone.date_key(day_instant(1)));
}

#[tokio::test]
async fn ending_early_advances_the_window_and_allows_close() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;
    h.show_up(&challenge.id, "alice", 1);

    let cut = day_instant(3);
    let updated = h.admin.end_early(&challenge.id, cut).unwrap();
    assert!(updated.ended_early);
    assert_eq!(updated.end_date, cut);

    let outcome = h
        .finalizer()
        .close_challenge(&challenge.id, cut + Duration::hours(1))
        .await
        .unwrap();
    // The cut lands mid-day on day 3; the end key is exclusive, so the
    // window is now two days with one approved.
    assert!((outcome.outcomes[0].completion_rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn close_requires_the_end_date_to_have_passed() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 1);
    h.join(&challenge.id, "alice", 1).await;

    let early = h.finalizer().close_challenge(&challenge.id, day_instant(5)).await;
    assert!(matches!(early, Err(StrideError::ChallengeNotEnded { .. })));

    h.finalizer()
        .close_challenge(&challenge.id, after_end(10))
        .await
        .unwrap();
    let again = h.finalizer().close_challenge(&challenge.id, after_end(10)).await;
    assert!(matches!(again, Err(StrideError::ChallengeFinalized)));
}

#[tokio::test]
async fn join_guards_hold() {
    let h = Harness::new();
    let challenge = h.challenge(100, 10, 2);
    h.join(&challenge.id, "alice", 1).await;

    // No duplicate membership.
    let again = h
        .admin
        .join_challenge(
            &challenge.id,
            &UserId::from("alice"),
            TokenAddress::from_bytes([1u8; 32]),
            None,
            start() - Duration::days(1),
        )
        .await;
    assert!(matches!(again, Err(StrideError::AlreadyJoined)));

    // No joining once the challenge has started.
    let late = h
        .admin
        .join_challenge(
            &challenge.id,
            &UserId::from("bob"),
            TokenAddress::from_bytes([2u8; 32]),
            None,
            day_instant(1),
        )
        .await;
    assert!(matches!(late, Err(StrideError::JoinAfterStart)));
}

#[tokio::test]
async fn join_verifies_the_stake_deposit_when_given_a_signature() {
    let h = Harness::new();
    let challenge = h
        .admin
        .create_challenge(
            NewChallenge {
                title: "verified stakes".into(),
                stake_micros: 100 * MICROS_PER_TOKEN,
                start_date: start(),
                end_date: start() + Duration::days(10),
            },
            start() - Duration::days(3),
        )
        .unwrap();
    let escrow_address = challenge.escrow_address.clone().unwrap();

    // Alice deposits her stake from her own wallet into escrow.
    let alice_keys = ChainKeypair::generate();
    h.gateway.fund(&alice_keys.address(), 100 * MICROS_PER_TOKEN);
    let deposit_sig = h
        .gateway
        .transfer(
            &alice_keys,
            &h.fee_payer,
            &escrow_address,
            100 * MICROS_PER_TOKEN,
        )
        .await
        .unwrap();

    // A bogus signature is rejected; the real one admits her.
    let bogus = h
        .admin
        .join_challenge(
            &challenge.id,
            &UserId::from("alice"),
            alice_keys.address(),
            Some("not-a-real-signature"),
            start() - Duration::days(1),
        )
        .await;
    assert!(matches!(bogus, Err(StrideError::StakeNotVerified(_))));

    let joined = h
        .admin
        .join_challenge(
            &challenge.id,
            &UserId::from("alice"),
            alice_keys.address(),
            Some(&deposit_sig),
            start() - Duration::days(1),
        )
        .await
        .unwrap();
    assert_eq!(joined.wallet_address, alice_keys.address());
}
