use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use stride_chain::{ChainKeypair, TokenGateway};
use stride_core::{
    Instant, PayoutJob, PayoutKind, StrideError, TokenAddress, DEFAULT_WORKER_BATCH,
    DEFAULT_WORKER_TICK_SECS,
};
use stride_escrow::EscrowWallets;
use stride_store::Store;

use crate::queue::PayoutQueue;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub tick_secs: u64,
    pub batch: usize,
    /// DUST_SWEEP destination. Jobs of that kind fail when unset.
    pub treasury: Option<TokenAddress>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_WORKER_TICK_SECS,
            batch: DEFAULT_WORKER_BATCH,
            treasury: None,
        }
    }
}

/// Totals for one tick, logged after each batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub leased: u32,
    pub completed: u32,
    pub failed: u32,
}

/// Whether a processing failure happened before or after the on-chain
/// transfer. The distinction decides between the backoff path and leaving
/// the row PROCESSING.
enum ProcessError {
    BeforeTransfer(StrideError),
    AfterTransfer {
        signature: String,
        error: StrideError,
    },
}

/// The single logical payout worker. Leases jobs one at a time and processes
/// them sequentially — the chain RPC and signer state are easier to reason
/// about serially, and throughput is not the binding constraint.
pub struct PayoutWorker {
    store: Arc<Store>,
    queue: Arc<PayoutQueue>,
    escrow: Arc<EscrowWallets>,
    gateway: Arc<dyn TokenGateway>,
    fee_payer: Arc<ChainKeypair>,
    config: WorkerConfig,
}

impl PayoutWorker {
    pub fn new(
        store: Arc<Store>,
        queue: Arc<PayoutQueue>,
        escrow: Arc<EscrowWallets>,
        gateway: Arc<dyn TokenGateway>,
        fee_payer: Arc<ChainKeypair>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            escrow,
            gateway,
            fee_payer,
            config,
        }
    }

    /// Tick loop. Returns when `shutdown` flips; the in-flight job always
    /// finishes first because ticks are not cancelled mid-batch.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.tick_secs));
        info!(tick_secs = self.config.tick_secs, batch = self.config.batch, "payout worker started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick(chrono::Utc::now()).await {
                        Ok(summary) if summary.leased > 0 => {
                            info!(
                                leased = summary.leased,
                                completed = summary.completed,
                                failed = summary.failed,
                                "payout batch done"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "payout tick failed"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("payout worker stopping");
                    return;
                }
            }
        }
    }

    /// Lease and process up to one batch of due jobs.
    pub async fn tick(&self, now: Instant) -> Result<TickSummary, StrideError> {
        let mut summary = TickSummary::default();
        for _ in 0..self.config.batch {
            let Some(job) = self.queue.lease_one(now)? else {
                break;
            };
            summary.leased += 1;
            match self.process(&job, now).await {
                Ok(()) => summary.completed += 1,
                // Nothing hit the chain: safe to hand the job back to the
                // queue's backoff path.
                Err(ProcessError::BeforeTransfer(e)) => {
                    summary.failed += 1;
                    warn!(job = %job.id, error = %e, attempt = job.attempts, "payout attempt failed");
                    if let Err(fail_err) = self.queue.fail(&job, e.to_string(), now) {
                        error!(job = %job.id, error = %fail_err, "could not record payout failure");
                    }
                }
                // The transfer went out but the completion record did not
                // land. Re-queueing would risk a second send; leave the row
                // PROCESSING for the operator, exactly like a crash
                // mid-transfer.
                Err(ProcessError::AfterTransfer { signature, error }) => {
                    summary.failed += 1;
                    error!(
                        job = %job.id,
                        %signature,
                        error = %error,
                        "transfer sent but completion not recorded; job left PROCESSING"
                    );
                }
            }
        }
        Ok(summary)
    }

    async fn process(&self, job: &PayoutJob, now: Instant) -> Result<(), ProcessError> {
        let recipient = self.resolve_wallet(job).map_err(ProcessError::BeforeTransfer)?;

        // The escrow must exist and hold enough before we sign anything.
        let escrow_record = self
            .store
            .get_escrow(&job.challenge_id)
            .map_err(ProcessError::BeforeTransfer)?
            .ok_or_else(|| {
                ProcessError::BeforeTransfer(StrideError::EscrowWalletMissing(
                    job.challenge_id.to_string(),
                ))
            })?;

        let balance = self
            .gateway
            .token_balance(&escrow_record.public_key)
            .await
            .map_err(ProcessError::BeforeTransfer)?;
        if balance < job.amount_micros {
            return Err(ProcessError::BeforeTransfer(
                StrideError::InsufficientEscrowBalance {
                    need: job.amount_micros,
                    have: balance,
                },
            ));
        }

        let signer = self
            .escrow
            .load(&job.challenge_id)
            .map_err(ProcessError::BeforeTransfer)?;
        let signature = self
            .gateway
            .transfer(&signer, &self.fee_payer, &recipient, job.amount_micros)
            .await
            .map_err(ProcessError::BeforeTransfer)?;

        self.queue
            .complete(job, signature.clone(), now)
            .map_err(|error| ProcessError::AfterTransfer { signature, error })?;
        Ok(())
    }

    /// Destination resolution. Dust sweeps always go to treasury; other jobs
    /// prefer the address on the row, then the membership, and persist the
    /// resolved value back so retries skip the lookup.
    fn resolve_wallet(&self, job: &PayoutJob) -> Result<TokenAddress, StrideError> {
        if job.kind == PayoutKind::DustSweep {
            return self
                .config
                .treasury
                .clone()
                .ok_or(StrideError::TreasuryUnconfigured);
        }
        if let Some(wallet) = &job.wallet_address {
            return Ok(wallet.clone());
        }
        let membership = self
            .store
            .get_membership(&job.challenge_id, &job.user_id)?
            .ok_or_else(|| StrideError::MembershipNotFound(job.challenge_id.to_string()))?;
        self.queue.record_wallet(job, membership.wallet_address.clone())?;
        Ok(membership.wallet_address)
    }
}
