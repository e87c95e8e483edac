//! stride-node — the payout-core service binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the sled store
//!   2. Build the chain gateway, escrow store, and payout queue
//!   3. Start the admin JSON-RPC 2.0 server
//!   4. If this replica is worker-enabled: spawn the payout worker tick
//!      loop and the hourly settlement cron
//!   5. Wait for SIGTERM/ctrl-c; finish the in-flight job, then exit
//!
//! At most one worker-enabled replica may run per deployment; the
//! `PAYOUT_WORKER_ENABLED` flag is the gate.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Timelike;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use stride_chain::RpcTokenGateway;
use stride_core::{
    DEFAULT_BACKOFF_BASE_SECS, DEFAULT_DUST_THRESHOLD_MICROS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_WORKER_BATCH, DEFAULT_WORKER_TICK_SECS,
};
use stride_escrow::EscrowWallets;
use stride_payout::{PayoutQueue, PayoutWorker, QueueConfig, WorkerConfig};
use stride_rpc::{AdminServer, AdminState};
use stride_settlement::{ApprovalHook, ChallengeAdmin, Finalizer, SettlementEngine};
use stride_store::Store;

mod config;
use config::EnvConfig;

/// Minute of each hour at which the settlement cron fires. Hourly reruns
/// tolerate missed ticks; settle_day is idempotent.
const CRON_MINUTE: u32 = 5;

#[derive(Parser, Debug)]
#[command(
    name = "stride-node",
    version,
    about = "Stride payout core — escrowed daily payouts for staking challenges"
)]
struct Args {
    /// Directory for the persistent store.
    #[arg(long, default_value = "~/.stride/data")]
    data_dir: PathBuf,

    /// Admin JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8791")]
    rpc_addr: SocketAddr,

    /// Seconds between payout worker ticks.
    #[arg(long, default_value_t = DEFAULT_WORKER_TICK_SECS)]
    worker_tick_secs: u64,

    /// Jobs leased per worker tick.
    #[arg(long, default_value_t = DEFAULT_WORKER_BATCH)]
    worker_batch: usize,

    /// Retry backoff base in seconds (delay = base * 4^(attempt-1)).
    #[arg(long, default_value_t = DEFAULT_BACKOFF_BASE_SECS)]
    backoff_base_secs: i64,

    /// Attempts before a payout job turns terminal FAILED.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Escrow residue below this many micros is left behind at close.
    #[arg(long, default_value_t = DEFAULT_DUST_THRESHOLD_MICROS)]
    dust_threshold_micros: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stride=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let mut env = EnvConfig::from_env()?;
    info!("stride node starting");

    // ── Store ────────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let store = Arc::new(Store::open(&data_dir).context("opening store")?);

    // ── Chain gateway / escrow / queue ───────────────────────────────────────
    let gateway = Arc::new(RpcTokenGateway::new(
        &env.chain_rpc_url,
        env.token_mint.clone(),
    ));
    let escrow = Arc::new(EscrowWallets::new(
        Arc::clone(&store),
        env.master_key.take(),
    ));
    let queue = Arc::new(PayoutQueue::new(
        Arc::clone(&store),
        QueueConfig {
            max_attempts: args.max_attempts,
            backoff_base_secs: args.backoff_base_secs,
        },
    ));

    // ── Services ─────────────────────────────────────────────────────────────
    let zone = env.zone;
    let admin = ChallengeAdmin::new(
        Arc::clone(&store),
        Arc::clone(&escrow),
        gateway.clone() as Arc<dyn stride_chain::TokenGateway>,
        zone,
    );
    let hook = ApprovalHook::new(Arc::clone(&store), Arc::clone(&queue), zone);
    let engine = SettlementEngine::new(Arc::clone(&store), Arc::clone(&queue), zone);
    let finalizer = Finalizer::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        gateway.clone() as Arc<dyn stride_chain::TokenGateway>,
        zone,
        env.treasury.clone(),
    )
    .with_dust_threshold(args.dust_threshold_micros);

    // ── Admin RPC server ─────────────────────────────────────────────────────
    let rpc_state = Arc::new(AdminState {
        store: Arc::clone(&store),
        queue: Arc::clone(&queue),
        gateway: gateway.clone() as Arc<dyn stride_chain::TokenGateway>,
        admin,
        hook,
        engine,
        finalizer,
        zone,
    });
    let _rpc_handle = AdminServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting admin RPC server")?;

    // ── Worker + settlement cron (gated per replica) ─────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if env.worker_enabled {
        let fee_payer = Arc::new(env.require_fee_payer()?);
        let worker = PayoutWorker::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&escrow),
            gateway.clone() as Arc<dyn stride_chain::TokenGateway>,
            fee_payer,
            WorkerConfig {
                tick_secs: args.worker_tick_secs,
                batch: args.worker_batch,
                treasury: env.treasury.clone(),
            },
        );
        let worker_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { worker.run(worker_shutdown).await });

        let cron_engine =
            SettlementEngine::new(Arc::clone(&store), Arc::clone(&queue), zone);
        let cron_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { settlement_cron(cron_engine, cron_shutdown).await });
    } else {
        info!("payout worker disabled on this replica (PAYOUT_WORKER_ENABLED unset)");
    }

    info!("node ready");
    wait_for_shutdown().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Give the worker a moment to finish its in-flight job before the
    // process exits and the store flushes.
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    store.flush().context("flushing store")?;
    Ok(())
}

/// Hourly settlement cron: fires at minute 5 of every hour and settles
/// yesterday for every running challenge.
async fn settlement_cron(
    engine: SettlementEngine,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(minute = CRON_MINUTE, "settlement cron started");
    loop {
        let wait = until_next_cron_tick(chrono::Utc::now());
        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                match engine.run_due(chrono::Utc::now()) {
                    Ok(settled) if !settled.is_empty() => {
                        info!(count = settled.len(), "settlement cron pass done")
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "settlement cron pass failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("settlement cron stopping");
                return;
            }
        }
    }
}

/// Time until the next HH:05:00.
fn until_next_cron_tick(now: chrono::DateTime<chrono::Utc>) -> std::time::Duration {
    let this_hour = now
        .with_minute(CRON_MINUTE)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("minute 5 is always a valid wall-clock time");
    let next = if this_hour > now {
        this_hour
    } else {
        this_hour + chrono::Duration::hours(1)
    };
    (next - now).to_std().unwrap_or_default()
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("installing SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
