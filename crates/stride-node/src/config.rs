//! Environment configuration for the service binary. Flags carry tunables;
//! secrets and endpoints come from the environment.

use anyhow::{bail, Context};

use stride_chain::ChainKeypair;
use stride_core::TokenAddress;
use stride_escrow::MasterKey;
use stride_time::ChallengeZone;

pub struct EnvConfig {
    pub chain_rpc_url: String,
    pub token_mint: TokenAddress,
    pub master_key: Option<MasterKey>,
    pub fee_payer: Option<ChainKeypair>,
    pub treasury: Option<TokenAddress>,
    pub worker_enabled: bool,
    pub zone: ChallengeZone,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl EnvConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let chain_rpc_url =
            env_opt("CHAIN_RPC_URL").context("CHAIN_RPC_URL is required")?;
        let token_mint = env_opt("TOKEN_MINT").context("TOKEN_MINT is required")?;
        let token_mint = TokenAddress::from_b58(&token_mint)
            .map_err(|e| anyhow::anyhow!("TOKEN_MINT: {e}"))?;

        // Absent master key is tolerated at boot: only escrow-touching
        // operations fail, with a clear code, until it is configured.
        let master_key = match env_opt("ESCROW_ENCRYPTION_KEY") {
            Some(encoded) => Some(
                MasterKey::from_base64(&encoded)
                    .map_err(|e| anyhow::anyhow!("ESCROW_ENCRYPTION_KEY: {e}"))?,
            ),
            None => None,
        };

        let fee_payer = Self::load_fee_payer()?;

        let treasury = env_opt("TREASURY_ADDRESS")
            .map(|t| TokenAddress::from_b58(&t))
            .transpose()
            .map_err(|e| anyhow::anyhow!("TREASURY_ADDRESS: {e}"))?;

        let worker_enabled = env_opt("PAYOUT_WORKER_ENABLED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(false);

        let zone_spec = env_opt("CHALLENGE_TIMEZONE").unwrap_or_else(|| "+05:30".into());
        let zone = ChallengeZone::parse(&zone_spec)
            .map_err(|e| anyhow::anyhow!("CHALLENGE_TIMEZONE: {e}"))?;

        Ok(Self {
            chain_rpc_url,
            token_mint,
            master_key,
            fee_payer,
            treasury,
            worker_enabled,
            zone,
        })
    }

    /// The fee-payer signer: inline JSON (`ORACLE_KEYPAIR_JSON`) wins over a
    /// keyfile path (`ORACLE_KEYPAIR_PATH`). Loaded once; shared read-only.
    fn load_fee_payer() -> anyhow::Result<Option<ChainKeypair>> {
        if let Some(json) = env_opt("ORACLE_KEYPAIR_JSON") {
            let kp = ChainKeypair::from_json(&json)
                .map_err(|e| anyhow::anyhow!("ORACLE_KEYPAIR_JSON: {e}"))?;
            return Ok(Some(kp));
        }
        if let Some(path) = env_opt("ORACLE_KEYPAIR_PATH") {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading oracle keypair from {path}"))?;
            let kp = ChainKeypair::from_json(&json)
                .map_err(|e| anyhow::anyhow!("ORACLE_KEYPAIR_PATH: {e}"))?;
            return Ok(Some(kp));
        }
        Ok(None)
    }

    /// A worker-enabled replica cannot run without its transfer signer;
    /// surface that at boot instead of on the first leased job.
    pub fn require_fee_payer(&mut self) -> anyhow::Result<ChainKeypair> {
        match self.fee_payer.take() {
            Some(kp) => Ok(kp),
            None => bail!(
                "PAYOUT_WORKER_ENABLED is set but no fee-payer is configured \
                 (set ORACLE_KEYPAIR_JSON or ORACLE_KEYPAIR_PATH)"
            ),
        }
    }
}
