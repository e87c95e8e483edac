use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use stride_core::{Micros, StrideError, TokenAddress};

use crate::keypair::ChainKeypair;

/// The unsigned body of a token transfer, serialized canonically (bincode)
/// for signing and submission. The chain-facing signature string is the
/// base-58 of the source signer's signature over these bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub mint: TokenAddress,
    pub source: TokenAddress,
    pub destination: TokenAddress,
    pub amount_micros: Micros,
    pub fee_payer: TokenAddress,
    /// Unix millis; keeps two otherwise-identical transfers distinct on the
    /// wire so their signatures differ.
    pub created_at_ms: i64,
}

impl TransferRequest {
    pub fn body_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("transfer body serialization is infallible")
    }
}

/// The facade every payout flows through. Implementations must keep
/// `transfer` at-most-once per invocation (the chain enforces this by
/// signature uniqueness) — the queue layers its retries on top.
#[async_trait]
pub trait TokenGateway: Send + Sync {
    /// Check that a past transfer landed: it succeeded, `sender` signed it,
    /// and `recipient`'s token balance rose by `expected_micros` within the
    /// verification tolerance. Returns `Ok(false)` — never an error — for
    /// "not yet confirmed", so callers can poll.
    async fn verify_transfer(
        &self,
        tx_signature: &str,
        sender: &TokenAddress,
        recipient: &TokenAddress,
        expected_micros: Micros,
    ) -> Result<bool, StrideError>;

    /// Current token balance of `address`'s associated token account, in
    /// micro-units. Errors on RPC failure; callers decide whether to retry.
    async fn token_balance(&self, address: &TokenAddress) -> Result<Micros, StrideError>;

    /// Sign a transfer with (escrow, fee-payer) and submit it, waiting for
    /// confirmation. The fee-payer funds token-account creation when the
    /// recipient has none. Returns the chain-assigned signature string.
    async fn transfer(
        &self,
        escrow: &ChainKeypair,
        fee_payer: &ChainKeypair,
        recipient: &TokenAddress,
        amount_micros: Micros,
    ) -> Result<String, StrideError>;
}
