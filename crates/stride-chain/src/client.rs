use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use stride_core::{Micros, StrideError, TokenAddress, TRANSFER_VERIFY_TOLERANCE_MICROS};

use crate::gateway::{TokenGateway, TransferRequest};
use crate::keypair::ChainKeypair;

/// Per-call timeout for chain RPCs. Timeouts surface as retryable job
/// failures; the queue's backoff is the retry mechanism.
const RPC_TIMEOUT: Duration = Duration::from_secs(25);

/// JSON-RPC 2.0 client for the token-chain gateway node.
///
/// Uses raw HTTP POST with serde_json rather than a full RPC client stack;
/// the surface is three methods and the error mapping is custom anyway.
pub struct RpcTokenGateway {
    url: String,
    mint: TokenAddress,
    client: reqwest::Client,
}

impl RpcTokenGateway {
    pub fn new(url: &str, mint: TokenAddress) -> Self {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .expect("reqwest client construction is infallible");
        Self {
            url: url.to_string(),
            mint,
            client,
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, StrideError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StrideError::ChainRpc(format!("{method}: {e}")))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StrideError::ChainRpc(format!("{method}: bad response: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(StrideError::ChainRpc(format!("{method}: {err}")));
        }
        Ok(json["result"].clone())
    }
}

#[async_trait]
impl TokenGateway for RpcTokenGateway {
    async fn verify_transfer(
        &self,
        tx_signature: &str,
        sender: &TokenAddress,
        recipient: &TokenAddress,
        expected_micros: Micros,
    ) -> Result<bool, StrideError> {
        let result = self
            .call(
                "token_getTransfer",
                serde_json::json!([tx_signature, self.mint.to_b58()]),
            )
            .await?;

        // Unknown or not-yet-confirmed transactions are a retryable "no",
        // not an error.
        if result.is_null() || result["confirmed"].as_bool() != Some(true) {
            debug!(%tx_signature, "transfer not yet confirmed");
            return Ok(false);
        }
        if result["success"].as_bool() != Some(true) {
            return Ok(false);
        }

        let signed_by_sender = result["signers"]
            .as_array()
            .map(|signers| signers.iter().any(|s| s.as_str() == Some(&sender.to_b58())))
            .unwrap_or(false);
        if !signed_by_sender {
            return Ok(false);
        }

        if result["destination"].as_str() != Some(recipient.to_b58().as_str()) {
            return Ok(false);
        }

        let delta: Micros = result["delta_micros"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| result["delta_micros"].as_u64())
            .unwrap_or(0);
        let tolerance = TRANSFER_VERIFY_TOLERANCE_MICROS;
        Ok(delta.abs_diff(expected_micros) <= tolerance)
    }

    async fn token_balance(&self, address: &TokenAddress) -> Result<Micros, StrideError> {
        let result = self
            .call(
                "token_getBalance",
                serde_json::json!([address.to_b58(), self.mint.to_b58()]),
            )
            .await?;

        // Micros travel as strings: u64 does not fit in every JSON number
        // implementation out there.
        result
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| result.as_u64())
            .ok_or_else(|| StrideError::ChainRpc(format!("token_getBalance: bad result {result}")))
    }

    async fn transfer(
        &self,
        escrow: &ChainKeypair,
        fee_payer: &ChainKeypair,
        recipient: &TokenAddress,
        amount_micros: Micros,
    ) -> Result<String, StrideError> {
        let request = TransferRequest {
            mint: self.mint.clone(),
            source: escrow.address(),
            destination: recipient.clone(),
            amount_micros,
            fee_payer: fee_payer.address(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        let body = request.body_bytes();

        // Both signatures cover the same body; the chain treats the source
        // signature as the transaction's identity.
        let escrow_sig = bs58::encode(escrow.sign(&body)).into_string();
        let fee_sig = bs58::encode(fee_payer.sign(&body)).into_string();

        let result = self
            .call(
                "token_submitTransfer",
                serde_json::json!([{
                    "payload": hex::encode(&body),
                    "signatures": [escrow_sig, fee_sig],
                    "commitment": "confirmed",
                }]),
            )
            .await?;

        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                StrideError::ChainRpc(format!("token_submitTransfer: bad result {result}"))
            })
    }
}
