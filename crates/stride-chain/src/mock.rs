//! In-memory [`TokenGateway`] for tests and local development. Deterministic:
//! balances move instantly, signatures are the source signature base-58, and
//! failures are injected on demand.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use stride_core::{Micros, StrideError, TokenAddress, TRANSFER_VERIFY_TOLERANCE_MICROS};

use crate::gateway::{TokenGateway, TransferRequest};
use crate::keypair::ChainKeypair;

#[derive(Clone, Debug)]
pub struct MockTransfer {
    pub signature: String,
    pub source: String,
    pub destination: String,
    pub amount_micros: Micros,
}

#[derive(Default)]
struct MockState {
    balances: HashMap<String, Micros>,
    transfers: Vec<MockTransfer>,
    fail_next: u32,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an address, as if tokens arrived from outside the system.
    pub fn fund(&self, address: &TokenAddress, micros: Micros) {
        let mut state = self.state.lock().unwrap();
        *state.balances.entry(address.to_b58()).or_insert(0) += micros;
    }

    /// Make the next `n` transfer calls fail with a retryable RPC error.
    pub fn fail_next_transfers(&self, n: u32) {
        self.state.lock().unwrap().fail_next = n;
    }

    pub fn transfers(&self) -> Vec<MockTransfer> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn balance_of(&self, address: &TokenAddress) -> Micros {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&address.to_b58())
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TokenGateway for MockGateway {
    async fn verify_transfer(
        &self,
        tx_signature: &str,
        sender: &TokenAddress,
        recipient: &TokenAddress,
        expected_micros: Micros,
    ) -> Result<bool, StrideError> {
        let state = self.state.lock().unwrap();
        let Some(t) = state.transfers.iter().find(|t| t.signature == tx_signature) else {
            return Ok(false);
        };
        Ok(t.source == sender.to_b58()
            && t.destination == recipient.to_b58()
            && t.amount_micros.abs_diff(expected_micros) <= TRANSFER_VERIFY_TOLERANCE_MICROS)
    }

    async fn token_balance(&self, address: &TokenAddress) -> Result<Micros, StrideError> {
        Ok(self.balance_of(address))
    }

    async fn transfer(
        &self,
        escrow: &ChainKeypair,
        fee_payer: &ChainKeypair,
        recipient: &TokenAddress,
        amount_micros: Micros,
    ) -> Result<String, StrideError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(StrideError::ChainRpc("mock: injected transfer failure".into()));
        }

        let source = escrow.address();
        let have = state.balances.get(&source.to_b58()).copied().unwrap_or(0);
        if have < amount_micros {
            return Err(StrideError::InsufficientEscrowBalance {
                need: amount_micros,
                have,
            });
        }

        let request = TransferRequest {
            mint: TokenAddress::from_bytes([0u8; 32]),
            source: source.clone(),
            destination: recipient.clone(),
            amount_micros,
            fee_payer: fee_payer.address(),
            created_at_ms: state.transfers.len() as i64,
        };
        let signature = bs58::encode(escrow.sign(&request.body_bytes())).into_string();

        *state.balances.entry(source.to_b58()).or_insert(0) -= amount_micros;
        *state.balances.entry(recipient.to_b58()).or_insert(0) += amount_micros;
        state.transfers.push(MockTransfer {
            signature: signature.clone(),
            source: source.to_b58(),
            destination: recipient.to_b58(),
            amount_micros,
        });
        Ok(signature)
    }
}
