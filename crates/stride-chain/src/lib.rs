//! stride-chain
//!
//! Narrow, testable boundary over the token chain. Three operations —
//! verify a past transfer, read a token balance, sign and submit a
//! transfer — behind the [`TokenGateway`] trait. The production
//! implementation speaks JSON-RPC to a chain gateway node; tests use
//! [`mock::MockGateway`].
//!
//! Escrow wallets hold only the payout token (no gas); a process-wide
//! fee-payer keypair co-signs every transfer and funds recipient token
//! accounts when they need creating.

pub mod client;
pub mod gateway;
pub mod keypair;
pub mod mock;

pub use client::RpcTokenGateway;
pub use gateway::{TokenGateway, TransferRequest};
pub use keypair::ChainKeypair;
