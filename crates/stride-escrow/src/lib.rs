//! stride-escrow
//!
//! Per-challenge escrow keypair lifecycle. Keys are generated at challenge
//! creation, AEAD-encrypted at rest (AES-256-GCM under a key derived from
//! the process master secret via SHA-256), and decrypted on demand for the
//! duration of a signing operation only.
//!
//! The master key is checked at first use, not at startup: the service
//! boots without it and only escrow-touching operations fail.

pub mod wallets;

pub use wallets::{EscrowWallets, MasterKey};
