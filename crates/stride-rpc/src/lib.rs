//! stride-rpc
//!
//! The operator-facing JSON-RPC 2.0 surface: proof moderation, settlement
//! triggers, payout-queue triage, and challenge finalization. Every method
//! lives under the `admin` namespace; every mutation appends an audit row.

pub mod api;
pub mod server;
pub mod types;

pub use api::AdminApiServer;
pub use server::{AdminServer, AdminState};
pub use types::*;
