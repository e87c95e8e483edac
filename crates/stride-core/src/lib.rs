pub mod challenge;
pub mod constants;
pub mod error;
pub mod payout;
pub mod settlement;
pub mod types;

pub use challenge::*;
pub use constants::*;
pub use error::{ErrorKind, StrideError};
pub use payout::*;
pub use settlement::*;
pub use types::*;
