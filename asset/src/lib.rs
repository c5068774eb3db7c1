//! Tokenex Asset Ledger
//!
//! Per-token, per-owner balance accounting that the exchange pulls deposits
//! from and pushes withdrawals to. The exchange only sees the
//! [`AssetLedger`] capability set; [`InMemoryAssetLedger`] is the token
//! registry used by tests and the simulator.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod token;

pub use error::{AssetError, AssetResult};
pub use ledger::AssetLedger;
pub use memory::InMemoryAssetLedger;
pub use token::TokenInfo;
