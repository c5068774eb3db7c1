//! Tokenex Common Types
//!
//! This crate contains shared types used across the tokenex workspace,
//! including identifiers, token amounts, timestamps and the exchange error
//! taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod status;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use status::*;
pub use error::*;
pub use time::*;
