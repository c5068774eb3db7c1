//! Token metadata.

use serde::{Deserialize, Serialize};
use tokenex_common::{Amount, TokenId, TOKEN_DECIMALS};

/// Metadata of a registered token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Token identifier (its symbol).
    pub id: TokenId,
    /// Human-readable name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Decimal places.
    pub decimals: u32,
    /// Fixed total supply in base units.
    pub total_supply: Amount,
}

impl TokenInfo {
    /// Create metadata for an 18-decimal token identified by its symbol.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, total_supply: Amount) -> Self {
        let symbol = symbol.into();
        Self {
            id: TokenId::new(symbol.clone()),
            name: name.into(),
            symbol,
            decimals: TOKEN_DECIMALS,
            total_supply,
        }
    }
}
