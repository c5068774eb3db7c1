//! Identifier types for exchange entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a fungible token known to the asset ledger.
/// Usually the token's address or ticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Create a new token ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TokenId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of a balance holder: a user, the fee collector, or the
/// exchange's own custody account in the asset ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the account ID format.
    pub fn is_valid(&self) -> bool {
        // Non-empty, bounded, alphanumeric with underscores or dashes
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Sequential order identifier. The n-th created order has id n.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OrderId(u64);

impl OrderId {
    /// Create from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_validation() {
        assert!(AccountId::new("user_1").is_valid());
        assert!(AccountId::new("0xAbC123").is_valid());
        assert!(AccountId::new("fee-collector").is_valid());
        assert!(!AccountId::new("").is_valid());
        assert!(!AccountId::new("has space").is_valid());
        assert!(!AccountId::new("a".repeat(65)).is_valid());
    }

    #[test]
    fn test_order_id_ordering() {
        assert!(OrderId::new(1) < OrderId::new(2));
        assert_eq!(OrderId::from(7).value(), 7);
        assert_eq!(OrderId::new(42).to_string(), "42");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let token = TokenId::new("fDAI");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"fDAI\"");

        let id: OrderId = serde_json::from_str("3").unwrap();
        assert_eq!(id, OrderId::new(3));
    }
}
