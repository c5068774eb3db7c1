//! Order lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an order: created open, then exactly one terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Resting and fillable.
    Open,
    /// Withdrawn by its maker.
    Cancelled,
    /// Settled by a taker.
    Filled,
}

impl OrderStatus {
    /// Derive the status from the two independent lifecycle flags.
    pub fn from_flags(cancelled: bool, filled: bool) -> Self {
        match (cancelled, filled) {
            (_, true) => OrderStatus::Filled,
            (true, false) => OrderStatus::Cancelled,
            (false, false) => OrderStatus::Open,
        }
    }

    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Filled)
    }

    /// Check if the order can still be cancelled or filled.
    pub fn is_open(&self) -> bool {
        !self.is_final()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Open => "open",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Filled => "filled",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_flags() {
        assert_eq!(OrderStatus::from_flags(false, false), OrderStatus::Open);
        assert_eq!(OrderStatus::from_flags(true, false), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::from_flags(false, true), OrderStatus::Filled);
        assert!(OrderStatus::Open.is_open());
        assert!(OrderStatus::Filled.is_final());
    }
}
