//! Notifications published by the exchange.
//!
//! Notifications are appended to the exchange's log and broadcast to live
//! subscribers while the write lock of the operation that produced them is
//! still held, so sequence numbers follow commit order.

use serde::{Deserialize, Serialize};
use tokenex_common::{AccountId, Amount, OrderId, Timestamp, TokenId};

use crate::order::Order;

/// A notification for indexers and UIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ExchangeEvent {
    /// Tokens pulled into custody.
    Deposit {
        token: TokenId,
        user: AccountId,
        amount: Amount,
        /// Custodial balance after the deposit.
        balance: Amount,
    },
    /// Tokens pushed out of custody.
    Withdrawal {
        token: TokenId,
        user: AccountId,
        amount: Amount,
        /// Custodial balance after the withdrawal.
        balance: Amount,
    },
    /// A new order was created.
    OrderCreated {
        id: OrderId,
        maker: AccountId,
        wanted_token: TokenId,
        wanted_amount: Amount,
        offered_token: TokenId,
        offered_amount: Amount,
        timestamp: Timestamp,
    },
    /// The maker cancelled an order.
    Cancel {
        id: OrderId,
        maker: AccountId,
        wanted_token: TokenId,
        wanted_amount: Amount,
        offered_token: TokenId,
        offered_amount: Amount,
        timestamp: Timestamp,
        cancelled_at: Timestamp,
    },
    /// A taker filled an order.
    Trade {
        id: OrderId,
        maker: AccountId,
        wanted_token: TokenId,
        wanted_amount: Amount,
        offered_token: TokenId,
        offered_amount: Amount,
        taker: AccountId,
        timestamp: Timestamp,
    },
}

impl ExchangeEvent {
    pub(crate) fn order_created(order: &Order) -> Self {
        ExchangeEvent::OrderCreated {
            id: order.id,
            maker: order.maker.clone(),
            wanted_token: order.wanted_token.clone(),
            wanted_amount: order.wanted_amount,
            offered_token: order.offered_token.clone(),
            offered_amount: order.offered_amount,
            timestamp: order.created_at,
        }
    }

    pub(crate) fn cancel(order: &Order, cancelled_at: Timestamp) -> Self {
        ExchangeEvent::Cancel {
            id: order.id,
            maker: order.maker.clone(),
            wanted_token: order.wanted_token.clone(),
            wanted_amount: order.wanted_amount,
            offered_token: order.offered_token.clone(),
            offered_amount: order.offered_amount,
            timestamp: order.created_at,
            cancelled_at,
        }
    }

    pub(crate) fn trade(order: &Order, taker: &AccountId, filled_at: Timestamp) -> Self {
        ExchangeEvent::Trade {
            id: order.id,
            maker: order.maker.clone(),
            wanted_token: order.wanted_token.clone(),
            wanted_amount: order.wanted_amount,
            offered_token: order.offered_token.clone(),
            offered_amount: order.offered_amount,
            taker: taker.clone(),
            timestamp: filled_at,
        }
    }

    /// Event name as indexers see it.
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeEvent::Deposit { .. } => "Deposit",
            ExchangeEvent::Withdrawal { .. } => "Withdrawal",
            ExchangeEvent::OrderCreated { .. } => "OrderCreated",
            ExchangeEvent::Cancel { .. } => "Cancel",
            ExchangeEvent::Trade { .. } => "Trade",
        }
    }

    /// Order the event refers to, if any.
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            ExchangeEvent::OrderCreated { id, .. }
            | ExchangeEvent::Cancel { id, .. }
            | ExchangeEvent::Trade { id, .. } => Some(*id),
            ExchangeEvent::Deposit { .. } | ExchangeEvent::Withdrawal { .. } => None,
        }
    }
}

/// A notification with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// 1-based position in commit order.
    pub sequence: u64,
    /// The notification.
    #[serde(flatten)]
    pub event: ExchangeEvent,
}

impl EventEnvelope {
    /// Encode as a single JSON line.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_json() {
        let envelope = EventEnvelope {
            sequence: 1,
            event: ExchangeEvent::Deposit {
                token: TokenId::new("APT"),
                user: AccountId::new("user1"),
                amount: Amount::new(10),
                balance: Amount::new(10),
            },
        };

        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["event"], "Deposit");
        assert_eq!(json["token"], "APT");
        assert_eq!(json["user"], "user1");
        assert_eq!(envelope.event.name(), "Deposit");
        assert_eq!(envelope.event.order_id(), None);
    }
}
