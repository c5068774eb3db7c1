//! Order registry.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tokenex_common::{AccountId, Amount, ExchangeError, OrderId, OrderStatus, Result, Timestamp, TokenId};

/// Terms of an order before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Token the maker wants to receive.
    pub wanted_token: TokenId,
    /// Quantity the maker wants to receive.
    pub wanted_amount: Amount,
    /// Token the maker gives up.
    pub offered_token: TokenId,
    /// Quantity the maker gives up.
    pub offered_amount: Amount,
}

impl NewOrder {
    /// Create new order terms.
    pub fn new(
        wanted_token: TokenId,
        wanted_amount: Amount,
        offered_token: TokenId,
        offered_amount: Amount,
    ) -> Self {
        Self {
            wanted_token,
            wanted_amount,
            offered_token,
            offered_amount,
        }
    }
}

/// A standing offer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Sequential id.
    pub id: OrderId,
    /// Account that created the order.
    pub maker: AccountId,
    /// Token the maker wants to receive.
    pub wanted_token: TokenId,
    /// Quantity the maker wants to receive.
    pub wanted_amount: Amount,
    /// Token the maker gives up.
    pub offered_token: TokenId,
    /// Quantity the maker gives up.
    pub offered_amount: Amount,
    /// When the order was created.
    pub created_at: Timestamp,
}

/// Orders by id plus the two monotonic lifecycle flags.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: BTreeMap<OrderId, Order>,
    cancelled: HashSet<OrderId>,
    filled: HashSet<OrderId>,
    order_count: u64,
}

impl OrderBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of orders ever created; also the id of the latest order.
    pub fn order_count(&self) -> u64 {
        self.order_count
    }

    /// Record a new order under the next id.
    pub fn create(&mut self, maker: AccountId, terms: NewOrder, created_at: Timestamp) -> Order {
        self.order_count += 1;
        let order = Order {
            id: OrderId::new(self.order_count),
            maker,
            wanted_token: terms.wanted_token,
            wanted_amount: terms.wanted_amount,
            offered_token: terms.offered_token,
            offered_amount: terms.offered_amount,
            created_at,
        };

        self.orders.insert(order.id, order.clone());
        order
    }

    /// Get an order by id.
    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Get an order or fail with `NotFound`.
    pub fn find(&self, id: OrderId) -> Result<&Order> {
        self.orders.get(&id).ok_or(ExchangeError::NotFound(id))
    }

    /// Get an order that can still be cancelled or filled.
    pub fn find_open(&self, id: OrderId) -> Result<&Order> {
        let order = self.find(id)?;
        let status = self.status_of(id);
        if status.is_final() {
            return Err(ExchangeError::AlreadyClosed {
                order_id: id,
                status,
            });
        }
        Ok(order)
    }

    /// Status of an existing order, `None` for unassigned ids.
    pub fn status(&self, id: OrderId) -> Option<OrderStatus> {
        self.orders.contains_key(&id).then(|| self.status_of(id))
    }

    fn status_of(&self, id: OrderId) -> OrderStatus {
        OrderStatus::from_flags(self.cancelled.contains(&id), self.filled.contains(&id))
    }

    /// Whether the order was cancelled; false for unassigned ids.
    pub fn is_cancelled(&self, id: OrderId) -> bool {
        self.cancelled.contains(&id)
    }

    /// Whether the order was filled; false for unassigned ids.
    pub fn is_filled(&self, id: OrderId) -> bool {
        self.filled.contains(&id)
    }

    /// Set the cancelled flag. The caller has checked the order is open.
    pub fn mark_cancelled(&mut self, id: OrderId) {
        self.cancelled.insert(id);
    }

    /// Set the filled flag. The caller has checked the order is open.
    pub fn mark_filled(&mut self, id: OrderId) {
        self.filled.insert(id);
    }

    /// Open orders in id order.
    pub fn open_orders(&self) -> Vec<Order> {
        self.orders
            .values()
            .filter(|o| self.status_of(o.id).is_open())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenex_common::now;

    fn terms() -> NewOrder {
        NewOrder::new(
            TokenId::new("fDAI"),
            Amount::whole(1),
            TokenId::new("APT"),
            Amount::whole(1),
        )
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut book = OrderBook::new();
        let maker = AccountId::new("user1");

        for n in 1..=3 {
            let order = book.create(maker.clone(), terms(), now());
            assert_eq!(order.id, OrderId::new(n));
        }
        assert_eq!(book.order_count(), 3);
    }

    #[test]
    fn test_lifecycle() {
        let mut book = OrderBook::new();
        let order = book.create(AccountId::new("user1"), terms(), now());

        assert_eq!(book.status(order.id), Some(OrderStatus::Open));
        assert!(book.find_open(order.id).is_ok());

        book.mark_cancelled(order.id);
        assert_eq!(book.status(order.id), Some(OrderStatus::Cancelled));
        assert!(book.is_cancelled(order.id));
        assert!(!book.is_filled(order.id));
        assert!(matches!(
            book.find_open(order.id),
            Err(ExchangeError::AlreadyClosed { status: OrderStatus::Cancelled, .. })
        ));
    }

    #[test]
    fn test_unknown_ids() {
        let book = OrderBook::new();
        let id = OrderId::new(999);

        assert_eq!(book.status(id), None);
        assert!(!book.is_cancelled(id));
        assert!(matches!(book.find_open(id), Err(ExchangeError::NotFound(_))));
    }

    #[test]
    fn test_open_orders_excludes_closed() {
        let mut book = OrderBook::new();
        let maker = AccountId::new("user1");
        let first = book.create(maker.clone(), terms(), now());
        let second = book.create(maker.clone(), terms(), now());
        let third = book.create(maker, terms(), now());

        book.mark_cancelled(first.id);
        book.mark_filled(third.id);

        let open: Vec<OrderId> = book.open_orders().iter().map(|o| o.id).collect();
        assert_eq!(open, vec![second.id]);
    }
}
