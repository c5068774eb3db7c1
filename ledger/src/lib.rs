//! Tokenex Exchange Ledger
//!
//! Custodial balances keyed by (token, owner), a registry of resting
//! orders, and the four-legged settlement that fills them. Every mutating
//! operation is applied under one write lock and publishes exactly one
//! notification on success.

pub mod balance;
pub mod config;
pub mod engine;
pub mod events;
pub mod journal;
pub mod order;

pub use balance::{BalanceChange, BalanceTable};
pub use config::ExchangeConfig;
pub use engine::{Exchange, TradeReceipt};
pub use events::{EventEnvelope, ExchangeEvent};
pub use journal::{EntryType, JournalBatch, Posting};
pub use order::{NewOrder, Order, OrderBook};
