//! Error types for exchange operations.

use crate::{AccountId, Amount, OrderId, OrderStatus, TokenId};
use thiserror::Error;

/// Main error type for exchange ledger operations.
///
/// Every variant is returned synchronously and leaves balances, orders and
/// the notification log exactly as they were before the call.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// A balance precondition failed.
    #[error("Insufficient {token} balance for {owner}: required {required}, available {available}")]
    InsufficientBalance {
        token: TokenId,
        owner: AccountId,
        required: Amount,
        available: Amount,
    },

    /// Order id was never assigned.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Caller is not the maker of the order.
    #[error("Account {caller} is not the maker of order {order_id}")]
    Unauthorized { order_id: OrderId, caller: AccountId },

    /// Order is already cancelled or filled.
    #[error("Order {order_id} is already {status}")]
    AlreadyClosed { order_id: OrderId, status: OrderStatus },

    /// The asset ledger rejected a push or pull transfer.
    #[error("Transfer of {token} failed: {reason}")]
    TransferFailed { token: TokenId, reason: String },

    /// Amount is not acceptable for the operation.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The exchange's own custody account cannot trade or move custodial funds.
    #[error("Account {0} is the exchange custody account")]
    ReservedAccount(AccountId),

    /// Settlement postings do not net to zero per token.
    #[error("Settlement of order {0} does not balance")]
    UnbalancedSettlement(OrderId),

    /// Arithmetic on base units overflowed.
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl ExchangeError {
    /// Get a stable error code for notifications and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            ExchangeError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ExchangeError::NotFound(_) => "NOT_FOUND",
            ExchangeError::Unauthorized { .. } => "UNAUTHORIZED",
            ExchangeError::AlreadyClosed { .. } => "ALREADY_CLOSED",
            ExchangeError::TransferFailed { .. } => "TRANSFER_FAILED",
            ExchangeError::ReservedAccount(_) => "RESERVED_ACCOUNT",
            ExchangeError::UnbalancedSettlement(_) => "UNBALANCED_SETTLEMENT",
            ExchangeError::InvalidAmount(_) => "INVALID_AMOUNT",
            ExchangeError::Overflow(_) => "OVERFLOW",
            ExchangeError::ConfigurationError(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;
