//! Asset ledger error types.

use thiserror::Error;
use tokenex_common::{AccountId, Amount, TokenId};

/// Errors returned by an asset ledger.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Token is not registered.
    #[error("Unknown token: {0}")]
    UnknownToken(TokenId),

    /// A token with this id is already registered.
    #[error("Token already registered: {0}")]
    TokenExists(TokenId),

    /// Sender holds less than the transfer amount.
    #[error("Insufficient {token} balance for {owner}: required {required}, available {available}")]
    InsufficientBalance {
        token: TokenId,
        owner: AccountId,
        required: Amount,
        available: Amount,
    },

    /// Spender was not approved for the transfer amount.
    #[error("Insufficient {token} allowance from {owner} to {spender}: required {required}, available {available}")]
    InsufficientAllowance {
        token: TokenId,
        owner: AccountId,
        spender: AccountId,
        required: Amount,
        available: Amount,
    },

    /// Recipient is not a valid account.
    #[error("Invalid recipient: {0:?}")]
    InvalidRecipient(AccountId),

    /// Crediting the recipient would overflow.
    #[error("Balance overflow on {0}")]
    Overflow(TokenId),
}

/// Result type for asset ledger operations.
pub type AssetResult<T> = Result<T, AssetError>;
