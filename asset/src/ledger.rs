//! The capability set the exchange consumes from a token ledger.

use tokenex_common::{AccountId, Amount, TokenId};

use crate::error::AssetResult;

/// Trait for fungible token ledgers.
///
/// Every call is fallible and callers must propagate failures.
pub trait AssetLedger: Send + Sync {
    /// Raw token balance of `owner`.
    fn balance_of(&self, token: &TokenId, owner: &AccountId) -> AssetResult<Amount>;

    /// Push `amount` from `from` to `to`.
    fn transfer(
        &self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> AssetResult<()>;

    /// Pull `amount` from `owner` to `to` on behalf of `spender`, consuming
    /// the allowance `owner` granted to `spender`.
    fn transfer_from(
        &self,
        token: &TokenId,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> AssetResult<()>;

    /// Amount `spender` may still pull from `owner`.
    fn allowance(
        &self,
        token: &TokenId,
        owner: &AccountId,
        spender: &AccountId,
    ) -> AssetResult<Amount>;
}
