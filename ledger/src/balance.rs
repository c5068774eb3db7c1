//! Custodial balance table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokenex_common::{AccountId, Amount, ExchangeError, Result, TokenId};

use crate::journal::{EntryType, JournalBatch};

/// Custodial balances keyed by (token, owner).
///
/// Absent cells read as zero. Debits never wrap: a debit larger than the
/// balance is an [`ExchangeError::InsufficientBalance`] and leaves the cell
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct BalanceTable {
    cells: HashMap<(TokenId, AccountId), Amount>,
}

impl BalanceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `owner` in `token`; zero for unknown owners.
    pub fn balance_of(&self, token: &TokenId, owner: &AccountId) -> Amount {
        self.cells
            .get(&(token.clone(), owner.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Fail unless `owner` holds at least `required` of `token`.
    pub fn ensure_covers(&self, token: &TokenId, owner: &AccountId, required: Amount) -> Result<()> {
        let available = self.balance_of(token, owner);
        if available < required {
            return Err(insufficient(token, owner, required, available));
        }
        Ok(())
    }

    /// Increase a balance, returning the new balance.
    pub fn credit(&mut self, token: &TokenId, owner: &AccountId, amount: Amount) -> Result<Amount> {
        let after = credited(token, owner, self.balance_of(token, owner), amount)?;
        self.set(token, owner, after);
        Ok(after)
    }

    /// Decrease a balance, returning the new balance.
    pub fn debit(&mut self, token: &TokenId, owner: &AccountId, amount: Amount) -> Result<Amount> {
        let after = debited(token, owner, self.balance_of(token, owner), amount)?;
        self.set(token, owner, after);
        Ok(after)
    }

    /// Overwrite a cell. Used to restore a balance captured before a
    /// failed external transfer.
    pub(crate) fn set(&mut self, token: &TokenId, owner: &AccountId, amount: Amount) {
        self.cells.insert((token.clone(), owner.clone()), amount);
    }

    /// Apply every posting of `batch` or none of them.
    ///
    /// Postings are staged in order against a scratch copy of the touched
    /// cells; the table is only written once the whole batch has been
    /// validated.
    pub fn apply(&mut self, batch: &JournalBatch) -> Result<Vec<BalanceChange>> {
        let mut staged: HashMap<(TokenId, AccountId), Amount> = HashMap::new();
        let mut changes = Vec::with_capacity(batch.len());

        for posting in batch.postings() {
            let key = (posting.token.clone(), posting.account.clone());
            let before = staged
                .get(&key)
                .copied()
                .unwrap_or_else(|| self.balance_of(&posting.token, &posting.account));

            let after = match posting.entry_type {
                EntryType::Debit => debited(&posting.token, &posting.account, before, posting.amount)?,
                EntryType::Credit => credited(&posting.token, &posting.account, before, posting.amount)?,
            };

            staged.insert(key, after);
            changes.push(BalanceChange {
                token: posting.token.clone(),
                account: posting.account.clone(),
                change_type: posting.entry_type,
                amount: posting.amount,
                balance_before: before,
                balance_after: after,
            });
        }

        self.cells.extend(staged);
        Ok(changes)
    }

    /// Sum of all owners' balances in `token`.
    pub fn total(&self, token: &TokenId) -> Amount {
        Amount::new(
            self.cells
                .iter()
                .filter(|((t, _), _)| t == token)
                .map(|(_, amount)| amount.base_units())
                .fold(0u128, u128::saturating_add),
        )
    }

    /// Tokens with at least one recorded cell, sorted.
    pub fn tokens(&self) -> Vec<TokenId> {
        let mut tokens: Vec<TokenId> = self.cells.keys().map(|(t, _)| t.clone()).collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }
}

fn insufficient(token: &TokenId, owner: &AccountId, required: Amount, available: Amount) -> ExchangeError {
    ExchangeError::InsufficientBalance {
        token: token.clone(),
        owner: owner.clone(),
        required,
        available,
    }
}

fn debited(token: &TokenId, owner: &AccountId, before: Amount, amount: Amount) -> Result<Amount> {
    before
        .checked_sub(amount)
        .ok_or_else(|| insufficient(token, owner, amount, before))
}

fn credited(token: &TokenId, owner: &AccountId, before: Amount, amount: Amount) -> Result<Amount> {
    before
        .checked_add(amount)
        .ok_or_else(|| ExchangeError::Overflow(format!("{token} balance of {owner}")))
}

/// Balance change produced by a committed posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// Token affected.
    pub token: TokenId,
    /// Account affected.
    pub account: AccountId,
    /// Debit or credit.
    pub change_type: EntryType,
    /// Amount changed.
    pub amount: Amount,
    /// Balance before change.
    pub balance_before: Amount,
    /// Balance after change.
    pub balance_after: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (TokenId, TokenId, AccountId, AccountId) {
        (
            TokenId::new("APT"),
            TokenId::new("fDAI"),
            AccountId::new("user1"),
            AccountId::new("user2"),
        )
    }

    #[test]
    fn test_unknown_owner_reads_zero() {
        let (apt, _, user1, _) = ids();
        let table = BalanceTable::new();
        assert_eq!(table.balance_of(&apt, &user1), Amount::ZERO);
    }

    #[test]
    fn test_credit_and_debit() {
        let (apt, _, user1, _) = ids();
        let mut table = BalanceTable::new();

        assert_eq!(table.credit(&apt, &user1, Amount::new(10)).unwrap(), Amount::new(10));
        assert_eq!(table.debit(&apt, &user1, Amount::new(4)).unwrap(), Amount::new(6));
        assert_eq!(table.balance_of(&apt, &user1), Amount::new(6));
    }

    #[test]
    fn test_debit_underflow_is_rejected() {
        let (apt, _, user1, _) = ids();
        let mut table = BalanceTable::new();
        table.credit(&apt, &user1, Amount::new(3)).unwrap();

        let err = table.debit(&apt, &user1, Amount::new(4)).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::InsufficientBalance { required, available, .. }
                if required == Amount::new(4) && available == Amount::new(3)
        ));
        assert_eq!(table.balance_of(&apt, &user1), Amount::new(3));
    }

    #[test]
    fn test_credit_overflow_is_rejected() {
        let (apt, _, user1, _) = ids();
        let mut table = BalanceTable::new();
        table.credit(&apt, &user1, Amount::new(u128::MAX)).unwrap();

        assert!(matches!(
            table.credit(&apt, &user1, Amount::new(1)),
            Err(ExchangeError::Overflow(_))
        ));
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let (apt, dai, user1, user2) = ids();
        let mut table = BalanceTable::new();
        table.credit(&dai, &user2, Amount::new(110)).unwrap();

        // user1 holds no APT, so the final leg fails after three good legs
        let batch = JournalBatch::new()
            .debit(&dai, &user2, Amount::new(110))
            .credit(&dai, &user1, Amount::new(100))
            .credit(&dai, &AccountId::new("fees"), Amount::new(10))
            .debit(&apt, &user1, Amount::new(1))
            .credit(&apt, &user2, Amount::new(1));

        assert!(table.apply(&batch).is_err());
        assert_eq!(table.balance_of(&dai, &user2), Amount::new(110));
        assert_eq!(table.balance_of(&dai, &user1), Amount::ZERO);
        assert_eq!(table.total(&dai), Amount::new(110));
    }

    #[test]
    fn test_apply_stages_repeated_cells() {
        let (apt, _, user1, _) = ids();
        let mut table = BalanceTable::new();
        table.credit(&apt, &user1, Amount::new(5)).unwrap();

        let batch = JournalBatch::new()
            .debit(&apt, &user1, Amount::new(5))
            .credit(&apt, &user1, Amount::new(2));

        let changes = table.apply(&batch).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].balance_after, Amount::ZERO);
        assert_eq!(changes[1].balance_before, Amount::ZERO);
        assert_eq!(table.balance_of(&apt, &user1), Amount::new(2));
    }

    #[test]
    fn test_total_and_tokens() {
        let (apt, dai, user1, user2) = ids();
        let mut table = BalanceTable::new();
        table.credit(&apt, &user1, Amount::new(3)).unwrap();
        table.credit(&apt, &user2, Amount::new(4)).unwrap();
        table.credit(&dai, &user2, Amount::new(9)).unwrap();

        assert_eq!(table.total(&apt), Amount::new(7));
        assert_eq!(table.tokens(), vec![apt, dai]);
    }
}
