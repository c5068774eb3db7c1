//! Postings for atomic multi-leg settlement.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokenex_common::{AccountId, Amount, TokenId};

/// Direction of a posting against a custodial balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Decreases the balance.
    Debit,
    /// Increases the balance.
    Credit,
}

/// A single balance movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Token moved.
    pub token: TokenId,
    /// Balance holder affected.
    pub account: AccountId,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Amount moved.
    pub amount: Amount,
}

impl Posting {
    /// Create a debit posting.
    pub fn debit(token: TokenId, account: AccountId, amount: Amount) -> Self {
        Self {
            token,
            account,
            entry_type: EntryType::Debit,
            amount,
        }
    }

    /// Create a credit posting.
    pub fn credit(token: TokenId, account: AccountId, amount: Amount) -> Self {
        Self {
            token,
            account,
            entry_type: EntryType::Credit,
            amount,
        }
    }
}

/// A batch of postings that must be committed together.
///
/// Postings are applied in insertion order, so a debit listed before a
/// credit to the same cell sees the balance without that credit.
#[derive(Debug, Clone, Default)]
pub struct JournalBatch {
    postings: Vec<Posting>,
}

impl JournalBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a debit.
    pub fn debit(mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Self {
        self.postings
            .push(Posting::debit(token.clone(), account.clone(), amount));
        self
    }

    /// Append a credit.
    pub fn credit(mut self, token: &TokenId, account: &AccountId, amount: Amount) -> Self {
        self.postings
            .push(Posting::credit(token.clone(), account.clone(), amount));
        self
    }

    /// Postings in application order.
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Number of postings.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if the batch has no postings.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Verify the batch only moves value (debits == credits per token).
    pub fn is_balanced(&self) -> bool {
        let tokens: HashSet<&TokenId> = self.postings.iter().map(|p| &p.token).collect();
        tokens
            .into_iter()
            .all(|token| self.total_debits(token) == self.total_credits(token))
    }

    /// Total debited for `token`.
    pub fn total_debits(&self, token: &TokenId) -> Amount {
        self.total(token, EntryType::Debit)
    }

    /// Total credited for `token`.
    pub fn total_credits(&self, token: &TokenId) -> Amount {
        self.total(token, EntryType::Credit)
    }

    fn total(&self, token: &TokenId, entry_type: EntryType) -> Amount {
        Amount::new(
            self.postings
                .iter()
                .filter(|p| &p.token == token && p.entry_type == entry_type)
                .map(|p| p.amount.base_units())
                .fold(0u128, u128::saturating_add),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_batch() {
        let token = TokenId::new("fDAI");
        let taker = AccountId::new("taker");
        let maker = AccountId::new("maker");
        let fees = AccountId::new("fees");

        let batch = JournalBatch::new()
            .debit(&token, &taker, Amount::new(110))
            .credit(&token, &maker, Amount::new(100))
            .credit(&token, &fees, Amount::new(10));

        assert!(batch.is_balanced());
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.total_debits(&token), Amount::new(110));
        assert_eq!(batch.total_credits(&token), Amount::new(110));
    }

    #[test]
    fn test_unbalanced_batch() {
        let token = TokenId::new("fDAI");
        let batch = JournalBatch::new().debit(&token, &AccountId::new("a"), Amount::new(5));

        assert!(!batch.is_balanced());
        assert_eq!(batch.total_credits(&token), Amount::ZERO);
    }

    #[test]
    fn test_balance_is_per_token() {
        let apt = TokenId::new("APT");
        let dai = TokenId::new("fDAI");
        let a = AccountId::new("a");
        let b = AccountId::new("b");

        let batch = JournalBatch::new()
            .debit(&apt, &a, Amount::new(5))
            .credit(&dai, &b, Amount::new(5));

        assert!(!batch.is_balanced());
    }
}
