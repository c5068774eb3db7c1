//! In-memory token registry.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use tokenex_common::{AccountId, Amount, TokenId};

use crate::error::{AssetError, AssetResult};
use crate::ledger::AssetLedger;
use crate::token::TokenInfo;

#[derive(Default)]
struct Book {
    balances: HashMap<(TokenId, AccountId), Amount>,
    allowances: HashMap<(TokenId, AccountId, AccountId), Amount>,
}

impl Book {
    fn balance(&self, token: &TokenId, owner: &AccountId) -> Amount {
        self.balances
            .get(&(token.clone(), owner.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    fn allowance(&self, token: &TokenId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(token.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Move `amount` after checking both sides; mutates nothing on error.
    fn move_balance(
        &mut self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> AssetResult<()> {
        if !to.is_valid() {
            return Err(AssetError::InvalidRecipient(to.clone()));
        }

        let available = self.balance(token, from);
        let debited = available
            .checked_sub(amount)
            .ok_or_else(|| AssetError::InsufficientBalance {
                token: token.clone(),
                owner: from.clone(),
                required: amount,
                available,
            })?;

        if from == to {
            return Ok(());
        }

        let credited = self
            .balance(token, to)
            .checked_add(amount)
            .ok_or_else(|| AssetError::Overflow(token.clone()))?;

        self.balances.insert((token.clone(), from.clone()), debited);
        self.balances.insert((token.clone(), to.clone()), credited);
        Ok(())
    }
}

/// Multi-token ledger held in memory.
///
/// Balance and allowance mutations are serialized by one mutex so that a
/// transfer debits and credits together; token metadata is read-mostly and
/// lives in a concurrent map.
#[derive(Default)]
pub struct InMemoryAssetLedger {
    tokens: DashMap<TokenId, TokenInfo>,
    book: Mutex<Book>,
}

impl InMemoryAssetLedger {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token and assign its whole supply to `deployer`.
    pub fn deploy(&self, info: TokenInfo, deployer: &AccountId) -> AssetResult<TokenId> {
        if !deployer.is_valid() {
            return Err(AssetError::InvalidRecipient(deployer.clone()));
        }

        let token = info.id.clone();
        let supply = info.total_supply;

        match self.tokens.entry(token.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AssetError::TokenExists(token));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(info);
            }
        }

        self.book
            .lock()
            .balances
            .insert((token.clone(), deployer.clone()), supply);

        info!(
            token = %token,
            deployer = %deployer,
            total_supply = %supply,
            "Token deployed"
        );

        Ok(token)
    }

    /// Get token metadata.
    pub fn token_info(&self, token: &TokenId) -> Option<TokenInfo> {
        self.tokens.get(token).map(|t| t.clone())
    }

    /// Get all registered token ids.
    pub fn tokens(&self) -> Vec<TokenId> {
        let mut ids: Vec<TokenId> = self.tokens.iter().map(|t| t.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Set the amount `spender` may pull from `owner`, replacing any
    /// previous allowance.
    pub fn approve(
        &self,
        token: &TokenId,
        owner: &AccountId,
        spender: &AccountId,
        amount: Amount,
    ) -> AssetResult<()> {
        self.ensure_token(token)?;
        if !spender.is_valid() {
            return Err(AssetError::InvalidRecipient(spender.clone()));
        }

        self.book
            .lock()
            .allowances
            .insert((token.clone(), owner.clone(), spender.clone()), amount);

        debug!(
            token = %token,
            owner = %owner,
            spender = %spender,
            amount = %amount,
            "Approval"
        );

        Ok(())
    }

    fn ensure_token(&self, token: &TokenId) -> AssetResult<()> {
        if self.tokens.contains_key(token) {
            Ok(())
        } else {
            Err(AssetError::UnknownToken(token.clone()))
        }
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn balance_of(&self, token: &TokenId, owner: &AccountId) -> AssetResult<Amount> {
        self.ensure_token(token)?;
        Ok(self.book.lock().balance(token, owner))
    }

    fn transfer(
        &self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> AssetResult<()> {
        self.ensure_token(token)?;
        self.book.lock().move_balance(token, from, to, amount)?;

        debug!(token = %token, from = %from, to = %to, amount = %amount, "Transfer");
        Ok(())
    }

    fn transfer_from(
        &self,
        token: &TokenId,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> AssetResult<()> {
        self.ensure_token(token)?;

        let mut book = self.book.lock();
        let allowed = book.allowance(token, owner, spender);
        let remaining = allowed
            .checked_sub(amount)
            .ok_or_else(|| AssetError::InsufficientAllowance {
                token: token.clone(),
                owner: owner.clone(),
                spender: spender.clone(),
                required: amount,
                available: allowed,
            })?;

        book.move_balance(token, owner, to, amount)?;
        book.allowances
            .insert((token.clone(), owner.clone(), spender.clone()), remaining);

        debug!(
            token = %token,
            spender = %spender,
            from = %owner,
            to = %to,
            amount = %amount,
            "Transfer on behalf"
        );
        Ok(())
    }

    fn allowance(
        &self,
        token: &TokenId,
        owner: &AccountId,
        spender: &AccountId,
    ) -> AssetResult<Amount> {
        self.ensure_token(token)?;
        Ok(self.book.lock().allowance(token, owner, spender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn setup() -> (InMemoryAssetLedger, TokenId, AccountId) {
        let ledger = InMemoryAssetLedger::new();
        let deployer = AccountId::new("deployer");
        let token = ledger
            .deploy(
                TokenInfo::new("Token Exchange", "TKE", Amount::whole(1_000_000)),
                &deployer,
            )
            .unwrap();
        (ledger, token, deployer)
    }

    #[test]
    fn test_deploy_assigns_supply() {
        let (ledger, token, deployer) = setup();

        let info = ledger.token_info(&token).unwrap();
        assert_eq!(info.name, "Token Exchange");
        assert_eq!(info.symbol, "TKE");
        assert_eq!(info.decimals, 18);
        assert_eq!(info.total_supply, Amount::whole(1_000_000));
        assert_eq!(
            ledger.balance_of(&token, &deployer).unwrap(),
            Amount::whole(1_000_000)
        );
    }

    #[test]
    fn test_duplicate_deploy_rejected() {
        let (ledger, _, deployer) = setup();
        let result = ledger.deploy(TokenInfo::new("Again", "TKE", Amount::whole(1)), &deployer);
        assert!(matches!(result, Err(AssetError::TokenExists(_))));
    }

    #[test]
    fn test_transfer() {
        let (ledger, token, deployer) = setup();
        let recipient = AccountId::new("recipient");

        assert_ok!(ledger.transfer(&token, &deployer, &recipient, Amount::whole(100)));

        assert_eq!(
            ledger.balance_of(&token, &deployer).unwrap(),
            Amount::whole(999_900)
        );
        assert_eq!(
            ledger.balance_of(&token, &recipient).unwrap(),
            Amount::whole(100)
        );
    }

    #[test]
    fn test_transfer_failures() {
        let (ledger, token, deployer) = setup();
        let recipient = AccountId::new("recipient");

        assert_err!(ledger.transfer(&token, &deployer, &recipient, Amount::whole(100_000_000)));
        assert_err!(ledger.transfer(&token, &deployer, &AccountId::new(""), Amount::whole(1)));
        assert_err!(ledger.transfer(&TokenId::new("NOPE"), &deployer, &recipient, Amount::whole(1)));

        assert_eq!(
            ledger.balance_of(&token, &deployer).unwrap(),
            Amount::whole(1_000_000)
        );
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let (ledger, token, deployer) = setup();
        let exchange = AccountId::new("exchange");

        ledger
            .approve(&token, &deployer, &exchange, Amount::whole(100))
            .unwrap();
        assert_eq!(
            ledger.allowance(&token, &deployer, &exchange).unwrap(),
            Amount::whole(100)
        );

        assert_ok!(ledger.transfer_from(&token, &exchange, &deployer, &exchange, Amount::whole(60)));
        assert_eq!(
            ledger.allowance(&token, &deployer, &exchange).unwrap(),
            Amount::whole(40)
        );
        assert_eq!(
            ledger.balance_of(&token, &exchange).unwrap(),
            Amount::whole(60)
        );

        let result = ledger.transfer_from(&token, &exchange, &deployer, &exchange, Amount::whole(41));
        assert!(matches!(result, Err(AssetError::InsufficientAllowance { .. })));
        assert_eq!(
            ledger.allowance(&token, &deployer, &exchange).unwrap(),
            Amount::whole(40)
        );
    }

    #[test]
    fn test_transfer_from_insufficient_balance_keeps_allowance() {
        let (ledger, token, _) = setup();
        let owner = AccountId::new("poor");
        let exchange = AccountId::new("exchange");

        ledger
            .approve(&token, &owner, &exchange, Amount::whole(10))
            .unwrap();
        let result = ledger.transfer_from(&token, &exchange, &owner, &exchange, Amount::whole(10));

        assert!(matches!(result, Err(AssetError::InsufficientBalance { .. })));
        assert_eq!(
            ledger.allowance(&token, &owner, &exchange).unwrap(),
            Amount::whole(10)
        );
    }
}
