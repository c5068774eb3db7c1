//! Simulated market: a token registry, an exchange and its traders.

use std::sync::Arc;

use tokenex_asset::{AssetLedger, InMemoryAssetLedger, TokenInfo};
use tokenex_common::{AccountId, Amount, ExchangeError, TokenId};
use tokenex_ledger::{Exchange, ExchangeConfig};
use tracing::info;

/// Supply minted for every simulated token, in whole tokens.
pub const TOKEN_SUPPLY: u64 = 1_000_000;

/// An exchange wired to an in-memory token registry.
pub struct Market {
    /// Token registry the exchange holds custody in.
    pub assets: Arc<InMemoryAssetLedger>,
    /// The exchange under simulation.
    pub exchange: Arc<Exchange>,
    /// Account that receives every token's supply.
    pub deployer: AccountId,
}

impl Market {
    /// Open a market with no tokens.
    pub fn open(config: ExchangeConfig, deployer: AccountId) -> anyhow::Result<Self> {
        let assets = Arc::new(InMemoryAssetLedger::new());
        let exchange = Exchange::new(config, assets.clone())?;

        info!(
            fee_account = %exchange.fee_account(),
            fee_percent = exchange.fee_percent(),
            "Market opened"
        );

        Ok(Self {
            assets,
            exchange: Arc::new(exchange),
            deployer,
        })
    }

    /// Deploy a token with the standard supply, owned by the deployer.
    pub fn deploy(&self, name: &str, symbol: &str) -> anyhow::Result<TokenId> {
        let info = TokenInfo::new(name, symbol, Amount::whole(TOKEN_SUPPLY));
        Ok(self.assets.deploy(info, &self.deployer)?)
    }

    /// Move tokens between wallets outside the exchange.
    pub fn transfer(
        &self,
        token: &TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> anyhow::Result<()> {
        self.assets.transfer(token, from, to, amount)?;
        Ok(())
    }

    /// Approve the exchange and deposit in one go.
    pub fn deposit(
        &self,
        user: &AccountId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<Amount, ExchangeError> {
        let custody = &self.exchange.config().custody_account;
        self.assets
            .approve(token, user, custody, amount)
            .map_err(|e| ExchangeError::TransferFailed {
                token: token.clone(),
                reason: e.to_string(),
            })?;
        self.exchange.deposit(token, user, amount)
    }

    /// Give `user` `amount` from the deployer and deposit all of it.
    pub fn fund(&self, user: &AccountId, token: &TokenId, amount: Amount) -> anyhow::Result<()> {
        if user != &self.deployer {
            self.transfer(token, &self.deployer, user, amount)?;
        }
        self.deposit(user, token, amount)?;
        Ok(())
    }

    /// Whether custody still covers every custodial balance.
    pub fn custody_conserved(&self) -> anyhow::Result<bool> {
        Ok(self.exchange.verify_custody()?)
    }
}

/// Create `count` trader accounts.
pub fn traders(count: usize) -> Vec<AccountId> {
    const NAMES: [&str; 6] = ["user1", "user2", "alice", "bob", "carol", "dave"];

    (0..count)
        .map(|i| match NAMES.get(i) {
            Some(name) => AccountId::new(*name),
            None => AccountId::new(format!("trader_{}", i + 1)),
        })
        .collect()
}
