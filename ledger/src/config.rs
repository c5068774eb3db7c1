//! Exchange configuration.

use tokenex_common::AccountId;

/// Exchange configuration, fixed for the lifetime of an [`Exchange`].
///
/// [`Exchange`]: crate::Exchange
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Account credited with the protocol fee on every fill.
    pub fee_account: AccountId,
    /// Fee as a whole percentage of the wanted amount (10 means 10%).
    pub fee_percent: u32,
    /// The exchange's own account in the asset ledger; deposits are pulled
    /// into it and withdrawals are pushed out of it.
    pub custody_account: AccountId,
    /// Buffer size of the live notification channel.
    pub event_capacity: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fee_account: AccountId::new("fee-collector"),
            fee_percent: 10,
            custody_account: AccountId::new("exchange"),
            event_capacity: 1024,
        }
    }
}

impl ExchangeConfig {
    /// Create a configuration with the given fee collector and fee.
    pub fn new(fee_account: impl Into<AccountId>, fee_percent: u32) -> Self {
        Self {
            fee_account: fee_account.into(),
            fee_percent,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(account) = std::env::var("EXCHANGE_FEE_ACCOUNT") {
            config.fee_account = AccountId::new(account);
        }

        if let Ok(percent) = std::env::var("EXCHANGE_FEE_PERCENT") {
            if let Ok(percent) = percent.parse() {
                config.fee_percent = percent;
            }
        }

        if let Ok(account) = std::env::var("EXCHANGE_CUSTODY_ACCOUNT") {
            config.custody_account = AccountId::new(account);
        }

        if let Ok(capacity) = std::env::var("EXCHANGE_EVENT_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                config.event_capacity = capacity;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.fee_percent > 100 {
            return Err(format!(
                "Fee percent must be at most 100, got {}",
                self.fee_percent
            ));
        }

        if !self.fee_account.is_valid() {
            return Err(format!("Invalid fee account: {:?}", self.fee_account.as_str()));
        }

        if !self.custody_account.is_valid() {
            return Err(format!(
                "Invalid custody account: {:?}",
                self.custody_account.as_str()
            ));
        }

        if self.fee_account == self.custody_account {
            return Err("Fee account cannot be the custody account".to_string());
        }

        if self.event_capacity == 0 {
            return Err("Event capacity cannot be 0".to_string());
        }

        Ok(())
    }
}
