//! Core exchange engine.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use tokenex_asset::AssetLedger;
use tokenex_common::{
    now, AccountId, Amount, ExchangeError, OrderId, OrderStatus, Result, Timestamp, TokenId,
};

use crate::balance::{BalanceChange, BalanceTable};
use crate::config::ExchangeConfig;
use crate::events::{EventEnvelope, ExchangeEvent};
use crate::journal::JournalBatch;
use crate::order::{NewOrder, Order, OrderBook};

/// Outcome of a successful fill.
#[derive(Debug, Clone)]
pub struct TradeReceipt {
    /// The filled order.
    pub order: Order,
    /// Account that filled it.
    pub taker: AccountId,
    /// Fee paid by the taker in the wanted token.
    pub fee: Amount,
    /// When the fill was committed.
    pub filled_at: Timestamp,
    /// Committed balance movements, in settlement order.
    pub changes: Vec<BalanceChange>,
}

/// Everything mutated by an exchange operation, guarded by one lock.
#[derive(Default)]
struct ExchangeState {
    balances: BalanceTable,
    book: OrderBook,
    log: Vec<EventEnvelope>,
}

/// The exchange ledger and order book.
///
/// Mutating operations take the write lock for their full duration,
/// including the asset ledger call of a deposit or withdrawal, so they are
/// applied one at a time in a total order. Queries take the read lock and
/// never observe a half-applied operation.
pub struct Exchange {
    /// Configuration.
    config: ExchangeConfig,
    /// Token ledger that custody is held in.
    assets: Arc<dyn AssetLedger>,
    /// Balances, orders and the notification log.
    state: RwLock<ExchangeState>,
    /// Live notification channel.
    events_tx: broadcast::Sender<EventEnvelope>,
}

impl Exchange {
    /// Create a new exchange over `assets`.
    pub fn new(config: ExchangeConfig, assets: Arc<dyn AssetLedger>) -> Result<Self> {
        config.validate().map_err(ExchangeError::ConfigurationError)?;

        let (events_tx, _) = broadcast::channel(config.event_capacity);

        info!(
            fee_account = %config.fee_account,
            fee_percent = config.fee_percent,
            custody_account = %config.custody_account,
            "Exchange created"
        );

        Ok(Self {
            config,
            assets,
            state: RwLock::new(ExchangeState::default()),
            events_tx,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Account credited with fees.
    pub fn fee_account(&self) -> &AccountId {
        &self.config.fee_account
    }

    /// Fee percentage charged on fills.
    pub fn fee_percent(&self) -> u32 {
        self.config.fee_percent
    }

    /// Pull `amount` of `token` from the caller's asset ledger balance into
    /// custody and credit it. Returns the resulting custodial balance.
    #[instrument(skip(self))]
    pub fn deposit(&self, token: &TokenId, caller: &AccountId, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(ExchangeError::InvalidAmount("deposit amount must be positive".into()));
        }
        self.ensure_not_custody(caller)?;

        let mut state = self.state.write();

        // Reject an unrepresentable credit before any tokens move
        state
            .balances
            .balance_of(token, caller)
            .checked_add(amount)
            .ok_or_else(|| ExchangeError::Overflow(format!("{token} balance of {caller}")))?;

        let custody = &self.config.custody_account;
        self.assets
            .transfer_from(token, custody, caller, custody, amount)
            .map_err(|e| {
                warn!(token = %token, user = %caller, error = %e, "Deposit pull failed");
                ExchangeError::TransferFailed {
                    token: token.clone(),
                    reason: e.to_string(),
                }
            })?;

        let balance = state.balances.credit(token, caller, amount)?;

        self.publish(
            &mut state,
            ExchangeEvent::Deposit {
                token: token.clone(),
                user: caller.clone(),
                amount,
                balance,
            },
        );

        info!(token = %token, user = %caller, amount = %amount, balance = %balance, "Deposit");
        Ok(balance)
    }

    /// Debit the caller's custodial balance and push `amount` of `token`
    /// back to them. Returns the resulting custodial balance.
    #[instrument(skip(self))]
    pub fn withdraw(&self, token: &TokenId, caller: &AccountId, amount: Amount) -> Result<Amount> {
        if amount.is_zero() {
            return Err(ExchangeError::InvalidAmount("withdrawal amount must be positive".into()));
        }
        self.ensure_not_custody(caller)?;

        let mut state = self.state.write();

        let before = state.balances.balance_of(token, caller);
        let balance = state.balances.debit(token, caller, amount).map_err(|e| {
            warn!(token = %token, user = %caller, amount = %amount, "Withdrawal exceeds balance");
            e
        })?;

        // The debit is already recorded when the push runs
        if let Err(e) = self
            .assets
            .transfer(token, &self.config.custody_account, caller, amount)
        {
            state.balances.set(token, caller, before);
            warn!(token = %token, user = %caller, error = %e, "Withdrawal push failed, debit restored");
            return Err(ExchangeError::TransferFailed {
                token: token.clone(),
                reason: e.to_string(),
            });
        }

        self.publish(
            &mut state,
            ExchangeEvent::Withdrawal {
                token: token.clone(),
                user: caller.clone(),
                amount,
                balance,
            },
        );

        info!(token = %token, user = %caller, amount = %amount, balance = %balance, "Withdrawal");
        Ok(balance)
    }

    /// Custodial balance of `owner` in `token`.
    pub fn balance_of(&self, token: &TokenId, owner: &AccountId) -> Amount {
        self.state.read().balances.balance_of(token, owner)
    }

    /// Create a resting order. The maker's custodial balance of the offered
    /// token must cover the offered amount now; it is not reserved.
    #[instrument(skip(self))]
    pub fn create_order(&self, maker: &AccountId, terms: NewOrder) -> Result<Order> {
        self.ensure_not_custody(maker)?;
        let mut state = self.state.write();

        state
            .balances
            .ensure_covers(&terms.offered_token, maker, terms.offered_amount)
            .map_err(|e| {
                warn!(maker = %maker, error = %e, "Order rejected");
                e
            })?;

        let order = state.book.create(maker.clone(), terms, now());
        self.publish(&mut state, ExchangeEvent::order_created(&order));

        info!(
            order_id = %order.id,
            maker = %maker,
            wanted = %order.wanted_token,
            offered = %order.offered_token,
            "Order created"
        );
        Ok(order)
    }

    /// Cancel an open order. Only its maker may cancel it.
    #[instrument(skip(self))]
    pub fn cancel_order(&self, caller: &AccountId, id: OrderId) -> Result<Order> {
        let mut state = self.state.write();

        let order = state.book.find(id)?.clone();
        if &order.maker != caller {
            warn!(order_id = %id, caller = %caller, "Cancellation by non-maker rejected");
            return Err(ExchangeError::Unauthorized {
                order_id: id,
                caller: caller.clone(),
            });
        }
        state.book.find_open(id)?;

        state.book.mark_cancelled(id);
        self.publish(&mut state, ExchangeEvent::cancel(&order, now()));

        info!(order_id = %id, maker = %caller, "Order cancelled");
        Ok(order)
    }

    /// Fill an open order in full.
    ///
    /// The taker pays `wanted_amount` plus `floor(wanted_amount *
    /// fee_percent / 100)` in the wanted token and receives the offered
    /// amount; the maker receives `wanted_amount` and the fee account the
    /// fee. All legs commit together or not at all, and a failed fill
    /// leaves the order open.
    #[instrument(skip(self))]
    pub fn fill_order(&self, caller: &AccountId, id: OrderId) -> Result<TradeReceipt> {
        self.ensure_not_custody(caller)?;
        let mut state = self.state.write();

        let order = state.book.find_open(id)?.clone();

        let fee = order
            .wanted_amount
            .percent(self.config.fee_percent)
            .ok_or_else(|| ExchangeError::Overflow(format!("fee of order {id}")))?;
        let total = order
            .wanted_amount
            .checked_add(fee)
            .ok_or_else(|| ExchangeError::Overflow(format!("cost of order {id}")))?;

        state
            .balances
            .ensure_covers(&order.wanted_token, caller, total)
            .map_err(|e| {
                warn!(order_id = %id, taker = %caller, error = %e, "Fill rejected");
                e
            })?;

        let batch = self.settlement(&order, caller, fee, total);
        if !batch.is_balanced() {
            warn!(order_id = %id, "Unbalanced settlement rejected");
            return Err(ExchangeError::UnbalancedSettlement(id));
        }
        let changes = state.balances.apply(&batch).map_err(|e| {
            warn!(order_id = %id, taker = %caller, error = %e, "Settlement rolled back");
            e
        })?;

        state.book.mark_filled(id);
        let filled_at = now();
        self.publish(&mut state, ExchangeEvent::trade(&order, caller, filled_at));

        info!(
            order_id = %id,
            maker = %order.maker,
            taker = %caller,
            fee = %fee,
            "Order filled"
        );

        Ok(TradeReceipt {
            order,
            taker: caller.clone(),
            fee,
            filled_at,
            changes,
        })
    }

    /// The custody account's wallet is the backing for every custodial
    /// balance, so it may not hold one itself.
    fn ensure_not_custody(&self, caller: &AccountId) -> Result<()> {
        if caller == &self.config.custody_account {
            warn!(caller = %caller, "Custody account rejected as caller");
            return Err(ExchangeError::ReservedAccount(caller.clone()));
        }
        Ok(())
    }

    /// Postings of a fill, in the order they are applied.
    fn settlement(&self, order: &Order, taker: &AccountId, fee: Amount, total: Amount) -> JournalBatch {
        JournalBatch::new()
            .debit(&order.wanted_token, taker, total)
            .credit(&order.wanted_token, &order.maker, order.wanted_amount)
            .credit(&order.wanted_token, &self.config.fee_account, fee)
            .debit(&order.offered_token, &order.maker, order.offered_amount)
            .credit(&order.offered_token, taker, order.offered_amount)
    }

    /// Get an order by id.
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.state.read().book.get(id).cloned()
    }

    /// Status of an order.
    pub fn order_status(&self, id: OrderId) -> Result<OrderStatus> {
        self.state
            .read()
            .book
            .status(id)
            .ok_or(ExchangeError::NotFound(id))
    }

    /// Whether the order was cancelled.
    pub fn is_cancelled(&self, id: OrderId) -> bool {
        self.state.read().book.is_cancelled(id)
    }

    /// Whether the order was filled.
    pub fn is_filled(&self, id: OrderId) -> bool {
        self.state.read().book.is_filled(id)
    }

    /// Number of orders ever created.
    pub fn order_count(&self) -> u64 {
        self.state.read().book.order_count()
    }

    /// Open orders in id order.
    pub fn open_orders(&self) -> Vec<Order> {
        self.state.read().book.open_orders()
    }

    /// Snapshot of the notification log.
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.state.read().log.clone()
    }

    /// Receive notifications committed after this call.
    ///
    /// A receiver that falls more than `event_capacity` notifications
    /// behind observes `Lagged`; [`Exchange::events`] remains complete.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events_tx.subscribe()
    }

    /// Sum of all custodial balances in `token`.
    pub fn total_custody(&self, token: &TokenId) -> Amount {
        self.state.read().balances.total(token)
    }

    /// Verify that custodial balances of every token are backed by what the
    /// custody account holds in the asset ledger.
    pub fn verify_custody(&self) -> Result<bool> {
        let state = self.state.read();

        for token in state.balances.tokens() {
            let held = self
                .assets
                .balance_of(&token, &self.config.custody_account)
                .map_err(|e| ExchangeError::TransferFailed {
                    token: token.clone(),
                    reason: e.to_string(),
                })?;

            let owed = state.balances.total(&token);
            if owed > held {
                warn!(token = %token, owed = %owed, held = %held, "Custody shortfall");
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn publish(&self, state: &mut ExchangeState, event: ExchangeEvent) {
        let envelope = EventEnvelope {
            sequence: state.log.len() as u64 + 1,
            event,
        };
        state.log.push(envelope.clone());
        // No live subscribers is not an error; the log keeps the record
        let _ = self.events_tx.send(envelope);
    }
}
