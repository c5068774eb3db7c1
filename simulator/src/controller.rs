//! Simulation controller.

use std::time::Instant;

use anyhow::{anyhow, bail, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use tokenex_common::{AccountId, Amount, ExchangeError, OrderId, TokenId};
use tokenex_ledger::{Exchange, ExchangeConfig, NewOrder};

use crate::market::{traders, Market};
use crate::metrics::SimulationMetrics;
use crate::scenario::{Scenario, ScenarioStep};

/// Runs scenarios against one market.
pub struct SimulationController {
    market: Market,
    /// Trader accounts; the first one deployed every token.
    traders: Vec<AccountId>,
    tokens: Vec<TokenId>,
    rng: StdRng,
    metrics: SimulationMetrics,
    last_order: Option<OrderId>,
}

impl SimulationController {
    /// Open a market and deploy the scenario's tokens.
    pub fn new(config: ExchangeConfig, scenario: &Scenario, seed: Option<u64>) -> anyhow::Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let traders = traders(scenario.traders.max(1));
        let market = Market::open(config, traders[0].clone())?;

        let mut tokens = Vec::with_capacity(scenario.tokens.len());
        for (name, symbol) in &scenario.tokens {
            tokens.push(market.deploy(name, symbol)?);
        }

        info!(
            traders = traders.len(),
            tokens = tokens.len(),
            "Simulation initialized"
        );

        Ok(Self {
            market,
            traders,
            tokens,
            rng,
            metrics: SimulationMetrics::new(),
            last_order: None,
        })
    }

    /// Run every step of a scenario, stopping at the first failing step.
    pub async fn run_scenario(&mut self, scenario: &Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for step in &scenario.steps {
            self.execute_step(step).await?;
        }

        Ok(())
    }

    async fn execute_step(&mut self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::RaceFillLast => self.race_fill_last().await,
            step => self.apply_step(step),
        }
    }

    /// Steps that run on the calling thread.
    fn apply_step(&mut self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Transfer { token, from, to, amount } => {
                let (token, amount) = (self.token(token)?, Amount::from_tokens(amount)?);
                let (from, to) = (self.trader(*from)?, self.trader(*to)?);
                self.market.transfer(&token, &from, &to, amount)?;
                info!(token = %token, from = %from, to = %to, amount = %amount, "Transferred");
            }
            ScenarioStep::Fund { user, token, amount } => {
                let (token, amount) = (self.token(token)?, Amount::from_tokens(amount)?);
                let user = self.trader(*user)?;
                self.market.fund(&user, &token, amount)?;
            }
            ScenarioStep::Deposit { user, token, amount } => {
                let (token, amount) = (self.token(token)?, Amount::from_tokens(amount)?);
                let user = self.trader(*user)?;
                self.market.deposit(&user, &token, amount)?;
            }
            ScenarioStep::MakeOrder {
                user,
                wanted_token,
                wanted_amount,
                offered_token,
                offered_amount,
            } => {
                let terms = NewOrder::new(
                    self.token(wanted_token)?,
                    Amount::from_tokens(wanted_amount)?,
                    self.token(offered_token)?,
                    Amount::from_tokens(offered_amount)?,
                );
                let maker = self.trader(*user)?;
                let order = self.market.exchange.create_order(&maker, terms)?;
                self.metrics.record_created();
                self.last_order = Some(order.id);
            }
            ScenarioStep::CancelLast { user } => {
                let id = self.last_order()?;
                self.market.exchange.cancel_order(&self.trader(*user)?, id)?;
                self.metrics.record_cancel();
            }
            ScenarioStep::FillLast { user } => {
                let id = self.last_order()?;
                let taker = self.trader(*user)?;
                let started = Instant::now();
                self.market.exchange.fill_order(&taker, id)?;
                self.metrics.record_fill(started.elapsed().as_micros() as u64);
            }
            ScenarioStep::RaceFillLast => bail!("a race cannot be nested in another step"),
            ScenarioStep::ExpectRejection { code, step } => {
                let err = match self.apply_step(step) {
                    Ok(()) => bail!("expected {} but the step succeeded: {:?}", code, step),
                    Err(err) => err,
                };
                let rejected = err
                    .downcast_ref::<ExchangeError>()
                    .ok_or_else(|| anyhow!("expected {} but the step failed with: {}", code, err))?;
                ensure!(
                    rejected.error_code() == code.as_str(),
                    "expected {} but the exchange returned {}",
                    code,
                    rejected.error_code()
                );
                self.metrics.record_rejection(rejected.error_code());
                info!(code = %code, error = %rejected, "Rejected as expected");
            }
            ScenarioStep::RandomTraffic { actions } => self.random_traffic(*actions),
            ScenarioStep::AssertConserved => {
                ensure!(
                    self.market.custody_conserved()?,
                    "custody does not cover custodial balances"
                );
                info!("Custody conserved");
            }
        }

        Ok(())
    }

    async fn race_fill_last(&mut self) -> anyhow::Result<()> {
        let id = self.last_order()?;
        let maker = self
            .market
            .exchange
            .order(id)
            .map(|o| o.maker)
            .ok_or_else(|| anyhow!("Order {} vanished", id))?;

        let handles: Vec<_> = self
            .traders
            .iter()
            .filter(|t| **t != maker)
            .cloned()
            .map(|taker| {
                let exchange = self.market.exchange.clone();
                tokio::task::spawn_blocking(move || {
                    let started = Instant::now();
                    let outcome = exchange.fill_order(&taker, id);
                    (outcome, started.elapsed().as_micros() as u64)
                })
            })
            .collect();

        info!(order_id = %id, takers = handles.len(), "Racing fills");

        let mut winners = 0;
        for handle in handles {
            match handle.await? {
                (Ok(receipt), latency) => {
                    winners += 1;
                    self.metrics.record_fill(latency);
                    info!(order_id = %id, taker = %receipt.taker, "Won the race");
                }
                (Err(e), _) => self.metrics.record_rejection(e.error_code()),
            }
        }

        ensure!(winners == 1, "expected exactly one fill of order {}, got {}", id, winners);
        Ok(())
    }

    fn random_traffic(&mut self, actions: usize) {
        for _ in 0..actions {
            let roll = self.rng.gen_range(0..10);
            let order_count = self.market.exchange.order_count();

            if roll < 4 || order_count == 0 {
                self.random_order();
            } else if roll < 8 {
                let id = OrderId::new(self.rng.gen_range(1..=order_count));
                let taker = self.random_trader();
                let started = Instant::now();
                match self.market.exchange.fill_order(&taker, id) {
                    Ok(_) => self.metrics.record_fill(started.elapsed().as_micros() as u64),
                    Err(e) => {
                        debug!(order_id = %id, taker = %taker, error = %e, "Fill rejected");
                        self.metrics.record_rejection(e.error_code());
                    }
                }
            } else {
                let id = OrderId::new(self.rng.gen_range(1..=order_count));
                let caller = match self.market.exchange.order(id) {
                    Some(order) if self.rng.gen_bool(0.8) => order.maker,
                    _ => self.random_trader(),
                };
                match self.market.exchange.cancel_order(&caller, id) {
                    Ok(_) => self.metrics.record_cancel(),
                    Err(e) => {
                        debug!(order_id = %id, caller = %caller, error = %e, "Cancel rejected");
                        self.metrics.record_rejection(e.error_code());
                    }
                }
            }
        }
    }

    fn random_order(&mut self) {
        let maker = self.random_trader();
        let wanted = self.tokens[self.rng.gen_range(0..self.tokens.len())].clone();
        let offered = self.tokens[self.rng.gen_range(0..self.tokens.len())].clone();
        let terms = NewOrder::new(
            wanted,
            Amount::whole(self.rng.gen_range(1..=50)),
            offered,
            Amount::whole(self.rng.gen_range(1..=50)),
        );

        match self.market.exchange.create_order(&maker, terms) {
            Ok(_) => self.metrics.record_created(),
            Err(e) => {
                warn!(maker = %maker, error = %e, "Order rejected");
                self.metrics.record_rejection(e.error_code());
            }
        }
    }

    fn random_trader(&mut self) -> AccountId {
        self.traders[self.rng.gen_range(0..self.traders.len())].clone()
    }

    fn trader(&self, index: usize) -> anyhow::Result<AccountId> {
        self.traders
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("No trader {}", index))
    }

    fn token(&self, symbol: &str) -> anyhow::Result<TokenId> {
        let id = TokenId::new(symbol);
        if self.market.assets.token_info(&id).is_none() {
            bail!("Unknown token: {}", symbol);
        }
        Ok(id)
    }

    fn last_order(&self) -> anyhow::Result<OrderId> {
        self.last_order.ok_or_else(|| anyhow!("No order placed yet"))
    }

    /// Get simulation metrics.
    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// The exchange under simulation.
    pub fn exchange(&self) -> &Exchange {
        &self.market.exchange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioKind;
    use tokenex_common::OrderStatus;

    async fn run(kind: ScenarioKind, actions: usize, traders: usize) -> SimulationController {
        let scenario = Scenario::load(kind, actions, traders);
        let mut controller =
            SimulationController::new(ExchangeConfig::default(), &scenario, Some(7)).unwrap();
        controller.run_scenario(&scenario).await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_seed_scenario() {
        let controller = run(ScenarioKind::Seed, 0, 0).await;
        let exchange = controller.exchange();

        assert_eq!(exchange.order_count(), 15);
        assert_eq!(exchange.order_status(OrderId::new(1)).unwrap(), OrderStatus::Cancelled);
        assert!(exchange.is_filled(OrderId::new(2)));
        assert!(exchange.is_filled(OrderId::new(4)));
        assert_eq!(exchange.open_orders().len(), 11);
        assert_eq!(controller.metrics().rejected_with("INSUFFICIENT_BALANCE"), 1);

        let user1 = AccountId::new("user1");
        let user2 = AccountId::new("user2");
        let (apt, feth) = (TokenId::new("APT"), TokenId::new("fETH"));
        assert_eq!(exchange.balance_of(&apt, &user1), Amount::whole(10000 - 45));
        assert_eq!(exchange.balance_of(&apt, &user2), Amount::whole(45));
        assert_eq!(exchange.balance_of(&feth, &user1), Amount::whole(350));
        assert_eq!(exchange.balance_of(&feth, &user2), Amount::whole(10000 - 385));
        assert_eq!(exchange.balance_of(&feth, exchange.fee_account()), Amount::whole(35));
    }

    #[tokio::test]
    async fn test_unexpected_success_fails_the_run() {
        let mut scenario = Scenario::load(ScenarioKind::Seed, 0, 0);
        scenario.steps.truncate(3);
        scenario.steps.push(ScenarioStep::ExpectRejection {
            code: "INSUFFICIENT_BALANCE".to_string(),
            step: Box::new(ScenarioStep::MakeOrder {
                user: 0,
                wanted_token: "fETH".to_string(),
                wanted_amount: "1".to_string(),
                offered_token: "APT".to_string(),
                offered_amount: "1".to_string(),
            }),
        });

        let mut controller =
            SimulationController::new(ExchangeConfig::default(), &scenario, Some(7)).unwrap();
        assert!(controller.run_scenario(&scenario).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_contention_scenario() {
        let controller = run(ScenarioKind::Contention, 0, 6).await;

        assert_eq!(controller.metrics().orders_filled, 1);
        assert_eq!(controller.metrics().rejected_with("ALREADY_CLOSED"), 4);
    }

    #[tokio::test]
    async fn test_random_scenario_is_reproducible() {
        let first = run(ScenarioKind::Random, 200, 4).await;
        let second = run(ScenarioKind::Random, 200, 4).await;

        assert_eq!(first.metrics().orders_created, second.metrics().orders_created);
        assert_eq!(first.metrics().orders_filled, second.metrics().orders_filled);
        assert_eq!(first.metrics().rejected, second.metrics().rejected);
        assert!(first.exchange().verify_custody().unwrap());
    }
}
