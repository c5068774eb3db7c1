//! Simulation scenarios.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Named scenarios selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioKind {
    /// Fixture flow: deposits, one cancelled order, three fills, open orders.
    Seed,
    /// Many takers race to fill a single order.
    Contention,
    /// Seeded random create, fill and cancel traffic.
    Random,
}

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Tokens to deploy, as `(name, symbol)`.
    pub tokens: Vec<(String, String)>,
    /// Number of trader accounts.
    pub traders: usize,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario. Users are trader indices, tokens are symbols and
/// amounts are human token quantities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Wallet to wallet transfer outside the exchange.
    Transfer {
        token: String,
        from: usize,
        to: usize,
        amount: String,
    },
    /// Move tokens from the deployer to a trader and deposit them.
    Fund {
        user: usize,
        token: String,
        amount: String,
    },
    /// Approve and deposit from the trader's own wallet.
    Deposit {
        user: usize,
        token: String,
        amount: String,
    },
    /// Place an order.
    MakeOrder {
        user: usize,
        wanted_token: String,
        wanted_amount: String,
        offered_token: String,
        offered_amount: String,
    },
    /// Cancel the most recently placed order.
    CancelLast { user: usize },
    /// Fill the most recently placed order.
    FillLast { user: usize },
    /// Every trader except the maker tries to fill the most recent order at once.
    RaceFillLast,
    /// Run a step that the exchange must reject with the given error code.
    ExpectRejection { code: String, step: Box<ScenarioStep> },
    /// Random traffic for the given number of actions.
    RandomTraffic { actions: usize },
    /// Fail the run unless custody still covers every balance.
    AssertConserved,
}

impl Scenario {
    /// Build a scenario.
    pub fn load(kind: ScenarioKind, actions: usize, traders: usize) -> Self {
        match kind {
            ScenarioKind::Seed => Self::seed(),
            ScenarioKind::Contention => Self::contention(traders.max(2)),
            ScenarioKind::Random => Self::random(actions, traders.max(2)),
        }
    }

    fn standard_tokens() -> Vec<(String, String)> {
        [("apToken", "APT"), ("fDAI", "fDAI"), ("fETH", "fETH")]
            .iter()
            .map(|(name, symbol)| (name.to_string(), symbol.to_string()))
            .collect()
    }

    fn order(user: usize, wanted: (&str, &str), offered: (&str, &str)) -> ScenarioStep {
        ScenarioStep::MakeOrder {
            user,
            wanted_token: wanted.0.to_string(),
            wanted_amount: wanted.1.to_string(),
            offered_token: offered.0.to_string(),
            offered_amount: offered.1.to_string(),
        }
    }

    /// Trader 0 is the deployer and owns every supply.
    fn seed() -> Self {
        let mut steps = vec![
            ScenarioStep::Transfer {
                token: "fETH".to_string(),
                from: 0,
                to: 1,
                amount: "10000".to_string(),
            },
            ScenarioStep::Deposit {
                user: 0,
                token: "APT".to_string(),
                amount: "10000".to_string(),
            },
            ScenarioStep::Deposit {
                user: 1,
                token: "fETH".to_string(),
                amount: "10000".to_string(),
            },
            Self::order(0, ("fETH", "100"), ("APT", "5")),
            ScenarioStep::CancelLast { user: 0 },
        ];

        for (wanted, offered) in [("100", "10"), ("50", "15"), ("200", "20")] {
            steps.push(Self::order(0, ("fETH", wanted), ("APT", offered)));
            steps.push(ScenarioStep::FillLast { user: 1 });
        }

        for i in 0..=5u32 {
            let wanted = (10 * i).to_string();
            steps.push(Self::order(0, ("fETH", &wanted), ("APT", "10")));
        }

        // user2 earned 45 APT from the fills. Each offer is checked on its
        // own and nothing is reserved, so together they exceed 45.
        for i in 0..=4u32 {
            let offered = (10 * i).to_string();
            steps.push(Self::order(1, ("APT", "10"), ("APT", &offered)));
        }
        steps.push(ScenarioStep::ExpectRejection {
            code: "INSUFFICIENT_BALANCE".to_string(),
            step: Box::new(Self::order(1, ("APT", "10"), ("APT", "50"))),
        });

        steps.push(ScenarioStep::AssertConserved);

        Self {
            name: "seed".to_string(),
            description: "Deposits, a cancelled order, three fills and open orders".to_string(),
            tokens: Self::standard_tokens(),
            traders: 2,
            steps,
        }
    }

    fn contention(traders: usize) -> Self {
        let mut steps = vec![ScenarioStep::Fund {
            user: 0,
            token: "APT".to_string(),
            amount: "100".to_string(),
        }];

        for user in 1..traders {
            steps.push(ScenarioStep::Fund {
                user,
                token: "fDAI".to_string(),
                amount: "10".to_string(),
            });
        }

        steps.push(Self::order(0, ("fDAI", "1"), ("APT", "100")));
        steps.push(ScenarioStep::RaceFillLast);
        steps.push(ScenarioStep::AssertConserved);

        Self {
            name: "contention".to_string(),
            description: "Concurrent takers race for one order".to_string(),
            tokens: Self::standard_tokens(),
            traders,
            steps,
        }
    }

    fn random(actions: usize, traders: usize) -> Self {
        let mut steps = Vec::new();
        for user in 0..traders {
            for token in ["APT", "fDAI", "fETH"] {
                steps.push(ScenarioStep::Fund {
                    user,
                    token: token.to_string(),
                    amount: "1000".to_string(),
                });
            }
        }

        steps.push(ScenarioStep::RandomTraffic { actions });
        steps.push(ScenarioStep::AssertConserved);

        Self {
            name: "random".to_string(),
            description: "Seeded random order traffic".to_string(),
            tokens: Self::standard_tokens(),
            traders,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_shape() {
        let scenario = Scenario::load(ScenarioKind::Seed, 0, 0);

        let orders = scenario
            .steps
            .iter()
            .filter(|s| matches!(s, ScenarioStep::MakeOrder { .. }))
            .count();
        let fills = scenario
            .steps
            .iter()
            .filter(|s| matches!(s, ScenarioStep::FillLast { .. }))
            .count();

        let rejections = scenario
            .steps
            .iter()
            .filter(|s| matches!(s, ScenarioStep::ExpectRejection { .. }))
            .count();

        assert_eq!(orders, 15);
        assert_eq!(rejections, 1);
        assert_eq!(fills, 3);
        assert_eq!(scenario.traders, 2);
    }

    #[test]
    fn test_contention_needs_two_traders() {
        let scenario = Scenario::load(ScenarioKind::Contention, 0, 1);
        assert_eq!(scenario.traders, 2);
        assert!(matches!(scenario.steps.last(), Some(ScenarioStep::AssertConserved)));
    }
}
