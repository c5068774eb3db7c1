//! Tokenex Simulator
//!
//! Drives an in-memory exchange through named scenarios and reports what
//! happened.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod controller;
mod market;
mod metrics;
mod scenario;

use controller::SimulationController;
use scenario::{Scenario, ScenarioKind};
use tokenex_ledger::ExchangeConfig;

/// Tokenex Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Tokenex exchange scenario runner")]
struct Args {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value = "seed")]
    scenario: ScenarioKind,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Override the fee percent from the environment
    #[arg(long)]
    fee_percent: Option<u32>,

    /// Number of random actions
    #[arg(long, default_value = "500")]
    orders: usize,

    /// Number of traders in the contention and random scenarios
    #[arg(long, default_value = "6")]
    traders: usize,

    /// Print the notification log as JSON lines
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    let mut config = ExchangeConfig::from_env();
    if let Some(percent) = args.fee_percent {
        config.fee_percent = percent;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    info!("Starting Tokenex Simulator");
    info!("Fee: {}% to {}", config.fee_percent, config.fee_account);

    let scenario = Scenario::load(args.scenario, args.orders, args.traders);
    let mut controller = SimulationController::new(config, &scenario, args.seed)?;
    controller.run_scenario(&scenario).await?;

    let exchange = controller.exchange();
    let metrics = controller.metrics();
    if args.json {
        for envelope in exchange.events() {
            println!("{}", envelope.to_json()?);
        }
        println!("{}", serde_json::to_string(metrics)?);
    }

    info!("Simulation complete");
    info!("Orders: {}", metrics.orders_created);
    info!("Filled: {}", metrics.orders_filled);
    info!("Cancelled: {}", metrics.orders_cancelled);
    info!("Open: {}", exchange.open_orders().len());
    info!("Rejected: {} {:?}", metrics.total_rejected(), metrics.rejected);
    info!(
        "Fill latency: avg {}us, p99 {}us",
        metrics.average_fill_latency_us(),
        metrics.p99_fill_latency_us()
    );

    Ok(())
}
