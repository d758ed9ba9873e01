//! Polymarket Auto Trader
//!
//! Scheduled whale following, spike monitoring and ladder orders.

use clap::{Args, Parser, Subcommand};
use polymarket_auto::{
    client::{OrderGateway, PolymarketClient},
    config::Config,
    executor::{ExecutionController, RoundState, TradeInstruction},
    paper::PaperGateway,
    scheduler::{stop_channel, stop_on_ctrl_c, MonitorSession, Scheduler, Venue},
    strategy::{LadderInstruction, LadderPlan, LadderPlanner, SpikeMonitor, SpikeResponse, StrategyKind},
    types::Side,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "polymarket-auto")]
#[command(about = "Signal detection and budgeted order execution for Polymarket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

/// Order routing flags shared by every trading command
#[derive(Args, Clone)]
struct Mode {
    /// Simulate orders (default from config)
    #[arg(long, conflicts_with = "live")]
    dry_run: bool,
    /// Send real orders
    #[arg(long)]
    live: bool,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
    /// Append dry-run orders to this JSONL file
    #[arg(long, value_name = "PATH")]
    audit: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct RoundArgs {
    /// Strategy: whale, volume, sport, elon, sport-whale
    #[arg(short, long)]
    strategy: Option<String>,
    /// Minutes between rounds
    #[arg(short, long)]
    interval: Option<u64>,
    /// Stop after this many rounds
    #[arg(long)]
    max_runs: Option<u32>,
    /// USD per trade
    #[arg(long)]
    bet: Option<Decimal>,
    /// USD per round
    #[arg(long)]
    budget: Option<Decimal>,
    #[command(flatten)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a strategy on a schedule
    Run(RoundArgs),
    /// Run a single round
    Once(RoundArgs),
    /// Watch markets for price spikes
    Monitor {
        /// Market ids to watch
        #[arg(required = true)]
        markets: Vec<String>,
        /// alert, momentum or mean-reversion
        #[arg(short, long, default_value = "alert")]
        response: String,
        /// Relative change that counts as a spike
        #[arg(long)]
        threshold: Option<Decimal>,
        /// Seconds to look back
        #[arg(long)]
        lookback: Option<u64>,
        /// Stop after this many polls
        #[arg(long)]
        polls: Option<u64>,
        #[arg(long)]
        bet: Option<Decimal>,
        #[arg(long)]
        budget: Option<Decimal>,
        #[command(flatten)]
        mode: Mode,
    },
    /// Place a ladder of limit orders
    Ladder {
        market_id: String,
        side: Side,
        start: Decimal,
        end: Decimal,
        num: usize,
        /// Shares per order
        size: Decimal,
        #[command(flatten)]
        mode: Mode,
    },
    /// Place buys below and sells above a center price
    Grid {
        market_id: String,
        center: Decimal,
        spacing: Decimal,
        levels: usize,
        /// Shares per order
        size: Decimal,
        #[command(flatten)]
        mode: Mode,
    },
    /// Cancel one order, or all open orders
    Cancel {
        /// Order id; omit to cancel everything
        order_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run(args) => run_rounds(&mut config, args, false).await,
        Commands::Once(args) => run_rounds(&mut config, args, true).await,
        Commands::Monitor {
            markets,
            response,
            threshold,
            lookback,
            polls,
            bet,
            budget,
            mode,
        } => {
            if let Some(threshold) = threshold {
                config.spike.threshold = threshold;
            }
            if let Some(lookback) = lookback {
                config.spike.lookback_secs = lookback;
            }
            apply_amounts(&mut config, bet, budget);
            config.validate()?;
            monitor(&config, markets, response.parse()?, polls, mode).await
        }
        Commands::Ladder {
            market_id,
            side,
            start,
            end,
            num,
            size,
            mode,
        } => {
            config.validate()?;
            let steps = LadderPlanner::plan(side, start, end, num, size);
            place_ladder(&config, &market_id, steps, mode).await
        }
        Commands::Grid {
            market_id,
            center,
            spacing,
            levels,
            size,
            mode,
        } => {
            config.validate()?;
            let steps = LadderPlanner::plan_grid(center, spacing, levels, size);
            place_ladder(&config, &market_id, steps, mode).await
        }
        Commands::Cancel { order_id } => cancel(&config, order_id).await,
    }
}

fn apply_amounts(config: &mut Config, bet: Option<Decimal>, budget: Option<Decimal>) {
    if let Some(bet) = bet {
        config.execution.bet_usd = bet;
    }
    if let Some(budget) = budget {
        config.execution.round_budget = budget;
    }
}

fn is_dry_run(config: &Config, mode: &Mode) -> bool {
    if mode.live {
        false
    } else {
        mode.dry_run || config.scheduler.dry_run
    }
}

/// Build the venue client and the gateway orders go through
async fn connect(
    config: &Config,
    mode: &Mode,
) -> anyhow::Result<(Arc<PolymarketClient>, Arc<dyn OrderGateway>)> {
    let client = Arc::new(PolymarketClient::new(&config.polymarket)?);

    if is_dry_run(config, mode) {
        tracing::warn!("Running in DRY RUN mode - no actual trades will be executed");
        let mut paper = PaperGateway::new();
        if let Some(path) = &mode.audit {
            tracing::info!("📝 Recording dry-run orders to {}", path.display());
            paper = paper.with_audit_file(path);
        }
        let gateway: Arc<dyn OrderGateway> = Arc::new(paper);
        return Ok((client, gateway));
    }
    if mode.audit.is_some() {
        tracing::warn!("--audit only applies to dry runs, ignoring it");
    }

    client.clob.initialize().await?;
    tracing::info!("🔐 CLOB authenticated, sending live orders");
    let gateway: Arc<dyn OrderGateway> = client.clone();
    Ok((client, gateway))
}

async fn run_rounds(config: &mut Config, args: RoundArgs, once: bool) -> anyhow::Result<()> {
    if let Some(strategy) = args.strategy {
        config.scheduler.strategy = strategy;
    }
    if let Some(interval) = args.interval {
        config.scheduler.interval_minutes = interval;
    }
    if let Some(max_runs) = args.max_runs {
        config.scheduler.max_runs = Some(max_runs);
    }
    if once {
        config.scheduler.max_runs = Some(1);
    }
    apply_amounts(config, args.bet, args.budget);
    config.validate()?;

    let strategy: StrategyKind = config.scheduler.strategy.parse()?;
    let (client, gateway) = connect(config, &args.mode).await?;
    let scheduler = Scheduler::new(config, strategy, Venue::polymarket(client, gateway));

    let (handle, stop) = stop_channel();
    stop_on_ctrl_c(handle);

    let summary = scheduler.run(stop).await;
    if args.mode.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("\n{}", summary);
    }
    Ok(())
}

async fn monitor(
    config: &Config,
    markets: Vec<String>,
    response: SpikeResponse,
    polls: Option<u64>,
    mode: Mode,
) -> anyhow::Result<()> {
    let (client, gateway) = connect(config, &mode).await?;
    let controller = ExecutionController::new(gateway, client.clone(), config.execution.clone());

    let session = MonitorSession {
        response,
        bet_usd: config.execution.bet_usd,
        poll_interval: Duration::from_secs(config.spike.poll_interval_secs),
        max_polls: polls,
    };
    let mut spikes = SpikeMonitor::new(markets, config.spike.clone());
    let mut round = RoundState::new(config.execution.round_budget);

    let (handle, mut stop) = stop_channel();
    stop_on_ctrl_c(handle);

    let events = session
        .run(&mut spikes, client.as_ref(), &controller, &mut round, &mut stop)
        .await;

    if mode.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        println!("\n👀 {} spike(s) seen", events.len());
        for event in &events {
            println!("  {}", event.alert());
        }
        println!(
            "Spent ${:.2}, ${:.2} left",
            round.committed_cost(),
            round.remaining_budget
        );
    }
    Ok(())
}

async fn place_ladder(
    config: &Config,
    market_id: &str,
    steps: Vec<LadderInstruction>,
    mode: Mode,
) -> anyhow::Result<()> {
    if steps.is_empty() {
        anyhow::bail!("Ladder has no orders");
    }

    let plan = LadderPlan::new(steps);
    println!("\n🪜 {}", plan);

    let instructions: Vec<TradeInstruction> = plan
        .instructions
        .iter()
        .map(|step| TradeInstruction::from_ladder(market_id, step))
        .collect();

    let (client, gateway) = connect(config, &mode).await?;
    let controller = ExecutionController::new(gateway, client, config.execution.clone());
    let mut round = RoundState::new(config.execution.round_budget);

    let (handle, mut stop) = stop_channel();
    stop_on_ctrl_c(handle);

    let summary = controller
        .execute(&instructions, &mut round, &mut stop)
        .await?;

    if mode.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}

async fn cancel(config: &Config, order_id: Option<String>) -> anyhow::Result<()> {
    let client = PolymarketClient::new(&config.polymarket)?;
    client.clob.initialize().await?;

    match order_id {
        Some(id) => {
            client.cancel_order(&id).await?;
            println!("✅ Cancelled {}", id);
        }
        None => {
            client.cancel_all_orders().await?;
            println!("✅ Cancelled all open orders");
        }
    }
    Ok(())
}
