//! Round scheduling
//!
//! Runs a strategy every `interval_minutes`, one round at a time. Each round
//! gets a fresh [`RoundState`] shared by its steps: a top-volume pass buys
//! listed markets, then a whale pass fetches trades, selects whales and buys
//! their markets, skipping anything the round already traded.

#[cfg(test)]
mod tests;

use crate::client::{
    MarketListing, MarketResolver, OrderGateway, PolymarketClient, PriceSource, TradeFeed,
    TraderProfileSource,
};
use crate::config::Config;
use crate::error::Result;
use crate::executor::{ExecutionController, ExecutionSummary, RoundState, TradeInstruction};
use crate::strategy::{
    plan_volume_round, plan_whale_round, SelectionReport, SpikeEvent, SpikeMonitor,
    SpikeResponse, StrategyKind, VolumeReport, VolumeSelector, WhaleSelector,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Requests a stop
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Observed between instructions and between rounds
#[derive(Clone)]
pub struct StopSignal {
    rx: Option<watch::Receiver<bool>>,
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx: Arc::new(tx) }, StopSignal { rx: Some(rx) })
}

impl StopSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_stopped(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Handle dropped without stopping
                return std::future::pending().await;
            }
        }
    }
}

/// Stop on Ctrl+C
pub fn stop_on_ctrl_c(handle: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ Ctrl+C received, stopping after the current order");
            handle.stop();
        }
    });
}

/// The venue as seen by the scheduler
#[derive(Clone)]
pub struct Venue {
    pub listing: Arc<dyn MarketListing>,
    pub feed: Arc<dyn TradeFeed>,
    pub profiles: Arc<dyn TraderProfileSource>,
    pub resolver: Arc<dyn MarketResolver>,
    pub prices: Arc<dyn PriceSource>,
    pub gateway: Arc<dyn OrderGateway>,
}

impl Venue {
    /// Polymarket for data, `gateway` for orders (live client or dry run)
    pub fn polymarket(client: Arc<PolymarketClient>, gateway: Arc<dyn OrderGateway>) -> Self {
        Self {
            listing: client.clone(),
            feed: client.clone(),
            profiles: client.clone(),
            resolver: client.clone(),
            prices: client,
            gateway,
        }
    }
}

/// Outcome of one round
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub run: u32,
    pub strategy: String,
    /// Set when the strategy has a top-volume step
    pub volume: Option<VolumeReport>,
    /// Set when the strategy has a whale step
    pub selection: Option<SelectionReport>,
    /// Titles of candidates with no resolvable market
    pub unresolved: Vec<String>,
    /// All execution passes of the round; None when nothing was executed
    pub execution: Option<ExecutionSummary>,
}

impl RoundReport {
    fn new(run: u32, strategy: StrategyKind) -> Self {
        Self {
            run,
            strategy: strategy.to_string(),
            volume: None,
            selection: None,
            unresolved: Vec::new(),
            execution: None,
        }
    }

    fn record(&mut self, summary: ExecutionSummary) {
        match &mut self.execution {
            Some(total) => total.absorb(summary),
            None => self.execution = Some(summary),
        }
    }

    pub fn trades(&self) -> usize {
        self.execution.as_ref().map_or(0, |e| e.count_submitted)
    }

    pub fn spent(&self) -> Decimal {
        self.execution
            .as_ref()
            .map_or(Decimal::ZERO, |e| e.total_cost)
    }
}

impl fmt::Display for RoundReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} [{}]", self.run, self.strategy)?;
        if let Some(volume) = &self.volume {
            writeln!(f, "   📊 {}", volume)?;
        }
        if let Some(selection) = &self.selection {
            writeln!(f, "   🐋 {}", selection)?;
        }
        for title in &self.unresolved {
            writeln!(f, "   ✗ Could not find market: {}", title)?;
        }
        match &self.execution {
            Some(summary) => write!(f, "{}", summary),
            None => writeln!(f, "   No trades this round"),
        }
    }
}

/// Totals across all rounds
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub runs: u32,
    pub failed_rounds: u32,
    pub trades: usize,
    pub spent: Decimal,
    pub reports: Vec<RoundReport>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🏁 {} run(s), {} trade(s), ${:.2} spent",
            self.runs, self.trades, self.spent
        )?;
        if self.failed_rounds > 0 {
            write!(f, ", {} round(s) failed", self.failed_rounds)?;
        }
        Ok(())
    }
}

pub struct Scheduler {
    strategy: StrategyKind,
    volume: VolumeSelector,
    selector: WhaleSelector,
    venue: Venue,
    controller: ExecutionController,
    round_budget: Decimal,
    bet_usd: Decimal,
    interval: Duration,
    max_runs: Option<u32>,
    fetch_limit: usize,
}

impl Scheduler {
    pub fn new(config: &Config, strategy: StrategyKind, venue: Venue) -> Self {
        let whale = strategy.whale_config(&config.whale);
        let fetch_limit = whale.trade_fetch_limit;
        let controller = ExecutionController::new(
            venue.gateway.clone(),
            venue.prices.clone(),
            config.execution.clone(),
        );

        Self {
            strategy,
            volume: VolumeSelector::new(strategy.volume_config(&config.volume)),
            selector: WhaleSelector::new(whale),
            venue,
            controller,
            round_budget: config.execution.round_budget,
            bet_usd: config.execution.bet_usd,
            interval: Duration::from_secs(config.scheduler.interval_minutes * 60),
            max_runs: config.scheduler.max_runs,
            fetch_limit,
        }
    }

    /// Run one round with a fresh state. Every step shares the round's
    /// budget and its set of traded markets.
    pub async fn run_round(&self, run: u32, stop: &mut StopSignal) -> Result<RoundReport> {
        let mut round = RoundState::new(self.round_budget);
        let mut report = RoundReport::new(run, self.strategy);

        if self.strategy.uses_volume() {
            self.volume_step(&mut round, &mut report, stop).await?;
        }

        if self.strategy.uses_whales() && !stop.is_stopped() {
            if report.execution.is_some() {
                self.controller.pause(stop).await;
            }
            self.whale_step(&mut round, &mut report, stop).await?;
        }

        Ok(report)
    }

    async fn volume_step(
        &self,
        round: &mut RoundState,
        report: &mut RoundReport,
        stop: &mut StopSignal,
    ) -> Result<()> {
        let markets = match self
            .venue
            .listing
            .fetch_top_volume(self.volume.listing_limit())
            .await
        {
            Ok(markets) => markets,
            Err(e) => {
                warn!("Market listing unavailable: {}", e);
                Vec::new()
            }
        };

        let picks = self.volume.select(&markets, round);
        let instructions = plan_volume_round(&picks.picks, self.bet_usd);
        report.volume = Some(picks);

        if instructions.is_empty() {
            info!("No volume markets this round");
            return Ok(());
        }

        let summary = self.controller.execute(&instructions, round, stop).await?;
        report.record(summary);
        Ok(())
    }

    async fn whale_step(
        &self,
        round: &mut RoundState,
        report: &mut RoundReport,
        stop: &mut StopSignal,
    ) -> Result<()> {
        let trades = match self.venue.feed.fetch_recent_trades(self.fetch_limit).await {
            Ok(trades) => trades,
            Err(e) => {
                warn!("Trade feed unavailable: {}", e);
                Vec::new()
            }
        };

        let mut selection = self
            .selector
            .select(&trades, round, self.venue.profiles.as_ref())
            .await;

        // Buys made earlier in the round count against the whale allowance
        let allowance = self
            .selector
            .config()
            .max_candidates
            .saturating_sub(report.trades());
        if selection.candidates.len() > allowance {
            selection.truncated += selection.candidates.len() - allowance;
            selection.candidates.truncate(allowance);
        }

        if selection.candidates.is_empty() {
            info!("No whales found this round");
            report.selection = Some(selection);
            return Ok(());
        }

        let plan = plan_whale_round(
            &selection.candidates,
            self.venue.resolver.as_ref(),
            self.bet_usd,
        )
        .await;
        report.selection = Some(selection);
        report.unresolved = plan.unresolved.iter().map(|c| c.title.clone()).collect();

        if plan.instructions.is_empty() {
            info!("No candidate market could be resolved");
            return Ok(());
        }

        let summary = self
            .controller
            .execute(&plan.instructions, round, stop)
            .await?;
        report.record(summary);
        Ok(())
    }

    /// Run rounds until `max_runs` or a stop
    pub async fn run(&self, mut stop: StopSignal) -> RunSummary {
        info!(
            "🕐 SCHEDULER: {} every {}min, ${} per bet, ${} per round",
            self.strategy,
            self.interval.as_secs() / 60,
            self.bet_usd,
            self.round_budget
        );
        if let Some(max) = self.max_runs {
            info!("   Will stop after {} runs", max);
        }

        let mut totals = RunSummary::default();

        loop {
            if stop.is_stopped() {
                break;
            }

            totals.runs += 1;
            info!("━━━ RUN {} ━━━", totals.runs);

            match self.run_round(totals.runs, &mut stop).await {
                Ok(report) => {
                    info!("{}", report);
                    totals.trades += report.trades();
                    totals.spent += report.spent();
                    totals.reports.push(report);
                }
                Err(e) => {
                    if e.is_round_fatal() {
                        error!("Round {} skipped: {}", totals.runs, e);
                    } else {
                        warn!("Round {} failed, retrying next interval: {}", totals.runs, e);
                    }
                    totals.failed_rounds += 1;
                }
            }

            if self.max_runs.is_some_and(|max| totals.runs >= max) {
                info!("Completed {} runs, stopping", totals.runs);
                break;
            }

            info!("💤 Next run in {} min", self.interval.as_secs() / 60);
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop.stopped() => break,
            }
        }

        info!("{}", totals);
        totals
    }
}

/// Poll markets for spikes and optionally trade them
pub struct MonitorSession {
    pub response: SpikeResponse,
    pub bet_usd: Decimal,
    pub poll_interval: Duration,
    /// Stop after this many polls; run until stopped when unset
    pub max_polls: Option<u64>,
}

impl MonitorSession {
    /// Returns every spike seen. Buys share `round`'s budget, and each
    /// market is bought at most once per session.
    pub async fn run(
        &self,
        monitor: &mut SpikeMonitor,
        prices: &dyn PriceSource,
        controller: &ExecutionController,
        round: &mut RoundState,
        stop: &mut StopSignal,
    ) -> Vec<SpikeEvent> {
        info!(
            "👀 Monitoring {} market(s) every {}s",
            monitor.market_ids().count(),
            self.poll_interval.as_secs()
        );

        let mut seen = Vec::new();
        let mut polls = 0u64;

        while !stop.is_stopped() {
            let events = monitor.poll(prices).await;
            polls += 1;

            // One pass per poll so spikes seen together are still paced
            let mut batch: Vec<TradeInstruction> = Vec::new();
            for event in events {
                if let Some(instruction) = self.response.instruction(&event, self.bet_usd) {
                    if round.is_used(&instruction.market_id) {
                        info!("Already traded {} this session", instruction.market_id);
                    } else if !batch.iter().any(|i| i.market_id == instruction.market_id) {
                        batch.push(instruction);
                    }
                }
                seen.push(event);
            }

            if !batch.is_empty() {
                match controller.execute(&batch, round, stop).await {
                    Ok(summary) => info!("{}", summary),
                    Err(e) => error!("Spike response failed: {}", e),
                }
            }

            if self.max_polls.is_some_and(|max| polls >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = stop.stopped() => break,
            }
        }

        seen
    }
}
