//! Budgeted order execution
//!
//! Walks a list of instructions in order, resolving prices against the live
//! book, enforcing the round budget and pacing submissions. Failures are
//! recorded per instruction and never abort the pass.


use crate::client::{OrderGateway, PriceSource};
use crate::config::ExecutionConfig;
use crate::error::{BotError, Result};
use crate::scheduler::StopSignal;
use crate::strategy::ladder::LadderInstruction;
use crate::types::{fmt_cents, OrderStatusKind, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// How much an instruction trades
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Sizing {
    /// Fixed number of shares
    Shares(Decimal),
    /// Spend this many USD; shares = floor(usd / price)
    Notional(Decimal),
}

/// One order to place
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeInstruction {
    pub market_id: String,
    pub side: Side,
    /// Limit price; resolved from the book at submission time when unset
    pub price: Option<Decimal>,
    pub sizing: Sizing,
    /// Upstream identifier (e.g. the whale trade's condition id), marked
    /// used alongside `market_id` on success
    pub origin: Option<String>,
    pub label: String,
}

impl TradeInstruction {
    pub fn new(market_id: impl Into<String>, side: Side, sizing: Sizing) -> Self {
        let market_id = market_id.into();
        Self {
            label: market_id.clone(),
            market_id,
            side,
            price: None,
            sizing,
            origin: None,
        }
    }

    /// Market buy for a USD amount
    pub fn buy_notional(market_id: impl Into<String>, usd: Decimal) -> Self {
        Self::new(market_id, Side::Buy, Sizing::Notional(usd))
    }

    pub fn from_ladder(market_id: impl Into<String>, step: &LadderInstruction) -> Self {
        Self::new(market_id, step.side, Sizing::Shares(step.size)).with_price(step.price)
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Most a buy can commit, when known before price discovery
    fn cost_bound(&self) -> Option<Decimal> {
        match (self.sizing, self.price) {
            (Sizing::Notional(usd), _) => Some(usd),
            (Sizing::Shares(shares), Some(price)) => Some(shares * price),
            (Sizing::Shares(_), None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Filled,
    Live,
    Rejected,
    Error,
}

impl ExecutionStatus {
    pub fn is_committed(&self) -> bool {
        matches!(self, ExecutionStatus::Filled | ExecutionStatus::Live)
    }
}

impl From<OrderStatusKind> for ExecutionStatus {
    fn from(kind: OrderStatusKind) -> Self {
        match kind {
            OrderStatusKind::Matched => ExecutionStatus::Filled,
            OrderStatusKind::Live => ExecutionStatus::Live,
            OrderStatusKind::Rejected => ExecutionStatus::Rejected,
            OrderStatusKind::Error => ExecutionStatus::Error,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Filled => write!(f, "FILLED"),
            ExecutionStatus::Live => write!(f, "LIVE"),
            ExecutionStatus::Rejected => write!(f, "REJECTED"),
            ExecutionStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of one instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub instruction: TradeInstruction,
    pub status: ExecutionStatus,
    /// Price the order was sent at, if it got that far
    pub price: Option<Decimal>,
    pub shares: Decimal,
    /// Cost for buys, proceeds for sells; zero unless committed
    pub cost_or_proceeds: Decimal,
    pub order_id: Option<String>,
    pub error_detail: Option<String>,
}

impl ExecutionResult {
    fn rejected(instruction: &TradeInstruction, price: Option<Decimal>, detail: &str) -> Self {
        Self {
            instruction: instruction.clone(),
            status: ExecutionStatus::Rejected,
            price,
            shares: Decimal::ZERO,
            cost_or_proceeds: Decimal::ZERO,
            order_id: None,
            error_detail: Some(detail.to_string()),
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = &self.instruction;
        write!(f, "{} {} {}", self.status, i.side, i.label)?;
        if let Some(price) = self.price {
            write!(f, " {} @ {}", self.shares, fmt_cents(price))?;
        }
        if self.status.is_committed() {
            write!(f, " = ${:.2}", self.cost_or_proceeds)?;
        }
        if let Some(detail) = &self.error_detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// State owned by one round: budget, markets already traded, results
#[derive(Debug, Clone)]
pub struct RoundState {
    pub remaining_budget: Decimal,
    selected: HashSet<String>,
    pub results: Vec<ExecutionResult>,
}

impl RoundState {
    pub fn new(budget: Decimal) -> Self {
        Self {
            remaining_budget: budget,
            selected: HashSet::new(),
            results: Vec::new(),
        }
    }

    pub fn is_used(&self, market_id: &str) -> bool {
        self.selected.contains(market_id)
    }

    pub fn mark_used(&mut self, market_id: impl Into<String>) {
        self.selected.insert(market_id.into());
    }

    /// Sum of committed buy costs
    pub fn committed_cost(&self) -> Decimal {
        self.results
            .iter()
            .filter(|r| r.status.is_committed() && r.instruction.side == Side::Buy)
            .map(|r| r.cost_or_proceeds)
            .sum()
    }
}

/// Aggregate of one execution pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionSummary {
    /// Orders accepted by the venue (FILLED or LIVE)
    pub count_submitted: usize,
    /// Orders sent to the venue, accepted or not
    pub attempted: usize,
    pub rejected: usize,
    pub errors: usize,
    pub total_cost: Decimal,
    pub total_proceeds: Decimal,
    pub stopped_out_of_funds: bool,
    pub stopped_by_signal: bool,
    /// Instructions never attempted
    pub remaining: usize,
    pub remaining_budget: Decimal,
    pub results: Vec<ExecutionResult>,
}

impl ExecutionSummary {
    /// Fold in a later pass over the same round
    pub fn absorb(&mut self, later: ExecutionSummary) {
        self.count_submitted += later.count_submitted;
        self.attempted += later.attempted;
        self.rejected += later.rejected;
        self.errors += later.errors;
        self.total_cost += later.total_cost;
        self.total_proceeds += later.total_proceeds;
        self.stopped_out_of_funds |= later.stopped_out_of_funds;
        self.stopped_by_signal |= later.stopped_by_signal;
        self.remaining += later.remaining;
        self.remaining_budget = later.remaining_budget;
        self.results.extend(later.results);
    }
}

impl fmt::Display for ExecutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "📊 {} submitted, {} rejected, {} errors | spent ${:.2}, proceeds ${:.2}, budget left ${:.2}",
            self.count_submitted,
            self.rejected,
            self.errors,
            self.total_cost,
            self.total_proceeds,
            self.remaining_budget
        )?;
        if self.stopped_out_of_funds {
            writeln!(f, "   ⚠️ Out of funds, {} instruction(s) not executed", self.remaining)?;
        } else if self.stopped_by_signal {
            writeln!(f, "   ⏹️ Stopped, {} instruction(s) not executed", self.remaining)?;
        }
        for result in &self.results {
            writeln!(f, "   {}", result)?;
        }
        Ok(())
    }
}

/// Executes instruction lists against the venue
pub struct ExecutionController {
    gateway: Arc<dyn OrderGateway>,
    prices: Arc<dyn PriceSource>,
    config: ExecutionConfig,
}

impl ExecutionController {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        prices: Arc<dyn PriceSource>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            gateway,
            prices,
            config,
        }
    }

    /// Execute `instructions` in order against `round`'s budget.
    ///
    /// Stops early when the budget cannot cover the next buy or when `stop`
    /// fires; in-flight submissions always complete first.
    pub async fn execute(
        &self,
        instructions: &[TradeInstruction],
        round: &mut RoundState,
        stop: &mut StopSignal,
    ) -> Result<ExecutionSummary> {
        if instructions.is_empty() {
            return Err(BotError::EmptyInstructions);
        }

        let mut summary = ExecutionSummary::default();

        for (idx, instruction) in instructions.iter().enumerate() {
            let left = instructions.len() - idx;

            if stop.is_stopped() {
                info!("⏹️ Stop requested, {} instruction(s) left", left);
                summary.stopped_by_signal = true;
                summary.remaining = left;
                break;
            }

            if instruction.side == Side::Buy {
                if let Some(bound) = instruction.cost_bound() {
                    if round.remaining_budget < bound {
                        warn!(
                            "💸 Budget ${:.2} below ${:.2} for {}, stopping",
                            round.remaining_budget, bound, instruction.label
                        );
                        summary.stopped_out_of_funds = true;
                        summary.remaining = left;
                        break;
                    }
                }
            }

            let result = match self.prepare(instruction).await {
                Err(rejected) => rejected,
                Ok((price, shares)) => {
                    let cost = price * shares;
                    if instruction.side == Side::Buy && round.remaining_budget < cost {
                        warn!(
                            "💸 Budget ${:.2} below ${:.2} for {}, stopping",
                            round.remaining_budget, cost, instruction.label
                        );
                        summary.stopped_out_of_funds = true;
                        summary.remaining = left;
                        break;
                    }

                    summary.attempted += 1;
                    self.submit(instruction, price, shares).await
                }
            };

            match result.status {
                ExecutionStatus::Filled | ExecutionStatus::Live => {
                    summary.count_submitted += 1;
                    match instruction.side {
                        Side::Buy => {
                            round.remaining_budget -= result.cost_or_proceeds;
                            summary.total_cost += result.cost_or_proceeds;
                        }
                        Side::Sell => {
                            round.remaining_budget += result.cost_or_proceeds;
                            summary.total_proceeds += result.cost_or_proceeds;
                        }
                    }
                    round.mark_used(instruction.market_id.clone());
                    if let Some(origin) = &instruction.origin {
                        round.mark_used(origin.clone());
                    }
                }
                ExecutionStatus::Rejected => summary.rejected += 1,
                ExecutionStatus::Error => summary.errors += 1,
            }

            round.results.push(result.clone());
            summary.results.push(result);

            if idx + 1 < instructions.len() {
                self.pause(stop).await;
            }
        }

        summary.remaining_budget = round.remaining_budget;
        info!(
            "Execution done: {}/{} accepted, ${:.2} spent",
            summary.count_submitted,
            instructions.len(),
            summary.total_cost
        );
        Ok(summary)
    }

    /// Wait out the delay between orders, cut short by a stop
    pub async fn pause(&self, stop: &mut StopSignal) {
        let delay = Duration::from_millis(self.config.order_delay_ms);
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.stopped() => {}
        }
    }

    /// Resolve price and share count, or a REJECTED result
    async fn prepare(
        &self,
        instruction: &TradeInstruction,
    ) -> std::result::Result<(Decimal, Decimal), ExecutionResult> {
        let price = match instruction.price {
            Some(price) => price,
            None => {
                let book = self.prices.get_best_prices(&instruction.market_id).await;
                if book.is_unavailable() {
                    warn!("No book for {}", instruction.market_id);
                    return Err(ExecutionResult::rejected(instruction, None, "price unavailable"));
                }
                book.touch(instruction.side)
            }
        };
        let price = match self.prices.tick_decimals(&instruction.market_id).await {
            Some(decimals) => price.round_dp(decimals),
            None => price,
        };

        if price <= self.config.min_price || price >= self.config.max_price {
            return Err(ExecutionResult::rejected(
                instruction,
                Some(price),
                "price out of range",
            ));
        }

        let shares = match instruction.sizing {
            Sizing::Shares(shares) if shares > Decimal::ZERO => shares,
            Sizing::Shares(_) => {
                return Err(ExecutionResult::rejected(instruction, Some(price), "invalid size"))
            }
            Sizing::Notional(usd) => {
                let shares = (usd / price).floor();
                if shares < Decimal::ONE {
                    return Err(ExecutionResult::rejected(
                        instruction,
                        Some(price),
                        "budget too small",
                    ));
                }
                shares
            }
        };

        Ok((price, shares))
    }

    async fn submit(
        &self,
        instruction: &TradeInstruction,
        price: Decimal,
        shares: Decimal,
    ) -> ExecutionResult {
        let mut result = ExecutionResult {
            instruction: instruction.clone(),
            status: ExecutionStatus::Error,
            price: Some(price),
            shares,
            cost_or_proceeds: Decimal::ZERO,
            order_id: None,
            error_detail: None,
        };

        match self
            .gateway
            .place_order(&instruction.market_id, instruction.side, price, shares)
            .await
        {
            Ok(ack) => {
                result.status = ack.status.into();
                result.order_id = ack.order_id;
                result.error_detail = ack.message;
                if result.status.is_committed() {
                    result.cost_or_proceeds = price * shares;
                    info!(
                        "✅ {} {} {} @ {} = ${:.2}",
                        instruction.side,
                        shares,
                        instruction.label,
                        fmt_cents(price),
                        result.cost_or_proceeds
                    );
                } else {
                    warn!(
                        "❌ {} {} not accepted: {}",
                        instruction.side,
                        instruction.label,
                        result.error_detail.as_deref().unwrap_or("no reason given")
                    );
                }
            }
            Err(e) => {
                error!("❌ Order on {} failed: {}", instruction.market_id, e);
                result.error_detail = Some(e.to_string());
            }
        }

        result
    }
}
