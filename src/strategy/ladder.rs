//! Ladder order planning
//!
//! Spreads orders evenly across a price range. Buy ladders normally run from
//! the higher price down (accumulate on dips), sell ladders from the lower
//! price up; the planner follows whatever direction it is given.

use crate::types::{fmt_cents, Side};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// One rung of a ladder
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LadderInstruction {
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
}

pub struct LadderPlanner;

impl LadderPlanner {
    /// `num_orders` prices from `start_price` to `end_price` inclusive.
    /// A single order sits at `start_price`.
    pub fn plan(
        side: Side,
        start_price: Decimal,
        end_price: Decimal,
        num_orders: usize,
        size_per_order: Decimal,
    ) -> Vec<LadderInstruction> {
        if num_orders == 0 {
            return Vec::new();
        }

        let gaps = Decimal::from(num_orders.saturating_sub(1).max(1));
        let step = (end_price - start_price) / gaps;
        let lo = start_price.min(end_price);
        let hi = start_price.max(end_price);

        (0..num_orders)
            .map(|i| {
                let price = if num_orders > 1 && i == num_orders - 1 {
                    end_price
                } else {
                    start_price + step * Decimal::from(i)
                };
                LadderInstruction {
                    price: price.clamp(lo, hi),
                    size: size_per_order,
                    side,
                }
            })
            .collect()
    }

    /// Buy ladder below `center` and sell ladder above it, `levels` rungs
    /// each, `spacing` apart. Rungs outside (0, 1) are dropped.
    pub fn plan_grid(
        center: Decimal,
        spacing: Decimal,
        levels: usize,
        size_per_order: Decimal,
    ) -> Vec<LadderInstruction> {
        if levels == 0 || spacing <= Decimal::ZERO {
            return Vec::new();
        }

        let offset = spacing * Decimal::from(levels);
        let buys = Self::plan(
            Side::Buy,
            center - spacing,
            center - offset,
            levels,
            size_per_order,
        );
        let sells = Self::plan(
            Side::Sell,
            center + spacing,
            center + offset,
            levels,
            size_per_order,
        );

        buys.into_iter()
            .chain(sells)
            .filter(|i| i.price > Decimal::ZERO && i.price < Decimal::ONE)
            .collect()
    }
}

/// Totals for a planned ladder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderPlan {
    pub instructions: Vec<LadderInstruction>,
    pub total_shares: Decimal,
    /// Sum of price x size
    pub notional: Decimal,
    /// Size-weighted average price, zero for an empty plan
    pub average_price: Decimal,
}

impl LadderPlan {
    pub fn new(instructions: Vec<LadderInstruction>) -> Self {
        let total_shares: Decimal = instructions.iter().map(|i| i.size).sum();
        let notional: Decimal = instructions.iter().map(|i| i.price * i.size).sum();
        let average_price = if total_shares.is_zero() {
            Decimal::ZERO
        } else {
            notional / total_shares
        };

        Self {
            instructions,
            total_shares,
            notional,
            average_price,
        }
    }
}

impl fmt::Display for LadderPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "🪜 {} orders, {} shares, ${:.2} total, avg {}",
            self.instructions.len(),
            self.total_shares,
            self.notional,
            fmt_cents(self.average_price)
        )?;
        for i in &self.instructions {
            writeln!(f, "   {} {} @ {}", i.side, i.size, fmt_cents(i.price))?;
        }
        Ok(())
    }
}
