//! Polymarket Auto Trader
//!
//! Signal detection and budgeted order execution for Polymarket.
//!
//! ## Architecture
//!
//! ```text
//! Gamma listing ──────→ VolumeSelector ─→ plan_volume_round ─┐
//! Data API (trades) ──→ WhaleSelector ──→ plan_whale_round ──┤
//! CLOB book (prices) ─→ SpikeMonitor ──→ SpikeResponse ──────┼─→ ExecutionController ─→ OrderGateway
//!                        LadderPlanner ──────────────────────┘          (CLOB or paper)
//!                                  ↑
//!                      Scheduler (rounds, budget, stop)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod paper;
pub mod scheduler;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod testing;
