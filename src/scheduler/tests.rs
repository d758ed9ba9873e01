//! Tests for round scheduling and spike monitoring

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::strategy::SpikeDirection;
    use crate::testing::{
        listed, trade, EchoResolver, FixedBook, FixedFeed, FixedListing, FixedProfiles,
        ScriptedGateway,
    };
    use crate::types::{BestPrices, MarketPrice, Side, TradeRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, VecDeque};

    fn config() -> Config {
        let mut config = Config::default();
        config.whale.min_usd = dec!(1000);
        config.whale.only_profitable = false;
        config.execution.round_budget = dec!(15);
        config.execution.bet_usd = dec!(5);
        config.execution.order_delay_ms = 0;
        config.scheduler.interval_minutes = 1;
        config
    }

    fn whale_trades() -> Vec<TradeRecord> {
        vec![
            trade("0xa", Side::Buy, dec!(0.5), dec!(20000), "t1"),
            trade("0xb", Side::Buy, dec!(0.5), dec!(16000), "t2"),
            trade("0xc", Side::Buy, dec!(0.5), dec!(12000), "t3"),
            trade("0xd", Side::Buy, dec!(0.5), dec!(8000), "t4"),
        ]
    }

    fn venue(feed: FixedFeed, gateway: Arc<ScriptedGateway>) -> Venue {
        venue_with_listing(FixedListing::default(), feed, gateway)
    }

    fn venue_with_listing(
        listing: FixedListing,
        feed: FixedFeed,
        gateway: Arc<ScriptedGateway>,
    ) -> Venue {
        let book = FixedBook::new()
            .with("m-0xa", dec!(0.49), dec!(0.5))
            .with("m-0xb", dec!(0.49), dec!(0.5))
            .with("m-0xc", dec!(0.49), dec!(0.5))
            .with("m-0xd", dec!(0.49), dec!(0.5));
        Venue {
            listing: Arc::new(listing),
            feed: Arc::new(feed),
            profiles: Arc::new(FixedProfiles::new()),
            resolver: Arc::new(EchoResolver),
            prices: Arc::new(book),
            gateway,
        }
    }

    #[tokio::test]
    async fn test_stop_channel() {
        let (handle, mut signal) = stop_channel();
        let copy = signal.clone();
        assert!(!signal.is_stopped());

        handle.stop();
        assert!(signal.is_stopped());
        assert!(copy.is_stopped());
        signal.stopped().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_and_dropped_handle_stay_pending() {
        let mut never = StopSignal::never();
        assert!(!never.is_stopped());
        let waited = tokio::time::timeout(Duration::from_secs(5), never.stopped()).await;
        assert!(waited.is_err());

        let (handle, mut signal) = stop_channel();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_secs(5), signal.stopped()).await;
        assert!(waited.is_err());
        assert!(!signal.is_stopped());
    }

    #[tokio::test]
    async fn test_round_spends_budget_on_top_whales() {
        let gateway = Arc::new(ScriptedGateway::new());
        let scheduler = Scheduler::new(
            &config(),
            StrategyKind::Whale,
            venue(FixedFeed::new(whale_trades()), gateway.clone()),
        );

        let report = scheduler
            .run_round(1, &mut StopSignal::never())
            .await
            .unwrap();

        assert!(report.volume.is_none());
        assert_eq!(report.selection.as_ref().unwrap().candidates.len(), 4);
        assert_eq!(report.trades(), 3);
        assert_eq!(report.spent(), dec!(15));

        let summary = report.execution.as_ref().unwrap();
        assert!(summary.stopped_out_of_funds);
        assert_eq!(summary.remaining, 1);
        assert_eq!(summary.remaining_budget, dec!(0));

        let markets: Vec<_> = gateway.placed().into_iter().map(|o| o.market_id).collect();
        assert_eq!(markets, vec!["m-0xa", "m-0xb", "m-0xc"]);
        assert!(report.to_string().contains("Run 1 [whale]"));
    }

    #[tokio::test]
    async fn test_feed_failure_is_an_empty_round() {
        let gateway = Arc::new(ScriptedGateway::new());
        let scheduler = Scheduler::new(
            &config(),
            StrategyKind::Whale,
            venue(FixedFeed::failing(), gateway.clone()),
        );

        let report = scheduler
            .run_round(1, &mut StopSignal::never())
            .await
            .unwrap();

        assert_eq!(report.selection.as_ref().unwrap().scanned, 0);
        assert!(report.execution.is_none());
        assert_eq!(report.trades(), 0);
        assert!(gateway.placed().is_empty());
    }

    #[tokio::test]
    async fn test_sport_whale_filters_titles() {
        let gateway = Arc::new(ScriptedGateway::new());
        let mut trades = whale_trades();
        trades[2].title = "NBA: Celtics vs Lakers".to_string();

        let scheduler = Scheduler::new(
            &config(),
            StrategyKind::SportWhale,
            venue(FixedFeed::new(trades), gateway.clone()),
        );
        let report = scheduler
            .run_round(1, &mut StopSignal::never())
            .await
            .unwrap();

        assert_eq!(report.trades(), 1);
        assert_eq!(gateway.placed()[0].market_id, "m-0xc");
    }

    #[tokio::test]
    async fn test_volume_round_buys_listed_markets_in_band() {
        let gateway = Arc::new(ScriptedGateway::new());
        let listing = FixedListing::new(vec![
            listed("m-0xa", "0xa", "Fed cuts rates?", dec!(0.5)),
            listed("m-0xb", "0xb", "Recession in 2026?", dec!(0.97)),
            listed("m-0xc", "0xc", "Bitcoin above 100k?", dec!(0.5)),
            listed("m-0xd", "0xd", "New pope this year?", dec!(0.5)),
        ]);
        let scheduler = Scheduler::new(
            &config(),
            StrategyKind::Volume,
            venue_with_listing(listing, FixedFeed::failing(), gateway.clone()),
        );

        let report = scheduler
            .run_round(1, &mut StopSignal::never())
            .await
            .unwrap();

        assert!(report.selection.is_none());
        let volume = report.volume.as_ref().unwrap();
        assert_eq!(volume.picks.len(), 3);
        assert_eq!(volume.rejections.outside_band, 1);

        let markets: Vec<_> = gateway.placed().into_iter().map(|o| o.market_id).collect();
        assert_eq!(markets, vec!["m-0xa", "m-0xc", "m-0xd"]);
        assert_eq!(report.spent(), dec!(15));
        assert!(report.to_string().contains("Run 1 [volume]"));
    }

    #[tokio::test]
    async fn test_sport_whale_skips_market_bought_by_volume_step() {
        let mut config = config();
        config.whale.max_candidates = 2;
        let gateway = Arc::new(ScriptedGateway::new());

        let listing = FixedListing::new(vec![
            listed("m-0xb", "0xb", "Will it rain in Paris?", dec!(0.5)),
            listed("m-0xa", "0xa", "NBA: Lakers vs Celtics", dec!(0.5)),
        ]);
        let mut trades = whale_trades();
        trades[0].title = "NBA: Lakers vs Celtics".to_string();
        trades[2].title = "NHL: Bruins vs Rangers".to_string();
        trades[3].title = "UFC 300 main event".to_string();

        let scheduler = Scheduler::new(
            &config,
            StrategyKind::SportWhale,
            venue_with_listing(listing, FixedFeed::new(trades), gateway.clone()),
        );
        let report = scheduler
            .run_round(1, &mut StopSignal::never())
            .await
            .unwrap();

        // Volume step takes the top sports market; the whale on the same
        // condition id is then skipped as already used
        let volume = report.volume.as_ref().unwrap();
        assert_eq!(volume.picks[0].market_id, "m-0xa");
        let selection = report.selection.as_ref().unwrap();
        assert_eq!(selection.rejections.already_used, 1);

        // Two buys per round in total, so one whale slot is left
        assert_eq!(selection.candidates.len(), 1);
        assert_eq!(selection.truncated, 1);

        let markets: Vec<_> = gateway.placed().into_iter().map(|o| o.market_id).collect();
        assert_eq!(markets, vec!["m-0xa", "m-0xc"]);
        assert_eq!(report.trades(), 2);
        assert_eq!(report.spent(), dec!(10));
        assert_eq!(report.execution.as_ref().unwrap().remaining_budget, dec!(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_run_gets_a_fresh_budget() {
        let mut config = config();
        config.scheduler.max_runs = Some(2);
        let gateway = Arc::new(ScriptedGateway::new());
        let scheduler = Scheduler::new(
            &config,
            StrategyKind::Whale,
            venue(FixedFeed::new(whale_trades()), gateway.clone()),
        );

        let started = tokio::time::Instant::now();
        let totals = scheduler.run(StopSignal::never()).await;

        assert_eq!(totals.runs, 2);
        assert_eq!(totals.trades, 6);
        assert_eq!(totals.spent, dec!(30));
        assert_eq!(totals.reports.len(), 2);
        assert_eq!(gateway.placed().len(), 6);
        // One interval between the two runs, none after the last
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_the_interval() {
        let gateway = Arc::new(ScriptedGateway::new());
        let scheduler = Scheduler::new(
            &config(),
            StrategyKind::Whale,
            venue(FixedFeed::new(whale_trades()), gateway.clone()),
        );

        let (handle, signal) = stop_channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            handle.stop();
        });

        let totals = scheduler.run(signal).await;
        assert_eq!(totals.runs, 2);
        assert!(totals.to_string().contains("2 run(s), 6 trade(s), $30.00 spent"));
    }

    #[tokio::test]
    async fn test_stopped_before_start() {
        let gateway = Arc::new(ScriptedGateway::new());
        let scheduler = Scheduler::new(
            &config(),
            StrategyKind::Whale,
            venue(FixedFeed::new(whale_trades()), gateway.clone()),
        );

        let (handle, signal) = stop_channel();
        handle.stop();
        let totals = scheduler.run(signal).await;
        assert_eq!(totals.runs, 0);
        assert!(gateway.placed().is_empty());
    }

    /// Serves each market the queued books in order, then repeats the last one
    struct SteppingBook {
        template: Vec<BestPrices>,
        books: Mutex<HashMap<String, VecDeque<BestPrices>>>,
    }

    impl SteppingBook {
        fn new(books: &[(Decimal, Decimal)]) -> Self {
            Self {
                template: books
                    .iter()
                    .map(|&(bid, ask)| BestPrices::new(bid, ask))
                    .collect(),
                books: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl PriceSource for SteppingBook {
        async fn get_best_prices(&self, market_id: &str) -> BestPrices {
            let mut books = self.books.lock();
            let queue = books
                .entry(market_id.to_string())
                .or_insert_with(|| self.template.iter().copied().collect());
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_else(BestPrices::unavailable)
            } else {
                queue.front().copied().unwrap_or_else(BestPrices::unavailable)
            }
        }

        async fn get_price(&self, market_id: &str) -> MarketPrice {
            let yes = self.get_best_prices(market_id).await.midpoint();
            MarketPrice {
                yes,
                no: Decimal::ONE - yes,
            }
        }
    }

    fn spike_config() -> crate::config::SpikeConfig {
        crate::config::SpikeConfig {
            lookback_secs: 600,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_momentum_session_buys_the_spike() {
        let book = Arc::new(SteppingBook::new(&[
            (dec!(0.49), dec!(0.51)),
            (dec!(0.59), dec!(0.61)),
        ]));
        let gateway = Arc::new(ScriptedGateway::new());
        let controller = ExecutionController::new(gateway.clone(), book.clone(), config().execution);

        let session = MonitorSession {
            response: SpikeResponse::Momentum,
            bet_usd: dec!(5),
            poll_interval: Duration::from_secs(1),
            max_polls: Some(2),
        };
        let mut monitor = SpikeMonitor::new(["512"], spike_config());
        let mut round = RoundState::new(dec!(50));

        let events = session
            .run(
                &mut monitor,
                book.as_ref(),
                &controller,
                &mut round,
                &mut StopSignal::never(),
            )
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, SpikeDirection::Up);
        assert_eq!(events[0].old_price, dec!(0.50));
        assert_eq!(events[0].new_price, dec!(0.60));

        let placed = gateway.placed();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].market_id, "512");
        assert_eq!(placed[0].price, dec!(0.61));
        assert_eq!(placed[0].size, dec!(8));
        assert_eq!(round.remaining_budget, dec!(50) - dec!(4.88));
        assert!(round.is_used("512"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_session_never_trades() {
        let book = Arc::new(SteppingBook::new(&[
            (dec!(0.59), dec!(0.61)),
            (dec!(0.39), dec!(0.41)),
        ]));
        let gateway = Arc::new(ScriptedGateway::new());
        let controller = ExecutionController::new(gateway.clone(), book.clone(), config().execution);

        let session = MonitorSession {
            response: SpikeResponse::Alert,
            bet_usd: dec!(5),
            poll_interval: Duration::from_secs(1),
            max_polls: Some(3),
        };
        let mut monitor = SpikeMonitor::new(["512"], spike_config());
        let mut round = RoundState::new(dec!(50));

        let events = session
            .run(
                &mut monitor,
                book.as_ref(),
                &controller,
                &mut round,
                &mut StopSignal::never(),
            )
            .await;

        // The third poll sits in the cooldown after the first alert
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, SpikeDirection::Down);
        assert!(gateway.placed().is_empty());
        assert_eq!(round.remaining_budget, dec!(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spikes_in_one_poll_are_paced() {
        let book = Arc::new(SteppingBook::new(&[
            (dec!(0.49), dec!(0.51)),
            (dec!(0.59), dec!(0.61)),
        ]));
        let gateway = Arc::new(ScriptedGateway::new());
        let mut execution = config().execution;
        execution.order_delay_ms = 500;
        let controller = ExecutionController::new(gateway.clone(), book.clone(), execution);

        let session = MonitorSession {
            response: SpikeResponse::Momentum,
            bet_usd: dec!(5),
            poll_interval: Duration::from_secs(1),
            max_polls: Some(2),
        };
        let mut monitor = SpikeMonitor::new(["512", "513"], spike_config());
        let mut round = RoundState::new(dec!(50));

        let events = session
            .run(
                &mut monitor,
                book.as_ref(),
                &controller,
                &mut round,
                &mut StopSignal::never(),
            )
            .await;

        assert_eq!(events.len(), 2);
        let placed = gateway.placed();
        assert_eq!(placed.len(), 2);
        assert!(placed[1].at - placed[0].at >= Duration::from_millis(500));
        assert!(round.is_used("512"));
        assert!(round.is_used("513"));
    }
}
