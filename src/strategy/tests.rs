//! Tests for strategy selection and round planning

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::Result;
    use crate::executor::Sizing;
    use crate::testing::EchoResolver;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn candidate(market_id: &str, slug: Option<&str>) -> WhaleCandidate {
        WhaleCandidate {
            market_id: market_id.to_string(),
            slug: slug.map(str::to_string),
            title: "Will the Celtics beat the Lakers on Friday night in Boston?".to_string(),
            usd_value: dec!(9000),
            price: dec!(0.6),
            size: dec!(15000),
            trader_address: "0xwhale".to_string(),
            trader_name: "whale".to_string(),
            trader_profit: Some(dec!(1200)),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("whale".parse::<StrategyKind>().unwrap(), StrategyKind::Whale);
        assert_eq!(
            "Sport-Whale".parse::<StrategyKind>().unwrap(),
            StrategyKind::SportWhale
        );

        assert_eq!("elon".parse::<StrategyKind>().unwrap(), StrategyKind::Elon);
        assert_eq!(" Volume ".parse::<StrategyKind>().unwrap(), StrategyKind::Volume);
        assert_eq!("sport".parse::<StrategyKind>().unwrap(), StrategyKind::Sport);

        let err = "crypto".parse::<StrategyKind>().unwrap_err();
        assert!(matches!(err, BotError::UnknownStrategy(ref s) if s == "crypto"));
        assert!(err.is_round_fatal());
    }

    #[test]
    fn test_strategy_steps() {
        assert!(StrategyKind::Whale.uses_whales());
        assert!(!StrategyKind::Whale.uses_volume());
        assert!(StrategyKind::SportWhale.uses_whales());
        assert!(StrategyKind::SportWhale.uses_volume());
        for kind in [StrategyKind::Volume, StrategyKind::Sport, StrategyKind::Elon] {
            assert!(kind.uses_volume());
            assert!(!kind.uses_whales());
        }
    }

    #[test]
    fn test_volume_config_keywords_and_count() {
        let base = VolumeConfig::default();
        assert!(StrategyKind::Volume.volume_config(&base).title_keywords.is_empty());
        assert_eq!(
            StrategyKind::Elon.volume_config(&base).title_keywords,
            vec!["elon", "musk", "tweet"]
        );

        let sport = StrategyKind::Sport.volume_config(&base);
        assert!(sport.title_keywords.iter().any(|k| k == "nba"));
        assert_eq!(sport.count, base.count);

        // Sport whale buys only the single top sports market
        let hunt = StrategyKind::SportWhale.volume_config(&base);
        assert_eq!(hunt.count, 1);
        assert_eq!(hunt.title_keywords, sport.title_keywords);
    }

    #[test]
    fn test_plan_volume_round_carries_condition_id() {
        let picks = vec![
            MarketSummary {
                market_id: "512".into(),
                condition_id: Some("0xcond".into()),
                question: "Will the Celtics beat the Lakers on Friday night in Boston?".into(),
                yes_price: dec!(0.55),
                volume_24h: dec!(250000),
            },
            MarketSummary {
                market_id: "513".into(),
                condition_id: None,
                question: "Rain in NYC?".into(),
                yes_price: dec!(0.3),
                volume_24h: dec!(1000),
            },
        ];

        let instructions = plan_volume_round(&picks, dec!(5));
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].market_id, "512");
        assert_eq!(instructions[0].origin.as_deref(), Some("0xcond"));
        assert_eq!(instructions[0].sizing, Sizing::Notional(dec!(5)));
        assert_eq!(instructions[0].label.chars().count(), 45);
        assert_eq!(instructions[1].origin, None);
        assert_eq!(instructions[1].label, "Rain in NYC?");
    }

    #[test]
    fn test_sport_whale_uses_sports_keywords() {
        let base = WhaleConfig::default();
        let sport = StrategyKind::SportWhale.whale_config(&base);
        assert!(sport.title_keywords.iter().any(|k| k == "nba"));

        let plain = StrategyKind::Whale.whale_config(&base);
        assert!(plain.title_keywords.is_empty());

        // Configured keywords win
        let mut custom = base.clone();
        custom.title_keywords = vec!["tennis".into()];
        assert_eq!(
            StrategyKind::SportWhale.whale_config(&custom).title_keywords,
            vec!["tennis".to_string()]
        );
    }

    fn spike(direction: SpikeDirection) -> SpikeEvent {
        SpikeEvent {
            market_id: "512".into(),
            old_price: dec!(0.5),
            new_price: dec!(0.6),
            change_fraction: dec!(0.2),
            direction,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_spike_responses() {
        let up = spike(SpikeDirection::Up);
        let down = spike(SpikeDirection::Down);

        assert!(SpikeResponse::Alert.instruction(&up, dec!(5)).is_none());

        let buy = SpikeResponse::Momentum.instruction(&up, dec!(5)).unwrap();
        assert_eq!(buy.market_id, "512");
        assert_eq!(buy.sizing, Sizing::Notional(dec!(5)));
        assert!(buy.price.is_none());
        assert!(SpikeResponse::Momentum.instruction(&down, dec!(5)).is_none());

        assert!(SpikeResponse::MeanReversion.instruction(&down, dec!(5)).is_some());
        assert!(SpikeResponse::MeanReversion.instruction(&up, dec!(5)).is_none());

        assert_eq!(
            "mean-reversion".parse::<SpikeResponse>().unwrap(),
            SpikeResponse::MeanReversion
        );
        assert!("yolo".parse::<SpikeResponse>().is_err());
    }

    #[tokio::test]
    async fn test_plan_whale_round() {
        let candidates = vec![candidate("0xa", None), candidate("0xb", Some("celtics"))];
        let plan = plan_whale_round(&candidates, &EchoResolver, dec!(5)).await;

        assert_eq!(plan.instructions.len(), 2);
        let first = &plan.instructions[0];
        assert_eq!(first.market_id, "m-0xa");
        assert_eq!(first.origin.as_deref(), Some("0xa"));
        assert_eq!(first.sizing, Sizing::Notional(dec!(5)));
        assert_eq!(first.label.chars().count(), 45);
        assert!(plan.unresolved.is_empty());
    }

    struct NothingResolver;

    #[async_trait]
    impl MarketResolver for NothingResolver {
        async fn fetch_market_by_slug(&self, _slug: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn fetch_market_by_condition(&self, _condition_id: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_unresolved_candidates_reported() {
        let candidates = vec![candidate("0xa", Some("gone"))];
        let plan = plan_whale_round(&candidates, &NothingResolver, dec!(5)).await;
        assert!(plan.instructions.is_empty());
        assert_eq!(plan.unresolved.len(), 1);
    }
}
