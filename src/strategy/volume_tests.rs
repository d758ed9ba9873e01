//! Tests for top-volume selection

#[cfg(test)]
mod tests {
    use super::super::volume::*;
    use crate::config::VolumeConfig;
    use crate::executor::RoundState;
    use crate::types::MarketSummary;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn market(id: &str, question: &str, yes_price: Decimal) -> MarketSummary {
        MarketSummary {
            market_id: id.to_string(),
            condition_id: Some(format!("0x{}", id)),
            question: question.to_string(),
            yes_price,
            volume_24h: dec!(100000),
        }
    }

    fn selector(count: usize, keywords: &[&str]) -> VolumeSelector {
        VolumeSelector::new(VolumeConfig {
            count,
            title_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_takes_first_markets_inside_band() {
        let markets = vec![
            market("1", "Fed cuts rates?", dec!(0.97)),
            market("2", "Bitcoin above 100k?", dec!(0.40)),
            market("3", "Recession in 2026?", dec!(0.05)),
            market("4", "Snow in Miami?", dec!(0.10)),
            market("5", "New pope this year?", dec!(0.50)),
        ];

        let report = selector(2, &[]).select(&markets, &RoundState::new(dec!(50)));

        let ids: Vec<_> = report.picks.iter().map(|m| m.market_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4"]);
        // Bounds are exclusive; the walk stops once two are picked
        assert_eq!(report.rejections.outside_band, 2);
        assert_eq!(report.scanned, 4);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let markets = vec![
            market("1", "Fed cuts rates?", dec!(0.5)),
            market("2", "Will ELON MUSK tweet 300 times?", dec!(0.5)),
            market("3", "Tesla deliveries beat?", dec!(0.5)),
        ];

        let report = selector(3, &["Musk", "tweet"]).select(&markets, &RoundState::new(dec!(50)));

        assert_eq!(report.picks.len(), 1);
        assert_eq!(report.picks[0].market_id, "2");
        assert_eq!(report.rejections.keyword_mismatch, 2);
    }

    #[test]
    fn test_skips_markets_used_this_round() {
        let markets = vec![
            market("1", "Lakers vs Celtics", dec!(0.5)),
            market("2", "Bulls vs Knicks", dec!(0.5)),
            market("1", "Lakers vs Celtics", dec!(0.5)),
            market("3", "Jets vs Giants", dec!(0.5)),
        ];
        let mut round = RoundState::new(dec!(50));
        // Marked by condition id only, as a whale buy would leave it
        round.mark_used("0x2");

        let report = selector(5, &[]).select(&markets, &round);

        let ids: Vec<_> = report.picks.iter().map(|m| m.market_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(report.rejections.already_used, 2);
        assert!(report.to_string().contains("2 picked"));
    }

    #[test]
    fn test_empty_listing() {
        let report = selector(3, &[]).select(&[], &RoundState::new(dec!(50)));
        assert!(report.picks.is_empty());
        assert_eq!(report.scanned, 0);
    }
}
