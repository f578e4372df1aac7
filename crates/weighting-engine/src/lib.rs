//! Portfolio weighting policies.
//!
//! Every policy returns one non-negative weight per requested ticker, in the
//! requested order, summing to 1.

pub mod inverse_vol;
pub mod optimizer;
pub mod policy;

pub use inverse_vol::inverse_volatility_weights;
pub use optimizer::{sharpe_optimal_weights, SharpeOptimizer};
pub use policy::WeightingPolicy;

use portfolio_core::{AnalyticsConfig, PortfolioError, PortfolioResult, PriceTable, WeightVector};
use tracing::info;

/// Derive weights for `tickers` under `policy`.
///
/// `prices` may be `None` only for [`WeightingPolicy::Equal`].
pub fn derive_weights(
    policy: WeightingPolicy,
    tickers: &[String],
    prices: Option<&PriceTable>,
    config: &AnalyticsConfig,
) -> PortfolioResult<WeightVector> {
    if tickers.is_empty() {
        return Err(PortfolioError::InvalidInput(
            "cannot weight an empty ticker list".to_string(),
        ));
    }

    let weights = match (policy, prices) {
        (WeightingPolicy::Equal, prices) => {
            if let Some(missing) = prices.and_then(|p| tickers.iter().find(|t| !p.contains_ticker(t))) {
                return Err(PortfolioError::InvalidInput(format!(
                    "ticker {} is not in the price table",
                    missing
                )));
            }
            equal_weights(tickers)?
        }
        (WeightingPolicy::InverseVolatility, Some(prices)) => {
            inverse_volatility_weights(tickers, prices, config)?
        }
        (WeightingPolicy::SharpeOptimal, Some(prices)) => {
            sharpe_optimal_weights(tickers, prices, config)?
        }
        (policy, None) => {
            return Err(PortfolioError::InvalidInput(format!(
                "{} weighting requires price history",
                policy
            )))
        }
    };

    info!(
        policy = %policy,
        assets = weights.len(),
        "derived portfolio weights"
    );
    Ok(weights)
}

/// 1/N for each ticker.
pub fn equal_weights(tickers: &[String]) -> PortfolioResult<WeightVector> {
    if tickers.is_empty() {
        return Err(PortfolioError::InvalidInput(
            "cannot weight an empty ticker list".to_string(),
        ));
    }
    let w = 1.0 / tickers.len() as f64;
    WeightVector::from_pairs(tickers.iter().map(|t| (t.clone(), w)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_equal_weights() {
        let w = derive_weights(
            WeightingPolicy::Equal,
            &tickers(&["A", "B", "C", "D"]),
            None,
            &AnalyticsConfig::default(),
        )
        .unwrap();
        assert_eq!(w.values(), vec![0.25; 4]);
        assert_relative_eq!(w.sum(), 1.0);
    }

    #[test]
    fn test_equal_weights_reject_duplicates() {
        assert!(equal_weights(&tickers(&["A", "A"])).is_err());
    }

    #[test]
    fn test_empty_ticker_list() {
        let err = derive_weights(WeightingPolicy::Equal, &[], None, &AnalyticsConfig::default())
            .unwrap_err();
        assert!(matches!(err, PortfolioError::InvalidInput(_)));
    }

    #[test]
    fn test_price_policies_need_prices() {
        for policy in [WeightingPolicy::InverseVolatility, WeightingPolicy::SharpeOptimal] {
            let err = derive_weights(policy, &tickers(&["A"]), None, &AnalyticsConfig::default())
                .unwrap_err();
            assert!(matches!(err, PortfolioError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_equal_rejects_ticker_without_prices() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let prices = PriceTable::from_observations(vec![
            (start, "A", 10.0),
            (start + chrono::Duration::days(1), "A", 11.0),
        ])
        .unwrap();
        let err = derive_weights(
            WeightingPolicy::Equal,
            &tickers(&["A", "ZZZ"]),
            Some(&prices),
            &AnalyticsConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PortfolioError::InvalidInput(ref msg) if msg.contains("ZZZ")));

        let w = derive_weights(
            WeightingPolicy::Equal,
            &tickers(&["A"]),
            Some(&prices),
            &AnalyticsConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(w.get("A").unwrap(), 1.0);
    }

    #[test]
    fn test_dispatch_inverse_vol() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let a = [100.0, 102.0, 99.0, 103.0, 101.0];
        let b = [50.0, 50.5, 50.2, 50.6, 50.4];
        let mut obs = Vec::new();
        for (i, (pa, pb)) in a.iter().zip(&b).enumerate() {
            let date = start + chrono::Duration::days(i as i64);
            obs.push((date, "A", *pa));
            obs.push((date, "B", *pb));
        }
        let prices = PriceTable::from_observations(obs).unwrap();
        let w = derive_weights(
            WeightingPolicy::InverseVolatility,
            &tickers(&["A", "B"]),
            Some(&prices),
            &AnalyticsConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-12);
        assert!(w.get("B").unwrap() > w.get("A").unwrap());
    }
}
