use portfolio_core::{
    AnalyticsConfig, PortfolioError, PortfolioResult, ReturnSeries, SeriesPoint,
};
use statrs::statistics::Statistics;
use tracing::debug;

use crate::ZERO_VARIANCE_EPSILON;

/// Sample standard deviation of daily returns scaled by sqrt(trading days).
/// NaN when fewer than two returns exist.
pub fn annualized_volatility(returns: &ReturnSeries, config: &AnalyticsConfig) -> f64 {
    let values = returns.values();
    values.iter().std_dev() * config.annualization_factor()
}

/// Annualized Sharpe ratio of daily excess returns.
///
/// Returns NaN, never ±inf, when the excess returns have zero (or undefined)
/// standard deviation, e.g. a constant-return series.
pub fn sharpe_ratio(returns: &ReturnSeries, config: &AnalyticsConfig) -> f64 {
    let excess = excess_returns(&returns.values(), config);
    annualized_sharpe(&excess, config)
}

/// Annualized Sortino ratio: mean excess return over the sample standard
/// deviation of the negative excess returns only.
///
/// NaN when fewer than two negative excess returns exist or they do not vary.
pub fn sortino_ratio(returns: &ReturnSeries, config: &AnalyticsConfig) -> f64 {
    let excess = excess_returns(&returns.values(), config);
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();

    let downside_dev = downside.iter().std_dev();
    if !downside_dev.is_finite() || downside_dev < ZERO_VARIANCE_EPSILON {
        debug!(
            negative_periods = downside.len(),
            "downside deviation undefined, sortino ratio is NaN"
        );
        return f64::NAN;
    }

    excess.iter().mean() / downside_dev * config.annualization_factor()
}

/// Sharpe ratio over a trailing window, one point per input date.
/// The first `window - 1` points are NaN.
pub fn rolling_sharpe(
    returns: &ReturnSeries,
    window: usize,
    config: &AnalyticsConfig,
) -> PortfolioResult<ReturnSeries> {
    if window < 2 {
        return Err(PortfolioError::InvalidInput(format!(
            "rolling window must be at least 2, got {}",
            window
        )));
    }

    let excess = excess_returns(&returns.values(), config);
    let points = returns
        .iter()
        .enumerate()
        .map(|(i, p)| SeriesPoint {
            date: p.date,
            value: if i + 1 < window {
                f64::NAN
            } else {
                annualized_sharpe(&excess[i + 1 - window..=i], config)
            },
        })
        .collect();

    ReturnSeries::new(points)
}

fn excess_returns(returns: &[f64], config: &AnalyticsConfig) -> Vec<f64> {
    let rf_daily = config.daily_risk_free();
    returns.iter().map(|r| r - rf_daily).collect()
}

fn annualized_sharpe(excess: &[f64], config: &AnalyticsConfig) -> f64 {
    let std_dev = excess.iter().std_dev();
    if !std_dev.is_finite() || std_dev < ZERO_VARIANCE_EPSILON {
        debug!(
            observations = excess.len(),
            "excess returns have no variance, sharpe ratio is NaN"
        );
        return f64::NAN;
    }
    excess.iter().mean() / std_dev * config.annualization_factor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn returns(values: &[f64]) -> ReturnSeries {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        ReturnSeries::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v)),
        )
        .unwrap()
    }

    #[test]
    fn test_volatility_annualizes_sample_std() {
        let config = AnalyticsConfig::default();
        let r = returns(&[0.01, -0.01, 0.01, -0.01]);
        // sample std of +-0.01 alternating over 4 points = 0.01 * sqrt(4/3)
        let expected = 0.01 * (4.0f64 / 3.0).sqrt() * 252f64.sqrt();
        assert_relative_eq!(annualized_volatility(&r, &config), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_volatility_single_point_is_nan() {
        let config = AnalyticsConfig::default();
        assert!(annualized_volatility(&returns(&[0.02]), &config).is_nan());
    }

    #[test]
    fn test_sharpe_matches_formula() {
        let config = AnalyticsConfig::default();
        let raw = [0.01, 0.02, -0.01, 0.015, 0.005, -0.005, 0.01, 0.02, -0.01, 0.015];
        let rf = 0.03 / 252.0;
        let excess: Vec<f64> = raw.iter().map(|r| r - rf).collect();
        let n = excess.len() as f64;
        let mean = excess.iter().sum::<f64>() / n;
        let var = excess.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let expected = mean / var.sqrt() * 252f64.sqrt();
        assert_relative_eq!(sharpe_ratio(&returns(&raw), &config), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_sharpe_constant_returns_is_nan() {
        let config = AnalyticsConfig::default();
        assert!(sharpe_ratio(&returns(&[0.0, 0.0, 0.0]), &config).is_nan());
        assert!(sharpe_ratio(&returns(&[0.1, 0.1]), &config).is_nan());
        assert!(sharpe_ratio(&returns(&[]), &config).is_nan());
    }

    #[test]
    fn test_sortino_without_downside_is_nan() {
        let config = AnalyticsConfig::default();
        assert!(sortino_ratio(&returns(&[0.01, 0.02, 0.03]), &config).is_nan());
    }

    #[test]
    fn test_sortino_uses_negative_excess_only() {
        let config = AnalyticsConfig {
            risk_free_rate: 0.0,
            ..AnalyticsConfig::default()
        };
        let raw = [0.03, -0.01, 0.02, -0.03];
        let mean = raw.iter().sum::<f64>() / 4.0;
        // sample std of [-0.01, -0.03] = sqrt(0.0002) = 0.0141421...
        let downside_dev = 0.0002f64.sqrt();
        let expected = mean / downside_dev * 252f64.sqrt();
        assert_relative_eq!(sortino_ratio(&returns(&raw), &config), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_rolling_sharpe_leading_nans() {
        let config = AnalyticsConfig::default();
        let raw: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.01 } else { -0.005 }).collect();
        let r = returns(&raw);
        let rolling = rolling_sharpe(&r, 4, &config).unwrap();
        assert_eq!(rolling.len(), r.len());
        let values = rolling.values();
        assert!(values[..3].iter().all(|v| v.is_nan()));
        assert!(values[3..].iter().all(|v| v.is_finite()));

        let tail = returns(&raw[6..10]);
        assert_relative_eq!(values[9], sharpe_ratio(&tail, &config), epsilon = 1e-12);
    }

    #[test]
    fn test_rolling_sharpe_rejects_tiny_window() {
        let config = AnalyticsConfig::default();
        assert!(rolling_sharpe(&returns(&[0.01, 0.02]), 1, &config).is_err());
    }
}
