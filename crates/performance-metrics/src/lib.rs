//! Return, risk and risk-adjusted statistics over a portfolio value series.
//!
//! Everything here is a pure function. Degenerate-but-valid inputs (zero
//! variance, no downside periods, too few points for a standard deviation)
//! yield NaN; malformed inputs (zero denominators in growth math, empty
//! series) yield a [`PortfolioError`](portfolio_core::PortfolioError).

pub mod correlation;
pub mod drawdown;
pub mod ratios;
pub mod returns;

pub use correlation::{correlation_matrix, CorrelationMatrix};
pub use drawdown::{drawdown_series, max_drawdown};
pub use ratios::{annualized_volatility, rolling_sharpe, sharpe_ratio, sortino_ratio};
pub use returns::{cagr, cumulative_return, daily_returns, DAYS_PER_YEAR};

use portfolio_core::{AnalyticsConfig, MetricsReport, PortfolioResult, ValueSeries};

/// Standard deviations below this are treated as exactly zero.
pub(crate) const ZERO_VARIANCE_EPSILON: f64 = 1e-12;

/// Compute the full headline metric set for a value series.
pub fn compute_metrics(values: &ValueSeries, config: &AnalyticsConfig) -> PortfolioResult<MetricsReport> {
    let daily = daily_returns(values)?;

    Ok(MetricsReport {
        cumulative_return: cumulative_return(values)?,
        annual_volatility: annualized_volatility(&daily, config),
        sharpe_ratio: sharpe_ratio(&daily, config),
        sortino_ratio: sortino_ratio(&daily, config),
        max_drawdown: max_drawdown(values)?,
        cagr: cagr(values)?,
    })
}
