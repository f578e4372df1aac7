use performance_metrics::{cumulative_return, daily_returns};
use portfolio_core::{AnalyticsConfig, PortfolioError, PortfolioResult, PriceTable, ValueSeries};
use serde::Serialize;
use statrs::statistics::Statistics;

/// Fewer aligned points than this and no comparison is produced.
const MIN_ALIGNED_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkComparison {
    pub benchmark_symbol: String,
    pub portfolio_return: f64,
    pub benchmark_return: f64,
    pub excess_return: f64,
    /// OLS slope of portfolio daily returns on benchmark daily returns; NaN
    /// when the benchmark did not move.
    pub beta: f64,
    /// Annualized standard deviation of daily return differences.
    pub tracking_error: f64,
    pub aligned_points: usize,
}

pub struct BenchmarkComparer;

impl BenchmarkComparer {
    /// The benchmark's prices divided by its first observed price, restricted
    /// to the dates of `portfolio`. `None` when the ticker is not in the table.
    pub fn normalized_benchmark(
        prices: &PriceTable,
        symbol: &str,
        portfolio: &ValueSeries,
    ) -> PortfolioResult<Option<ValueSeries>> {
        let column = match prices.column(symbol) {
            Some(c) if !c.is_empty() => c,
            _ => return Ok(None),
        };
        let (first_date, base) = column[0];
        if base == 0.0 {
            return Err(PortfolioError::DivideByZero(format!(
                "benchmark {} has a zero first price on {}",
                symbol, first_date
            )));
        }
        let normalized = ValueSeries::from_pairs(column.into_iter().map(|(d, p)| (d, p / base)))?;
        Ok(Some(normalized.aligned_to(portfolio)))
    }

    /// Compare a portfolio value series against a benchmark over their
    /// common dates.
    pub fn compare(
        portfolio: &ValueSeries,
        benchmark: &ValueSeries,
        symbol: &str,
        config: &AnalyticsConfig,
    ) -> PortfolioResult<Option<BenchmarkComparison>> {
        let port = portfolio.aligned_to(benchmark);
        let bench = benchmark.aligned_to(portfolio);
        if port.len() < MIN_ALIGNED_POINTS {
            return Ok(None);
        }

        let portfolio_return = cumulative_return(&port)?;
        let benchmark_return = cumulative_return(&bench)?;

        let pr = daily_returns(&port)?.values();
        let br = daily_returns(&bench)?.values();

        Ok(Some(BenchmarkComparison {
            benchmark_symbol: symbol.to_string(),
            portfolio_return,
            benchmark_return,
            excess_return: portfolio_return - benchmark_return,
            beta: ols_beta(&pr, &br),
            tracking_error: tracking_error(&pr, &br) * config.annualization_factor(),
            aligned_points: port.len(),
        }))
    }
}

fn ols_beta(y: &[f64], x: &[f64]) -> f64 {
    let var_x = x.iter().variance();
    if !(var_x > 1e-15) {
        return f64::NAN;
    }
    x.iter().covariance(y.iter()) / var_x
}

/// Daily (not annualized) standard deviation of `p - b`.
fn tracking_error(portfolio: &[f64], benchmark: &[f64]) -> f64 {
    portfolio
        .iter()
        .zip(benchmark)
        .map(|(p, b)| p - b)
        .collect::<Vec<f64>>()
        .std_dev()
}
