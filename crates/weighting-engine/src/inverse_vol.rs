use portfolio_core::{AnalyticsConfig, PortfolioError, PortfolioResult, PriceTable, WeightVector};
use statrs::statistics::Statistics;

/// Volatilities below this are treated as exactly zero.
const ZERO_VOLATILITY_EPSILON: f64 = 1e-12;

/// Weights proportional to 1 / sample std of daily returns over the trailing
/// `config.lookback_days` return observations, normalized to sum to 1.
pub fn inverse_volatility_weights(
    tickers: &[String],
    prices: &PriceTable,
    config: &AnalyticsConfig,
) -> PortfolioResult<WeightVector> {
    let returns = prices
        .select(tickers)?
        .returns()?
        .tail(config.lookback_days);

    if returns.len() < 2 {
        return Err(PortfolioError::InsufficientData(format!(
            "inverse volatility needs at least 2 aligned return observations, got {}",
            returns.len()
        )));
    }

    let inverse_vols = tickers
        .iter()
        .enumerate()
        .map(|(i, ticker)| {
            let vol = returns.column(i).iter().std_dev();
            if vol < ZERO_VOLATILITY_EPSILON {
                return Err(PortfolioError::DivideByZero(format!(
                    "{} has zero volatility over the last {} observations",
                    ticker,
                    returns.len()
                )));
            }
            Ok(1.0 / vol)
        })
        .collect::<PortfolioResult<Vec<f64>>>()?;

    let total: f64 = inverse_vols.iter().sum();
    WeightVector::from_pairs(
        tickers
            .iter()
            .cloned()
            .zip(inverse_vols.into_iter().map(|iv| iv / total)),
    )
}
