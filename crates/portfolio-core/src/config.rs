use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::{PortfolioError, PortfolioResult};

/// How each asset's price series is rebased before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Every asset is divided by its own first observed price. An asset that
    /// enters the table late starts at 1.0 on its own first date.
    #[default]
    PerAsset,
    /// Rows before the first date on which every asset has a price are
    /// dropped and all assets are divided by their price on that date.
    CommonStart,
}

impl FromStr for NormalizationMode {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_asset" | "per-asset" => Ok(NormalizationMode::PerAsset),
            "common_start" | "common-start" => Ok(NormalizationMode::CommonStart),
            other => Err(PortfolioError::InvalidInput(format!(
                "unknown normalization mode '{}', expected per_asset or common_start",
                other
            ))),
        }
    }
}

/// Risk term in the denominator of the Sharpe-optimal objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMeasure {
    /// Semi standard deviation of portfolio returns below their mean.
    #[default]
    SemiDeviation,
    /// Full standard deviation, i.e. classic mean-variance.
    StdDev,
}

impl FromStr for RiskMeasure {
    type Err = PortfolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semi_deviation" | "semideviation" | "msv" => Ok(RiskMeasure::SemiDeviation),
            "std_dev" | "stddev" | "mv" => Ok(RiskMeasure::StdDev),
            other => Err(PortfolioError::InvalidInput(format!(
                "unknown risk measure '{}', expected semi_deviation or std_dev",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub risk_measure: RiskMeasure,
    pub max_iterations: usize,
    /// Squared step length below which the search is considered converged.
    pub tolerance: f64,
    pub learning_rate: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_measure: RiskMeasure::SemiDeviation,
            max_iterations: 10_000,
            tolerance: 1e-14,
            learning_rate: 0.1,
        }
    }
}

/// Parameters threaded into every metric and weighting call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Annual risk-free rate used by the Sharpe and Sortino metrics.
    pub risk_free_rate: f64,
    /// Trailing return observations used by inverse-volatility weighting.
    pub lookback_days: usize,
    pub trading_days_per_year: f64,
    /// Trailing observations per rolling Sharpe point.
    pub rolling_window: usize,
    /// Annual risk-free rate inside the Sharpe-optimal weighting objective.
    /// Deliberately separate from `risk_free_rate`.
    pub optimizer_risk_free_rate: f64,
    pub normalization: NormalizationMode,
    pub optimizer: OptimizerConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.03,
            lookback_days: 60,
            trading_days_per_year: 252.0,
            rolling_window: 60,
            optimizer_risk_free_rate: 0.0,
            normalization: NormalizationMode::PerAsset,
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Read overrides from the environment; unset variables keep defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            risk_free_rate: env_or("RISK_FREE_RATE", defaults.risk_free_rate)?,
            lookback_days: env_or("LOOKBACK_DAYS", defaults.lookback_days)?,
            trading_days_per_year: env_or(
                "TRADING_DAYS_PER_YEAR",
                defaults.trading_days_per_year,
            )?,
            rolling_window: env_or("ROLLING_WINDOW", defaults.rolling_window)?,
            optimizer_risk_free_rate: env_or(
                "OPTIMIZER_RISK_FREE_RATE",
                defaults.optimizer_risk_free_rate,
            )?,
            normalization: env_or("NORMALIZATION", defaults.normalization)?,
            optimizer: OptimizerConfig {
                risk_measure: env_or("OPTIMIZER_RISK_MEASURE", defaults.optimizer.risk_measure)?,
                max_iterations: env_or(
                    "OPTIMIZER_MAX_ITERATIONS",
                    defaults.optimizer.max_iterations,
                )?,
                tolerance: env_or("OPTIMIZER_TOLERANCE", defaults.optimizer.tolerance)?,
                learning_rate: env_or(
                    "OPTIMIZER_LEARNING_RATE",
                    defaults.optimizer.learning_rate,
                )?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PortfolioResult<()> {
        if !self.risk_free_rate.is_finite() || !self.optimizer_risk_free_rate.is_finite() {
            return Err(PortfolioError::InvalidInput(
                "risk-free rates must be finite".to_string(),
            ));
        }
        if !(self.trading_days_per_year.is_finite() && self.trading_days_per_year > 0.0) {
            return Err(PortfolioError::InvalidInput(format!(
                "trading_days_per_year must be positive, got {}",
                self.trading_days_per_year
            )));
        }
        if self.lookback_days < 2 {
            return Err(PortfolioError::InvalidInput(format!(
                "lookback_days must be at least 2, got {}",
                self.lookback_days
            )));
        }
        if self.rolling_window < 2 {
            return Err(PortfolioError::InvalidInput(format!(
                "rolling_window must be at least 2, got {}",
                self.rolling_window
            )));
        }
        let opt = &self.optimizer;
        if opt.max_iterations == 0
            || !(opt.tolerance.is_finite() && opt.tolerance > 0.0)
            || !(opt.learning_rate.is_finite() && opt.learning_rate > 0.0)
        {
            return Err(PortfolioError::InvalidInput(
                "optimizer needs max_iterations > 0 and positive tolerance and learning_rate"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Daily-equivalent of `risk_free_rate`.
    pub fn daily_risk_free(&self) -> f64 {
        self.risk_free_rate / self.trading_days_per_year
    }

    pub fn annualization_factor(&self) -> f64 {
        self.trading_days_per_year.sqrt()
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lookback_days, 60);
        assert_eq!(config.trading_days_per_year, 252.0);
        assert_eq!(config.optimizer_risk_free_rate, 0.0);
        assert!((config.daily_risk_free() - 0.03 / 252.0).abs() < 1e-15);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AnalyticsConfig::default();
        config.trading_days_per_year = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalyticsConfig::default();
        config.lookback_days = 1;
        assert!(config.validate().is_err());

        let mut config = AnalyticsConfig::default();
        config.risk_free_rate = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            "common_start".parse::<NormalizationMode>().unwrap(),
            NormalizationMode::CommonStart
        );
        assert_eq!("MSV".parse::<RiskMeasure>().unwrap(), RiskMeasure::SemiDeviation);
        assert!("median".parse::<NormalizationMode>().is_err());
    }
}
