use nalgebra::{DMatrix, DVector};
use portfolio_core::{
    AnalyticsConfig, OptimizerConfig, PortfolioError, PortfolioResult, PriceTable, ReturnsTable,
    RiskMeasure, WeightVector,
};
use tracing::debug;

/// Smallest / largest covariance eigenvalue below which the matrix is
/// treated as singular.
const MIN_EIGEN_RATIO: f64 = 1e-10;
const LEARNING_RATE_DECAY: f64 = 0.995;

/// Long-only weights maximizing mean excess return over portfolio risk,
/// estimated from the full daily return history in `prices`.
///
/// The risk-free rate inside the objective is
/// `config.optimizer_risk_free_rate`, independent of the rate the Sharpe
/// metric uses.
pub fn sharpe_optimal_weights(
    tickers: &[String],
    prices: &PriceTable,
    config: &AnalyticsConfig,
) -> PortfolioResult<WeightVector> {
    let returns = prices.select(tickers)?.returns()?;
    let rf_daily = config.optimizer_risk_free_rate / config.trading_days_per_year;
    let weights = SharpeOptimizer::new(&config.optimizer, rf_daily).optimize(&returns)?;
    WeightVector::from_pairs(tickers.iter().cloned().zip(weights))
}

/// Projected gradient ascent on the Sharpe objective over the unit simplex.
pub struct SharpeOptimizer<'a> {
    config: &'a OptimizerConfig,
    rf_daily: f64,
}

struct Moments {
    mean: DVector<f64>,
    centered: DMatrix<f64>,
    covariance: DMatrix<f64>,
}

impl<'a> SharpeOptimizer<'a> {
    pub fn new(config: &'a OptimizerConfig, rf_daily: f64) -> Self {
        Self { config, rf_daily }
    }

    pub fn optimize(&self, returns: &ReturnsTable) -> PortfolioResult<Vec<f64>> {
        let n = returns.tickers().len();
        let t = returns.len();

        if n == 0 {
            return Err(PortfolioError::InvalidInput(
                "cannot optimize an empty asset list".to_string(),
            ));
        }
        if t < 2 {
            return Err(PortfolioError::InsufficientData(format!(
                "optimizer needs at least 2 return observations, got {}",
                t
            )));
        }
        if t < n {
            return Err(PortfolioError::Optimization(format!(
                "covariance is singular: {} observations for {} assets",
                t, n
            )));
        }

        let moments = Self::moments(returns);
        ensure_non_singular(&moments.covariance)?;

        if n == 1 {
            return Ok(vec![1.0]);
        }

        let excess = moments.mean.map(|m| m - self.rf_daily);
        if excess.iter().all(|e| *e <= 0.0) {
            return Err(PortfolioError::Optimization(
                "no asset has a positive expected excess return".to_string(),
            ));
        }

        let mut w = DVector::from_element(n, 1.0 / n as f64);
        let mut lr = self.config.learning_rate;

        for iteration in 0..self.config.max_iterations {
            let (risk, risk_grad) = self.risk(&moments, &w);
            if !risk.is_finite() || risk <= 0.0 {
                return Err(PortfolioError::Optimization(format!(
                    "portfolio risk degenerated to {} at iteration {}",
                    risk, iteration
                )));
            }

            let numerator = excess.dot(&w);
            let grad = (&excess * risk - risk_grad * numerator) / (risk * risk);
            if grad.iter().any(|g| !g.is_finite()) {
                return Err(PortfolioError::Optimization(format!(
                    "non-finite gradient at iteration {}",
                    iteration
                )));
            }

            let candidate = &w + grad * lr;
            let projected = DVector::from_vec(project_simplex(candidate.as_slice()));
            let step = (&projected - &w).norm_squared();
            w = projected;

            if step < self.config.tolerance {
                debug!(iterations = iteration + 1, "sharpe optimizer converged");
                return Ok(w.iter().copied().collect());
            }
            lr *= LEARNING_RATE_DECAY;
        }

        Err(PortfolioError::Optimization(format!(
            "sharpe optimizer did not converge within {} iterations",
            self.config.max_iterations
        )))
    }

    fn moments(returns: &ReturnsTable) -> Moments {
        let rows = returns.rows();
        let (t, n) = (rows.len(), returns.tickers().len());

        let mean = DVector::from_fn(n, |j, _| rows.iter().map(|r| r[j]).sum::<f64>() / t as f64);
        let centered = DMatrix::from_fn(t, n, |i, j| rows[i][j] - mean[j]);
        let covariance = centered.tr_mul(&centered) / (t as f64 - 1.0);

        Moments {
            mean,
            centered,
            covariance,
        }
    }

    /// Portfolio risk under the configured measure and its gradient in `w`.
    fn risk(&self, moments: &Moments, w: &DVector<f64>) -> (f64, DVector<f64>) {
        let dof = moments.centered.nrows() as f64 - 1.0;
        match self.config.risk_measure {
            RiskMeasure::StdDev => {
                let sigma_w = &moments.covariance * w;
                let risk = w.dot(&sigma_w).sqrt();
                (risk, sigma_w / risk)
            }
            RiskMeasure::SemiDeviation => {
                let shortfall = (&moments.centered * w).map(|x| x.min(0.0));
                let risk = (shortfall.norm_squared() / dof).sqrt();
                let grad = moments.centered.tr_mul(&shortfall) / (dof * risk);
                (risk, grad)
            }
        }
    }
}

fn ensure_non_singular(covariance: &DMatrix<f64>) -> PortfolioResult<()> {
    let eigenvalues = covariance.clone().symmetric_eigen().eigenvalues;
    let largest = eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let smallest = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);

    if !(largest.is_finite() && largest > 0.0) || smallest <= largest * MIN_EIGEN_RATIO {
        return Err(PortfolioError::Optimization(format!(
            "covariance matrix is singular (eigenvalues in [{:e}, {:e}])",
            smallest, largest
        )));
    }
    Ok(())
}

/// Euclidean projection onto { w : w >= 0, sum(w) = 1 }.
fn project_simplex(v: &[f64]) -> Vec<f64> {
    let mut u = v.to_vec();
    u.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumulative = 0.0;
    let mut rho = 0usize;
    for (i, ui) in u.iter().enumerate() {
        cumulative += ui;
        if ui - (cumulative - 1.0) / (i as f64 + 1.0) > 0.0 {
            rho = i + 1;
        }
    }

    if rho == 0 {
        return vec![1.0 / v.len() as f64; v.len()];
    }

    let theta = (u[..rho].iter().sum::<f64>() - 1.0) / rho as f64;
    v.iter().map(|x| (x - theta).max(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn prices_from_returns(columns: &[(&str, Vec<f64>)]) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut obs = Vec::new();
        for (ticker, returns) in columns {
            let mut price = 100.0;
            obs.push((start, ticker.to_string(), price));
            for (i, r) in returns.iter().enumerate() {
                price *= 1.0 + r;
                obs.push((start + Duration::days(i as i64 + 1), ticker.to_string(), price));
            }
        }
        PriceTable::from_observations(obs).unwrap()
    }

    fn wave(len: usize, drift: f64, amp: f64, freq: f64, phase: f64) -> Vec<f64> {
        (0..len)
            .map(|t| drift + amp * (t as f64 * freq + phase).sin())
            .collect()
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn semi_sharpe(returns: &ReturnsTable, w: &[f64]) -> f64 {
        let port: Vec<f64> = returns
            .rows()
            .iter()
            .map(|r| r.iter().zip(w).map(|(a, b)| a * b).sum())
            .collect();
        let n = port.len() as f64;
        let mean = port.iter().sum::<f64>() / n;
        let semi = (port.iter().map(|p| (p - mean).min(0.0).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        mean / semi
    }

    #[test]
    fn test_weights_are_long_only_and_sum_to_one() {
        let prices = prices_from_returns(&[
            ("A", wave(120, 0.0015, 0.010, 0.7, 0.0)),
            ("B", wave(120, 0.0005, 0.012, 1.3, 1.0)),
            ("C", wave(120, 0.0010, 0.008, 0.4, 2.0)),
        ]);
        let w = sharpe_optimal_weights(&tickers(&["A", "B", "C"]), &prices, &AnalyticsConfig::default())
            .unwrap();
        assert_eq!(w.tickers(), tickers(&["A", "B", "C"]));
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-9);
        assert!(w.values().iter().all(|x| *x >= 0.0));
    }

    #[test]
    fn test_optimum_beats_equal_weights() {
        let names = tickers(&["A", "B", "C"]);
        let prices = prices_from_returns(&[
            ("A", wave(150, 0.0020, 0.010, 0.9, 0.3)),
            ("B", wave(150, 0.0002, 0.015, 1.7, 1.1)),
            ("C", wave(150, 0.0008, 0.006, 0.5, 2.4)),
        ]);
        let w = sharpe_optimal_weights(&names, &prices, &AnalyticsConfig::default()).unwrap();
        let returns = prices.returns().unwrap();
        let equal = [1.0 / 3.0; 3];
        assert!(semi_sharpe(&returns, &w.values()) >= semi_sharpe(&returns, &equal) - 1e-9);
    }

    #[test]
    fn test_losing_asset_is_underweighted() {
        let prices = prices_from_returns(&[
            ("WIN", wave(100, 0.0020, 0.010, 0.8, 0.0)),
            ("LOSE", wave(100, -0.0020, 0.010, 1.9, 0.5)),
        ]);
        let w = sharpe_optimal_weights(&tickers(&["WIN", "LOSE"]), &prices, &AnalyticsConfig::default())
            .unwrap();
        assert!(w.get("WIN").unwrap() > w.get("LOSE").unwrap());
    }

    #[test]
    fn test_std_dev_measure() {
        let mut config = AnalyticsConfig::default();
        config.optimizer.risk_measure = RiskMeasure::StdDev;
        let prices = prices_from_returns(&[
            ("A", wave(80, 0.0015, 0.010, 0.7, 0.0)),
            ("B", wave(80, 0.0010, 0.012, 1.3, 1.0)),
        ]);
        let w = sharpe_optimal_weights(&tickers(&["A", "B"]), &prices, &config).unwrap();
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fewer_observations_than_assets() {
        let prices = prices_from_returns(&[
            ("A", vec![0.01, 0.02]),
            ("B", vec![0.02, -0.01]),
            ("C", vec![-0.01, 0.03]),
        ]);
        let err = sharpe_optimal_weights(&tickers(&["A", "B", "C"]), &prices, &AnalyticsConfig::default())
            .unwrap_err();
        assert!(matches!(err, PortfolioError::Optimization(_)));
    }

    #[test]
    fn test_identical_assets_are_singular() {
        let r = wave(60, 0.001, 0.01, 0.9, 0.0);
        let prices = prices_from_returns(&[("A", r.clone()), ("B", r)]);
        let err = sharpe_optimal_weights(&tickers(&["A", "B"]), &prices, &AnalyticsConfig::default())
            .unwrap_err();
        assert!(matches!(err, PortfolioError::Optimization(_)));
    }

    #[test]
    fn test_no_positive_excess_return() {
        let prices = prices_from_returns(&[
            ("A", wave(60, -0.002, 0.01, 0.9, 0.0)),
            ("B", wave(60, -0.001, 0.01, 1.7, 1.0)),
        ]);
        let err = sharpe_optimal_weights(&tickers(&["A", "B"]), &prices, &AnalyticsConfig::default())
            .unwrap_err();
        assert!(matches!(err, PortfolioError::Optimization(_)));
    }

    #[test]
    fn test_iteration_limit_reached() {
        let mut config = AnalyticsConfig::default();
        config.optimizer.max_iterations = 1;
        config.optimizer.tolerance = 1e-300;
        let prices = prices_from_returns(&[
            ("A", wave(80, 0.0020, 0.010, 0.7, 0.0)),
            ("B", wave(80, 0.0001, 0.012, 1.3, 1.0)),
        ]);
        let err = sharpe_optimal_weights(&tickers(&["A", "B"]), &prices, &config).unwrap_err();
        assert!(matches!(err, PortfolioError::Optimization(_)));
    }

    #[test]
    fn test_project_simplex() {
        let p = project_simplex(&[0.6, 0.6]);
        assert_relative_eq!(p[0], 0.5, epsilon = 1e-12);
        let p = project_simplex(&[2.0, -1.0, 0.0]);
        assert_eq!(p, vec![1.0, 0.0, 0.0]);
    }
}
