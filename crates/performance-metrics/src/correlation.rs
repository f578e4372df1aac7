use portfolio_core::ReturnsTable;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::ZERO_VARIANCE_EPSILON;

/// Pairwise Pearson correlation of asset returns, indexed like `tickers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub tickers: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.tickers.iter().position(|t| t == a)?;
        let j = self.tickers.iter().position(|t| t == b)?;
        Some(self.values[i][j])
    }
}

/// Correlation of every pair of columns. Entries involving a column without
/// variance (or with fewer than two observations) are NaN.
pub fn correlation_matrix(returns: &ReturnsTable) -> CorrelationMatrix {
    let columns: Vec<Vec<f64>> = (0..returns.tickers().len())
        .map(|i| returns.column(i))
        .collect();
    let std_devs: Vec<f64> = columns.iter().map(|c| c.iter().std_dev()).collect();

    let n = columns.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let (sd_i, sd_j) = (std_devs[i], std_devs[j]);
            if !(sd_i.is_finite() && sd_j.is_finite())
                || sd_i < ZERO_VARIANCE_EPSILON
                || sd_j < ZERO_VARIANCE_EPSILON
            {
                continue;
            }
            let rho = if i == j {
                1.0
            } else {
                let cov = columns[i].iter().covariance(columns[j].iter());
                (cov / (sd_i * sd_j)).clamp(-1.0, 1.0)
            };
            values[i][j] = rho;
            values[j][i] = rho;
        }
    }

    CorrelationMatrix {
        tickers: returns.tickers().to_vec(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use portfolio_core::PriceTable;

    #[test]
    fn test_correlation_signs() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let a = [100.0, 101.0, 99.0, 102.0, 100.0];
        let b = [50.0, 50.5, 49.5, 51.0, 50.0];
        let c = [20.0, 19.8, 20.2, 19.6, 20.0];
        let flat = [10.0; 5];
        let mut obs = Vec::new();
        for i in 0..5 {
            let date = start + Duration::days(i as i64);
            obs.push((date, "A", a[i]));
            obs.push((date, "B", b[i]));
            obs.push((date, "C", c[i]));
            obs.push((date, "F", flat[i]));
        }
        let table = PriceTable::from_observations(obs).unwrap();
        let corr = correlation_matrix(&table.returns().unwrap());

        assert_eq!(corr.get("A", "A"), Some(1.0));
        assert!(corr.get("A", "B").unwrap() > 0.99);
        assert!(corr.get("A", "C").unwrap() < 0.0);
        assert!(corr.get("A", "F").unwrap().is_nan());
        assert_eq!(corr.get("B", "C"), corr.get("C", "B"));
    }
}
