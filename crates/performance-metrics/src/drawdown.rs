use portfolio_core::{PortfolioError, PortfolioResult, SeriesPoint, ValueSeries};

/// (value - running max) / running max at every date, running max inclusive
/// of the current point. Every entry is <= 0.
pub fn drawdown_series(values: &ValueSeries) -> PortfolioResult<ValueSeries> {
    let mut peak = f64::NEG_INFINITY;
    let points = values
        .iter()
        .map(|p| {
            peak = peak.max(p.value);
            if peak == 0.0 {
                return Err(PortfolioError::DivideByZero(format!(
                    "running maximum is zero on {}",
                    p.date
                )));
            }
            Ok(SeriesPoint {
                date: p.date,
                value: (p.value - peak) / peak,
            })
        })
        .collect::<PortfolioResult<Vec<_>>>()?;

    ValueSeries::new(points)
}

/// Deepest drawdown over the whole series, as a non-positive fraction.
pub fn max_drawdown(values: &ValueSeries) -> PortfolioResult<f64> {
    if values.is_empty() {
        return Err(PortfolioError::InsufficientData(
            "value series is empty".to_string(),
        ));
    }
    Ok(drawdown_series(values)?
        .iter()
        .map(|p| p.value)
        .fold(0.0, f64::min))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(values: &[f64]) -> ValueSeries {
        let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        ValueSeries::from_pairs(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v)),
        )
        .unwrap()
    }

    #[test]
    fn test_max_drawdown() {
        let values = series(&[100.0, 110.0, 105.0, 95.0, 100.0, 115.0, 108.0]);
        // peak 110, trough 95
        assert!((max_drawdown(&values).unwrap() - (-15.0 / 110.0)).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_series_has_zero_drawdown() {
        let values = series(&[1.0, 1.0, 1.2, 1.5, 1.5, 2.0]);
        assert_eq!(max_drawdown(&values).unwrap(), 0.0);
        assert!(drawdown_series(&values).unwrap().values().iter().all(|d| *d == 0.0));
    }

    #[test]
    fn test_drawdown_never_positive() {
        let values = series(&[5.0, 3.0, 8.0, 1.0, 9.0, 2.0]);
        assert!(drawdown_series(&values).unwrap().values().iter().all(|d| *d <= 0.0));
        assert!(max_drawdown(&values).unwrap() <= 0.0);
    }

    #[test]
    fn test_max_drawdown_errors() {
        assert!(matches!(
            max_drawdown(&ValueSeries::empty()),
            Err(PortfolioError::InsufficientData(_))
        ));
        assert!(matches!(
            max_drawdown(&series(&[0.0, 0.0])),
            Err(PortfolioError::DivideByZero(_))
        ));
    }
}
