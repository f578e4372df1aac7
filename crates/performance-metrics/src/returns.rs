use portfolio_core::{PortfolioError, PortfolioResult, ReturnSeries, SeriesPoint, ValueSeries};

/// Calendar days per year used to turn a date span into years for CAGR.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Percentage change between consecutive points; the first date is dropped.
/// Fewer than two points give an empty series.
pub fn daily_returns(values: &ValueSeries) -> PortfolioResult<ReturnSeries> {
    let points = values
        .points()
        .windows(2)
        .map(|w| {
            if w[0].value == 0.0 {
                return Err(PortfolioError::DivideByZero(format!(
                    "portfolio value is zero on {}",
                    w[0].date
                )));
            }
            Ok(SeriesPoint {
                date: w[1].date,
                value: w[1].value / w[0].value - 1.0,
            })
        })
        .collect::<PortfolioResult<Vec<_>>>()?;

    ReturnSeries::new(points)
}

/// last / first - 1. Invariant under rescaling the whole series.
pub fn cumulative_return(values: &ValueSeries) -> PortfolioResult<f64> {
    let (first, last) = endpoints(values)?;
    if first.value == 0.0 {
        return Err(PortfolioError::DivideByZero(format!(
            "first portfolio value on {} is zero",
            first.date
        )));
    }
    Ok(last.value / first.value - 1.0)
}

/// Compound annual growth rate over the calendar span of the series.
pub fn cagr(values: &ValueSeries) -> PortfolioResult<f64> {
    let (first, last) = endpoints(values)?;
    if first.value == 0.0 {
        return Err(PortfolioError::DivideByZero(format!(
            "first portfolio value on {} is zero",
            first.date
        )));
    }

    let days = (last.date - first.date).num_days();
    if days == 0 {
        return Err(PortfolioError::DivideByZero(format!(
            "series spans zero days (single date {})",
            first.date
        )));
    }

    let years = days as f64 / DAYS_PER_YEAR;
    Ok((last.value / first.value).powf(1.0 / years) - 1.0)
}

fn endpoints(values: &ValueSeries) -> PortfolioResult<(&SeriesPoint, &SeriesPoint)> {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(PortfolioError::InsufficientData(
            "value series is empty".to_string(),
        )),
    }
}
