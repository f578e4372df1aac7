use portfolio_core::{
    NormalizationMode, PortfolioError, PortfolioResult, PriceTable, ValueSeries, WeightVector,
};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Combine a price table and a weight vector into a normalized portfolio
/// value series.
///
/// Each asset is divided by its first observed price, multiplied by its
/// weight, and the weighted series are summed per date. Under
/// [`NormalizationMode::PerAsset`] an asset that starts late is rebased on
/// its own first date and only contributes from then on; missing cells add
/// nothing to that date's sum. [`NormalizationMode::CommonStart`] first drops
/// every row before the first date on which all assets have a price.
pub fn build_value_series(
    prices: &PriceTable,
    weights: &WeightVector,
    mode: NormalizationMode,
) -> PortfolioResult<ValueSeries> {
    if weights.is_empty() || !weights.covers_exactly(prices.tickers()) {
        return Err(PortfolioError::InvalidInput(format!(
            "price table tickers {:?} do not match weight tickers {:?}",
            prices.tickers(),
            weights.tickers()
        )));
    }

    let table = match mode {
        NormalizationMode::PerAsset => Cow::Borrowed(prices),
        NormalizationMode::CommonStart => {
            let start = prices.common_start().ok_or_else(|| {
                PortfolioError::InsufficientData(
                    "no date on which every asset has a price".to_string(),
                )
            })?;
            Cow::Owned(prices.since(start))
        }
    };

    if table.is_empty() {
        return Err(PortfolioError::InsufficientData(
            "price table has no rows to value".to_string(),
        ));
    }

    let bases = first_prices(&table)?;
    let scale: Vec<f64> = table
        .tickers()
        .iter()
        .zip(&bases)
        .map(|(ticker, base)| weights.get(ticker).unwrap_or(0.0) / base)
        .collect();

    let mut values = BTreeMap::new();
    for row in table.rows() {
        let mut observed = false;
        let mut total = 0.0;
        for (price, k) in row.prices.iter().zip(&scale) {
            if let Some(p) = price {
                total += p * k;
                observed = true;
            }
        }
        if observed {
            values.insert(row.date, total);
        }
    }

    Ok(ValueSeries::from(values))
}

/// First observed price per ticker. Every ticker must have one and it must
/// be non-zero.
fn first_prices(table: &PriceTable) -> PortfolioResult<Vec<f64>> {
    table
        .tickers()
        .iter()
        .enumerate()
        .map(|(i, ticker)| {
            let (date, base) = table
                .rows()
                .iter()
                .find_map(|r| r.prices[i].map(|p| (r.date, p)))
                .ok_or_else(|| {
                    PortfolioError::InsufficientData(format!("no prices observed for {}", ticker))
                })?;
            if base == 0.0 {
                return Err(PortfolioError::DivideByZero(format!(
                    "{} has a zero first price on {}",
                    ticker, date
                )));
            }
            Ok(base)
        })
        .collect()
}
