use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::{PortfolioError, PortfolioResult};

/// One calendar date of closing prices, positionally aligned with
/// [`PriceTable::tickers`]. `None` marks a gap (asset not yet listed, holiday
/// on its exchange); gaps are never filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub prices: Vec<Option<f64>>,
}

/// Date-indexed table of per-ticker closing prices.
///
/// Dates are strictly increasing, tickers are unique, and every observed
/// price is finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceTable")]
pub struct PriceTable {
    tickers: Vec<String>,
    rows: Vec<PriceRow>,
}

#[derive(Deserialize)]
struct RawPriceTable {
    tickers: Vec<String>,
    rows: Vec<PriceRow>,
}

impl TryFrom<RawPriceTable> for PriceTable {
    type Error = PortfolioError;

    fn try_from(raw: RawPriceTable) -> PortfolioResult<Self> {
        PriceTable::new(raw.tickers, raw.rows)
    }
}

impl PriceTable {
    pub fn new(tickers: Vec<String>, rows: Vec<PriceRow>) -> PortfolioResult<Self> {
        ensure_unique(&tickers)?;

        for (i, row) in rows.iter().enumerate() {
            if row.prices.len() != tickers.len() {
                return Err(PortfolioError::InvalidInput(format!(
                    "row {} has {} prices for {} tickers",
                    row.date,
                    row.prices.len(),
                    tickers.len()
                )));
            }
            if i > 0 && rows[i - 1].date >= row.date {
                return Err(PortfolioError::InvalidInput(format!(
                    "price dates must be strictly increasing: {} follows {}",
                    row.date,
                    rows[i - 1].date
                )));
            }
            for (ticker, price) in tickers.iter().zip(&row.prices) {
                if let Some(p) = price {
                    if !p.is_finite() || *p < 0.0 {
                        return Err(PortfolioError::InvalidInput(format!(
                            "price for {} on {} must be finite and non-negative, got {}",
                            ticker, row.date, p
                        )));
                    }
                }
            }
        }

        Ok(Self { tickers, rows })
    }

    /// Build a table from long-format `(date, ticker, price)` observations.
    /// Tickers keep the order in which they are first seen.
    pub fn from_observations<I, S>(observations: I) -> PortfolioResult<Self>
    where
        I: IntoIterator<Item = (NaiveDate, S, f64)>,
        S: Into<String>,
    {
        let mut tickers: Vec<String> = Vec::new();
        let mut by_date: BTreeMap<NaiveDate, BTreeMap<usize, f64>> = BTreeMap::new();

        for (date, ticker, price) in observations {
            let ticker = ticker.into();
            let idx = match tickers.iter().position(|t| *t == ticker) {
                Some(i) => i,
                None => {
                    tickers.push(ticker);
                    tickers.len() - 1
                }
            };
            if by_date.entry(date).or_default().insert(idx, price).is_some() {
                return Err(PortfolioError::InvalidInput(format!(
                    "duplicate observation for {} on {}",
                    tickers[idx], date
                )));
            }
        }

        let width = tickers.len();
        let rows = by_date
            .into_iter()
            .map(|(date, cells)| PriceRow {
                date,
                prices: (0..width).map(|i| cells.get(&i).copied()).collect(),
            })
            .collect();

        Self::new(tickers, rows)
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn ticker_index(&self, ticker: &str) -> Option<usize> {
        self.tickers.iter().position(|t| t == ticker)
    }

    pub fn contains_ticker(&self, ticker: &str) -> bool {
        self.ticker_index(ticker).is_some()
    }

    /// Observed `(date, price)` pairs for one ticker, gaps skipped.
    pub fn column(&self, ticker: &str) -> Option<Vec<(NaiveDate, f64)>> {
        let idx = self.ticker_index(ticker)?;
        Some(
            self.rows
                .iter()
                .filter_map(|r| r.prices[idx].map(|p| (r.date, p)))
                .collect(),
        )
    }

    /// Restrict the table to `tickers`, in that order. Rows where none of the
    /// selected tickers has a price are dropped.
    pub fn select(&self, tickers: &[String]) -> PortfolioResult<PriceTable> {
        ensure_unique(tickers)?;
        let indices = tickers
            .iter()
            .map(|t| {
                self.ticker_index(t).ok_or_else(|| {
                    PortfolioError::InvalidInput(format!("ticker {} is not in the price table", t))
                })
            })
            .collect::<PortfolioResult<Vec<usize>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|r| PriceRow {
                date: r.date,
                prices: indices.iter().map(|&i| r.prices[i]).collect(),
            })
            .filter(|r| r.prices.iter().any(Option::is_some))
            .collect();

        Ok(PriceTable {
            tickers: tickers.to_vec(),
            rows,
        })
    }

    /// Rows dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> PriceTable {
        PriceTable {
            tickers: self.tickers.clone(),
            rows: self.rows.iter().filter(|r| r.date >= start).cloned().collect(),
        }
    }

    /// First date on which every ticker has a price.
    pub fn common_start(&self) -> Option<NaiveDate> {
        self.rows
            .iter()
            .find(|r| r.prices.iter().all(Option::is_some))
            .map(|r| r.date)
    }

    /// Per-asset daily percentage returns.
    ///
    /// A return row exists for each pair of consecutive table rows in which
    /// every ticker has a price on both dates; all other rows are dropped.
    pub fn returns(&self) -> PortfolioResult<ReturnsTable> {
        let mut dates = Vec::new();
        let mut rows = Vec::new();

        for pair in self.rows.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            let mut row = Vec::with_capacity(self.tickers.len());
            for (i, ticker) in self.tickers.iter().enumerate() {
                match (prev.prices[i], curr.prices[i]) {
                    (Some(p0), Some(p1)) => {
                        if p0 == 0.0 {
                            return Err(PortfolioError::DivideByZero(format!(
                                "{} has a zero price on {}",
                                ticker, prev.date
                            )));
                        }
                        row.push(p1 / p0 - 1.0);
                    }
                    _ => break,
                }
            }
            if row.len() == self.tickers.len() {
                dates.push(curr.date);
                rows.push(row);
            }
        }

        Ok(ReturnsTable {
            tickers: self.tickers.clone(),
            dates,
            rows,
        })
    }
}

/// Aligned per-asset returns: `rows()[t][i]` is the return of `tickers()[i]`
/// ending on `dates()[t]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnsTable {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl ReturnsTable {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[idx]).collect()
    }

    /// The trailing `n` observations (all of them when fewer exist).
    pub fn tail(&self, n: usize) -> ReturnsTable {
        let start = self.rows.len().saturating_sub(n);
        ReturnsTable {
            tickers: self.tickers.clone(),
            dates: self.dates[start..].to_vec(),
            rows: self.rows[start..].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Date-ascending series with unique dates. Produced by pipeline stages and
/// replaced or extended, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SeriesPoint>", into = "Vec<SeriesPoint>")]
pub struct DatedSeries {
    points: Vec<SeriesPoint>,
}

/// Portfolio value per date.
pub type ValueSeries = DatedSeries;
/// Fractional return per date; one shorter than the series it came from.
pub type ReturnSeries = DatedSeries;

impl DatedSeries {
    pub fn new(points: Vec<SeriesPoint>) -> PortfolioResult<Self> {
        if let Some(w) = points.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(PortfolioError::InvalidInput(format!(
                "series dates must be strictly increasing: {} follows {}",
                w[1].date, w[0].date
            )));
        }
        Ok(Self { points })
    }

    pub fn from_pairs<I>(pairs: I) -> PortfolioResult<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(date, value)| SeriesPoint { date, value })
                .collect(),
        )
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeriesPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&SeriesPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.points.binary_search_by_key(&date, |p| p.date).is_ok()
    }

    /// Same dates, every value multiplied by `k`.
    pub fn scaled(&self, k: f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| SeriesPoint {
                    date: p.date,
                    value: p.value * k,
                })
                .collect(),
        }
    }

    /// Points whose dates appear in `other`, in date order.
    pub fn aligned_to(&self, other: &DatedSeries) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| other.contains_date(p.date))
                .copied()
                .collect(),
        }
    }
}

impl TryFrom<Vec<SeriesPoint>> for DatedSeries {
    type Error = PortfolioError;

    fn try_from(points: Vec<SeriesPoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<DatedSeries> for Vec<SeriesPoint> {
    fn from(series: DatedSeries) -> Self {
        series.points
    }
}

impl From<BTreeMap<NaiveDate, f64>> for DatedSeries {
    fn from(map: BTreeMap<NaiveDate, f64>) -> Self {
        Self {
            points: map
                .into_iter()
                .map(|(date, value)| SeriesPoint { date, value })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DatedSeries {
    type Item = &'a SeriesPoint;
    type IntoIter = std::slice::Iter<'a, SeriesPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeight {
    pub ticker: String,
    pub weight: f64,
}

/// Ticker → weight, in the order of the ticker list it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<AssetWeight>", into = "Vec<AssetWeight>")]
pub struct WeightVector {
    entries: Vec<AssetWeight>,
}

impl WeightVector {
    pub fn new(entries: Vec<AssetWeight>) -> PortfolioResult<Self> {
        let tickers: Vec<String> = entries.iter().map(|e| e.ticker.clone()).collect();
        ensure_unique(&tickers)?;
        if let Some(bad) = entries
            .iter()
            .find(|e| !e.weight.is_finite() || e.weight < 0.0)
        {
            return Err(PortfolioError::InvalidInput(format!(
                "weight for {} must be finite and non-negative, got {}",
                bad.ticker, bad.weight
            )));
        }
        Ok(Self { entries })
    }

    pub fn from_pairs<I, S>(pairs: I) -> PortfolioResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(ticker, weight)| AssetWeight {
                    ticker: ticker.into(),
                    weight,
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[AssetWeight] {
        &self.entries
    }

    pub fn tickers(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.ticker.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.weight).collect()
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.ticker == ticker)
            .map(|e| e.weight)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// True when `tickers` names exactly this vector's tickers, in any order.
    pub fn covers_exactly(&self, tickers: &[String]) -> bool {
        let mine: HashSet<&str> = self.entries.iter().map(|e| e.ticker.as_str()).collect();
        let theirs: HashSet<&str> = tickers.iter().map(String::as_str).collect();
        mine == theirs && theirs.len() == tickers.len()
    }
}

impl TryFrom<Vec<AssetWeight>> for WeightVector {
    type Error = PortfolioError;

    fn try_from(entries: Vec<AssetWeight>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<WeightVector> for Vec<AssetWeight> {
    fn from(weights: WeightVector) -> Self {
        weights.entries
    }
}

/// The fixed set of headline statistics handed to the report sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricName {
    #[serde(rename = "Cumulative Return")]
    CumulativeReturn,
    #[serde(rename = "Annual Volatility")]
    AnnualVolatility,
    #[serde(rename = "Sharpe Ratio")]
    SharpeRatio,
    #[serde(rename = "Sortino Ratio")]
    SortinoRatio,
    #[serde(rename = "Max Drawdown")]
    MaxDrawdown,
    #[serde(rename = "CAGR")]
    Cagr,
}

impl MetricName {
    pub const ALL: [MetricName; 6] = [
        MetricName::CumulativeReturn,
        MetricName::AnnualVolatility,
        MetricName::SharpeRatio,
        MetricName::SortinoRatio,
        MetricName::MaxDrawdown,
        MetricName::Cagr,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricName::CumulativeReturn => "Cumulative Return",
            MetricName::AnnualVolatility => "Annual Volatility",
            MetricName::SharpeRatio => "Sharpe Ratio",
            MetricName::SortinoRatio => "Sortino Ratio",
            MetricName::MaxDrawdown => "Max Drawdown",
            MetricName::Cagr => "CAGR",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Headline statistics for one value series. Derived on demand; the value
/// series stays the source of truth. Sharpe and Sortino may be NaN when
/// their denominator is legitimately zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsReport {
    #[serde(rename = "Cumulative Return")]
    pub cumulative_return: f64,
    #[serde(rename = "Annual Volatility")]
    pub annual_volatility: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Sortino Ratio")]
    pub sortino_ratio: f64,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
    #[serde(rename = "CAGR")]
    pub cagr: f64,
}

impl MetricsReport {
    pub fn get(&self, name: MetricName) -> f64 {
        match name {
            MetricName::CumulativeReturn => self.cumulative_return,
            MetricName::AnnualVolatility => self.annual_volatility,
            MetricName::SharpeRatio => self.sharpe_ratio,
            MetricName::SortinoRatio => self.sortino_ratio,
            MetricName::MaxDrawdown => self.max_drawdown,
            MetricName::Cagr => self.cagr,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricName, f64)> + '_ {
        MetricName::ALL.iter().map(move |&name| (name, self.get(name)))
    }
}

fn ensure_unique(tickers: &[String]) -> PortfolioResult<()> {
    let mut seen = HashSet::with_capacity(tickers.len());
    for t in tickers {
        if !seen.insert(t.as_str()) {
            return Err(PortfolioError::InvalidInput(format!(
                "duplicate ticker {}",
                t
            )));
        }
    }
    Ok(())
}
