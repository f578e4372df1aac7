use anyhow::Result;
use chrono::NaiveDate;

use crate::{PriceTable, ValueSeries};

/// Source of historical closing prices.
///
/// Implementations return a date-ascending table starting on or after
/// `start`. Non-trading days are simply absent; values are never fabricated.
pub trait PriceSource {
    fn fetch_prices(&self, tickers: &[String], start: NaiveDate) -> Result<PriceTable>;
}

/// Read-only list of the tickers that make up the portfolio.
pub trait PortfolioDefinitionStore {
    fn load_tickers(&self) -> Result<Vec<String>>;
}

/// Persisted, append-only portfolio value history.
///
/// `load_history` returns an empty series when nothing has been saved yet.
/// A save replaces the whole persisted series; callers only ever pass a
/// series that extends what they loaded.
pub trait HistoryStore {
    fn load_history(&self) -> Result<ValueSeries>;
    fn save_history(&mut self, history: &ValueSeries) -> Result<()>;
}
