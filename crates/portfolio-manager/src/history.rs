use chrono::{Duration, NaiveDate};
use portfolio_core::{PriceTable, ValueSeries};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Result of one incremental history update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// New points were computed; `appended` of them were not yet in the
    /// history and `history` is the merged series.
    Updated {
        appended: usize,
        history: ValueSeries,
    },
    /// The next fetch would start on or after the latest settled date.
    NoNewData {
        start: NaiveDate,
        max_safe: NaiveDate,
    },
    /// The price source returned fewer than 2 rows for the new window.
    InsufficientNewData { observations: usize },
}

impl UpdateOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Updated { appended, history } => write!(
                f,
                "history updated: {} new point(s), {} total",
                appended,
                history.len()
            ),
            UpdateOutcome::NoNewData { start, max_safe } => write!(
                f,
                "no new data available yet: next window starts {} but the latest settled date is {}",
                start, max_safe
            ),
            UpdateOutcome::InsufficientNewData { observations } => write!(
                f,
                "not enough new data to update the portfolio ({} price row(s))",
                observations
            ),
        }
    }
}

/// First date to request from the price source: the day after the last
/// recorded point, or `default_start` for an empty history.
pub fn next_fetch_start(history: &ValueSeries, default_start: NaiveDate) -> NaiveDate {
    match history.last_date() {
        Some(last) => last + Duration::days(1),
        None => default_start,
    }
}

/// Latest date whose closing prices are treated as settled.
pub fn max_safe_date(today: NaiveDate) -> NaiveDate {
    today - Duration::days(1)
}

/// `Some(NoNewData)` unless `start` is strictly before yesterday.
pub fn check_fetch_window(start: NaiveDate, today: NaiveDate) -> Option<UpdateOutcome> {
    let max_safe = max_safe_date(today);
    if start >= max_safe {
        info!(%start, %max_safe, "fetch window not open yet");
        return Some(UpdateOutcome::NoNewData { start, max_safe });
    }
    None
}

/// `Some(InsufficientNewData)` when the new window has fewer than 2 rows.
pub fn check_new_prices(prices: &PriceTable) -> Option<UpdateOutcome> {
    if prices.len() < 2 {
        info!(observations = prices.len(), "not enough new price rows");
        return Some(UpdateOutcome::InsufficientNewData {
            observations: prices.len(),
        });
    }
    None
}

/// Merge `new_tail` into `existing`.
///
/// Dates already present in `existing` keep their recorded value; all other
/// points are added in date order. When nothing is added the existing series
/// is handed back borrowed.
pub fn reconcile<'a>(existing: &'a ValueSeries, new_tail: &ValueSeries) -> Cow<'a, ValueSeries> {
    let fresh: Vec<_> = new_tail
        .iter()
        .filter(|p| !existing.contains_date(p.date))
        .collect();

    if fresh.is_empty() {
        return Cow::Borrowed(existing);
    }

    let mut merged: BTreeMap<NaiveDate, f64> = existing.iter().map(|p| (p.date, p.value)).collect();
    for point in &fresh {
        merged.insert(point.date, point.value);
    }

    info!(
        appended = fresh.len(),
        skipped = new_tail.len() - fresh.len(),
        "merged new valuation points into history"
    );
    Cow::Owned(ValueSeries::from(merged))
}
