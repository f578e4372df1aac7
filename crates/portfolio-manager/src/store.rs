//! CSV-backed collaborators: portfolio definition, price history and the
//! persisted portfolio value history.

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use portfolio_core::{HistoryStore, PortfolioDefinitionStore, PriceSource, PriceTable, ValueSeries};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const TICKER_COLUMN: &str = "Ticker";
const DATE_COLUMN: &str = "Date";
const VALUE_COLUMN: &str = "Portfolio Value";

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d"))
        .with_context(|| format!("invalid date '{}'", raw))
}

/// Empty and `nan` cells are gaps.
fn parse_cell(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .with_context(|| format!("invalid number '{}'", raw))
}

/// Portfolio definition file with a `Ticker` column (the first column is
/// used when no header matches).
pub struct CsvPortfolioDefinition {
    path: PathBuf,
}

impl CsvPortfolioDefinition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PortfolioDefinitionStore for CsvPortfolioDefinition {
    fn load_tickers(&self) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("opening portfolio definition {}", self.path.display()))?;

        let column = reader
            .headers()?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(TICKER_COLUMN))
            .unwrap_or(0);

        let mut tickers = Vec::new();
        for record in reader.records() {
            let record = record
                .with_context(|| format!("reading portfolio definition {}", self.path.display()))?;
            let ticker = record.get(column).unwrap_or("").trim();
            if ticker.is_empty() {
                continue;
            }
            if tickers.iter().any(|t| t == ticker) {
                bail!("duplicate ticker {} in {}", ticker, self.path.display());
            }
            tickers.push(ticker.to_string());
        }

        if tickers.is_empty() {
            bail!("no tickers found in {}", self.path.display());
        }
        debug!(count = tickers.len(), "loaded portfolio tickers");
        Ok(tickers)
    }
}

/// Wide closing-price file: a `Date` column followed by one column per
/// ticker. Empty cells are gaps.
pub struct CsvPriceSource {
    path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch_prices(&self, tickers: &[String], start: NaiveDate) -> Result<PriceTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("opening price file {}", self.path.display()))?;

        let headers = reader.headers()?.clone();
        let mut columns = Vec::new();
        for ticker in tickers {
            match headers.iter().skip(1).position(|h| h.trim() == ticker) {
                Some(i) => columns.push((ticker.clone(), i + 1)),
                None => warn!(ticker = %ticker, path = %self.path.display(), "ticker missing from price file"),
            }
        }

        let mut observations = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("reading {}", self.path.display()))?;
            let date = parse_date(record.get(0).unwrap_or(""))
                .with_context(|| format!("{} row {}", self.path.display(), line + 2))?;
            if date < start {
                continue;
            }
            for (ticker, idx) in &columns {
                let cell = parse_cell(record.get(*idx).unwrap_or(""))
                    .with_context(|| format!("{} {} on {}", self.path.display(), ticker, date))?;
                if let Some(price) = cell {
                    observations.push((date, ticker.clone(), price));
                }
            }
        }

        let table = PriceTable::from_observations(observations)
            .with_context(|| format!("building price table from {}", self.path.display()))?;
        debug!(rows = table.len(), %start, "loaded prices");
        Ok(table)
    }
}

/// Two-column `Date,Portfolio Value` history file.
///
/// Values are written with shortest round-trip formatting, so a save/load
/// cycle reproduces every float exactly. Saves go through a sibling
/// temporary file that is renamed over the target.
pub struct CsvHistoryStore {
    path: PathBuf,
}

impl CsvHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl HistoryStore for CsvHistoryStore {
    fn load_history(&self) -> Result<ValueSeries> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no history file yet");
            return Ok(ValueSeries::empty());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("opening history {}", self.path.display()))?;

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            bail!("history {} needs a date and a value column", self.path.display());
        }
        let value_idx = headers
            .iter()
            .position(|h| h.trim() == VALUE_COLUMN)
            .unwrap_or(1);

        let mut points = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("reading {}", self.path.display()))?;
            let row = line + 2;
            let date = parse_date(record.get(0).unwrap_or(""))
                .with_context(|| format!("{} row {}", self.path.display(), row))?;
            let value = parse_cell(record.get(value_idx).unwrap_or(""))?
                .ok_or_else(|| anyhow!("{} row {} has no value", self.path.display(), row))?;
            points.push((date, value));
        }

        ValueSeries::from_pairs(points)
            .with_context(|| format!("validating history {}", self.path.display()))
    }

    fn save_history(&mut self, history: &ValueSeries) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating history directory {}", parent.display()))?;
        }

        let tmp = self.temp_path();
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            writer.write_record([DATE_COLUMN, VALUE_COLUMN])?;
            for point in history {
                writer.write_record([point.date.to_string(), point.value.to_string()])?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing history {}", self.path.display()))?;

        info!(path = %self.path.display(), points = history.len(), "history saved");
        Ok(())
    }
}
