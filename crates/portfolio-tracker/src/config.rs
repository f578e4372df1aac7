use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use portfolio_core::AnalyticsConfig;
use portfolio_manager::PipelineSettings;
use std::env;
use std::path::PathBuf;
use weighting_engine::WeightingPolicy;

const DEFAULT_HISTORY_START: &str = "2023-01-01";

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub portfolio_path: PathBuf,
    pub prices_path: PathBuf,
    pub history_path: PathBuf,
    pub report_path: PathBuf,
    pub weighting: WeightingPolicy,
    /// `None` disables the benchmark comparison.
    pub benchmark: Option<String>,
    pub history_start: NaiveDate,
    /// Pins "today" for reproducible runs; the local date otherwise.
    pub today: Option<NaiveDate>,
    pub analytics: AnalyticsConfig,
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            portfolio_path: env::var("PORTFOLIO_CSV")
                .unwrap_or_else(|_| "data/portfolio.csv".to_string())
                .into(),
            prices_path: env::var("PRICES_CSV")
                .unwrap_or_else(|_| "data/prices.csv".to_string())
                .into(),
            history_path: env::var("HISTORY_CSV")
                .unwrap_or_else(|_| "data/portfolio_history.csv".to_string())
                .into(),
            report_path: env::var("REPORT_PATH")
                .unwrap_or_else(|_| "reports/portfolio_report.json".to_string())
                .into(),
            weighting: env::var("WEIGHTING_MODE")
                .unwrap_or_else(|_| "equal".to_string())
                .parse()
                .context("WEIGHTING_MODE")?,
            benchmark: parse_benchmark(&env::var("BENCHMARK_TICKER").unwrap_or_else(|_| "SPY".to_string())),
            history_start: parse_date(
                &env::var("HISTORY_START").unwrap_or_else(|_| DEFAULT_HISTORY_START.to_string()),
            )
            .context("HISTORY_START")?,
            today: None,
            analytics: AnalyticsConfig::from_env()?,
        })
    }

    /// Apply `--flag value` overrides that follow the command name.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let Some(value) = iter.next() else {
                bail!("missing value for {}", flag);
            };
            match flag.as_str() {
                "--portfolio" => self.portfolio_path = value.into(),
                "--prices" => self.prices_path = value.into(),
                "--history" => self.history_path = value.into(),
                "--report" => self.report_path = value.into(),
                "--weighting" => self.weighting = value.parse()?,
                "--benchmark" => self.benchmark = parse_benchmark(value),
                "--start" => self.history_start = parse_date(value)?,
                "--today" => self.today = Some(parse_date(value)?),
                other => bail!("unknown option {}", other),
            }
        }
        self.analytics.validate()?;
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            policy: self.weighting,
            history_start: self.history_start,
            benchmark: self.benchmark.clone(),
            analytics: self.analytics.clone(),
        }
    }
}

fn parse_benchmark(raw: &str) -> Option<String> {
    let ticker = raw.trim();
    (!ticker.is_empty()).then(|| ticker.to_string())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", raw))
}
