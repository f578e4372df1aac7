use anyhow::{Context, Result};
use chrono::NaiveDate;
use performance_metrics::{
    compute_metrics, correlation_matrix, daily_returns, drawdown_series, rolling_sharpe,
    CorrelationMatrix,
};
use portfolio_core::{
    AnalyticsConfig, MetricsReport, PortfolioResult, PriceTable, ReturnSeries, ValueSeries,
    WeightVector,
};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use weighting_engine::WeightingPolicy;

use crate::benchmark::{BenchmarkComparer, BenchmarkComparison};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySummary {
    pub key: String,
    pub title: String,
    pub description: String,
}

impl From<WeightingPolicy> for PolicySummary {
    fn from(policy: WeightingPolicy) -> Self {
        Self {
            key: policy.key().to_string(),
            title: policy.title().to_string(),
            description: policy.description().to_string(),
        }
    }
}

/// Everything a report sink needs to render one portfolio report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub title: String,
    pub generated_on: NaiveDate,
    pub policy: PolicySummary,
    pub tickers: Vec<String>,
    pub weights: WeightVector,
    pub metrics: MetricsReport,
    pub value_series: ValueSeries,
    pub drawdowns: ValueSeries,
    pub daily_returns: Option<ReturnSeries>,
    pub rolling_sharpe: Option<ReturnSeries>,
    pub correlation: Option<CorrelationMatrix>,
    pub benchmark: Option<ValueSeries>,
    pub benchmark_comparison: Option<BenchmarkComparison>,
}

/// Inputs for [`ReportPayload::build`].
pub struct ReportInputs<'a> {
    pub policy: WeightingPolicy,
    pub tickers: &'a [String],
    pub weights: &'a WeightVector,
    pub values: &'a ValueSeries,
    /// Asset prices for the correlation matrix and benchmark. May hold more
    /// tickers than the portfolio; the benchmark column joins the correlation
    /// matrix when present.
    pub prices: Option<&'a PriceTable>,
    pub benchmark_symbol: Option<&'a str>,
    pub generated_on: NaiveDate,
}

impl ReportPayload {
    pub fn build(inputs: ReportInputs<'_>, config: &AnalyticsConfig) -> PortfolioResult<Self> {
        let values = inputs.values;
        let metrics = compute_metrics(values, config)?;
        let drawdowns = drawdown_series(values)?;

        let daily = daily_returns(values)?;
        let rolling = if daily.len() >= config.rolling_window {
            Some(rolling_sharpe(&daily, config.rolling_window, config)?)
        } else {
            None
        };

        let correlation = match inputs.prices {
            Some(prices) => {
                let mut columns = inputs.tickers.to_vec();
                if let Some(symbol) = inputs.benchmark_symbol {
                    if prices.contains_ticker(symbol) && !columns.iter().any(|t| t == symbol) {
                        columns.push(symbol.to_string());
                    }
                }
                let returns = prices.select(&columns)?.returns()?;
                if returns.len() >= 2 {
                    Some(correlation_matrix(&returns))
                } else {
                    None
                }
            }
            None => None,
        };

        let benchmark = match (inputs.prices, inputs.benchmark_symbol) {
            (Some(prices), Some(symbol)) => {
                BenchmarkComparer::normalized_benchmark(prices, symbol, values)?
            }
            _ => None,
        };
        let benchmark_comparison = match (&benchmark, inputs.benchmark_symbol) {
            (Some(bench), Some(symbol)) => {
                BenchmarkComparer::compare(values, bench, symbol, config)?
            }
            _ => None,
        };

        Ok(Self {
            title: "Portfolio Performance Report".to_string(),
            generated_on: inputs.generated_on,
            policy: inputs.policy.into(),
            tickers: inputs.tickers.to_vec(),
            weights: inputs.weights.clone(),
            metrics,
            value_series: values.clone(),
            drawdowns,
            daily_returns: (!daily.is_empty()).then_some(daily),
            rolling_sharpe: rolling,
            correlation,
            benchmark,
            benchmark_comparison,
        })
    }
}

/// Consumer of a finished report payload.
pub trait ReportSink {
    fn render(&mut self, payload: &ReportPayload) -> Result<()>;
}

/// Structured tear sheet combining the payload's analytics into one JSON
/// document.
pub fn generate_tear_sheet(payload: &ReportPayload) -> serde_json::Value {
    let period = match (payload.value_series.first(), payload.value_series.last()) {
        (Some(first), Some(last)) => format!("{} to {}", first.date, last.date),
        _ => String::new(),
    };

    let mut sheet = json!({
        "summary": {
            "title": payload.title,
            "generated_on": payload.generated_on,
            "period": period,
            "observations": payload.value_series.len(),
            "final_value": payload.value_series.last().map(|p| p.value),
        },
        "policy": payload.policy,
        "allocation": payload.weights,
        "metrics": payload.metrics,
        "series": {
            "portfolio_value": payload.value_series,
            "drawdown": payload.drawdowns,
        },
    });

    if let Some(ref daily) = payload.daily_returns {
        sheet["series"]["daily_returns"] = json!(daily);
    }
    if let Some(ref rolling) = payload.rolling_sharpe {
        sheet["series"]["rolling_sharpe"] = json!(rolling);
    }
    if let Some(ref corr) = payload.correlation {
        sheet["correlation"] = json!(corr);
    }
    if let Some(ref bench) = payload.benchmark {
        sheet["series"]["benchmark"] = json!(bench);
    }
    if let Some(ref cmp) = payload.benchmark_comparison {
        sheet["benchmark_comparison"] = json!(cmp);
    }

    sheet
}

/// Writes [`generate_tear_sheet`] output as pretty JSON to a file.
pub struct JsonTearSheet {
    path: PathBuf,
}

impl JsonTearSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonTearSheet {
    fn render(&mut self, payload: &ReportPayload) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&generate_tear_sheet(payload))?;
        fs::write(&self.path, body)
            .with_context(|| format!("writing report {}", self.path.display()))?;
        info!(path = %self.path.display(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i)
    }

    fn prices() -> PriceTable {
        let a = [100.0, 101.0, 99.5, 102.0, 103.0, 101.5];
        let b = [50.0, 50.2, 50.9, 50.4, 51.0, 51.3];
        let spy = [400.0, 402.0, 399.0, 404.0, 405.0, 403.0];
        let mut obs = Vec::new();
        for i in 0..a.len() {
            obs.push((day(i as i64), "A", a[i]));
            obs.push((day(i as i64), "B", b[i]));
            obs.push((day(i as i64), "SPY", spy[i]));
        }
        PriceTable::from_observations(obs).unwrap()
    }

    fn payload(config: &AnalyticsConfig) -> ReportPayload {
        let table = prices();
        let tickers = vec!["A".to_string(), "B".to_string()];
        let weights = WeightVector::from_pairs(vec![("A", 0.5), ("B", 0.5)]).unwrap();
        let values = crate::valuation::build_value_series(
            &table.select(&tickers).unwrap(),
            &weights,
            config.normalization,
        )
        .unwrap();
        ReportPayload::build(
            ReportInputs {
                policy: WeightingPolicy::Equal,
                tickers: &tickers,
                weights: &weights,
                values: &values,
                prices: Some(&table),
                benchmark_symbol: Some("SPY"),
                generated_on: day(10),
            },
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_payload_contents() {
        let mut config = AnalyticsConfig::default();
        config.rolling_window = 3;
        let p = payload(&config);

        assert_eq!(p.policy.key, "equal");
        assert_eq!(p.value_series.len(), 6);
        assert_eq!(p.drawdowns.len(), 6);
        assert_eq!(p.daily_returns.as_ref().map(|r| r.len()), Some(5));
        assert_eq!(p.rolling_sharpe.as_ref().map(|r| r.len()), Some(5));
        let corr = p.correlation.as_ref().unwrap();
        assert_eq!(corr.tickers, vec!["A", "B", "SPY"]);
        assert_eq!(p.benchmark.as_ref().map(|b| b.len()), Some(6));
        assert!(p.benchmark_comparison.is_some());
    }

    #[test]
    fn test_correlation_without_benchmark_covers_holdings() {
        let table = prices();
        let tickers = vec!["A".to_string(), "B".to_string()];
        let weights = WeightVector::from_pairs(vec![("A", 0.5), ("B", 0.5)]).unwrap();
        let values = crate::valuation::build_value_series(
            &table.select(&tickers).unwrap(),
            &weights,
            Default::default(),
        )
        .unwrap();
        let p = ReportPayload::build(
            ReportInputs {
                policy: WeightingPolicy::Equal,
                tickers: &tickers,
                weights: &weights,
                values: &values,
                prices: Some(&table),
                benchmark_symbol: None,
                generated_on: day(10),
            },
            &AnalyticsConfig::default(),
        )
        .unwrap();
        assert_eq!(p.correlation.unwrap().tickers, vec!["A", "B"]);
        assert!(p.benchmark.is_none());
    }

    #[test]
    fn test_short_history_skips_rolling_sharpe() {
        let p = payload(&AnalyticsConfig::default());
        assert!(p.rolling_sharpe.is_none());
    }

    #[test]
    fn test_tear_sheet_layout() {
        let p = payload(&AnalyticsConfig::default());
        let sheet = generate_tear_sheet(&p);
        assert_eq!(sheet["policy"]["title"], "Equal Weighting");
        assert!(sheet["metrics"]["Cumulative Return"].is_number());
        assert_eq!(sheet["allocation"][0]["ticker"], "A");
        assert_eq!(sheet["series"]["portfolio_value"].as_array().unwrap().len(), 6);
        assert!(sheet["benchmark_comparison"]["beta"].is_number());
    }

    #[test]
    fn test_json_tear_sheet_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("portfolio.json");
        let mut sink = JsonTearSheet::new(&path);
        sink.render(&payload(&AnalyticsConfig::default())).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["summary"]["observations"], 6);
    }
}
