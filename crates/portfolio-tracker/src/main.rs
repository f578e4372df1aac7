//! portfolio-tracker: weighted portfolio valuation and performance reports.
//!
//! Usage:
//!   portfolio-tracker report [--weighting inverse_vol] [--report out.json]
//!   portfolio-tracker update [--history data/portfolio_history.csv] [--today 2024-06-03]
//!
//! Paths and analytics parameters default from the environment (`.env` is
//! honoured); flags override them.

mod config;

use anyhow::{bail, Result};
use chrono::Local;
use portfolio_core::MetricName;
use portfolio_manager::{
    run_full_report, run_incremental_update, CsvHistoryStore, CsvPortfolioDefinition,
    CsvPriceSource, JsonTearSheet, ReportPayload, ReportSink, UpdateOutcome,
};
use std::fmt::Write as _;

use config::TrackerConfig;

const USAGE: &str = "usage: portfolio-tracker <report|update> [--portfolio PATH] [--prices PATH] \
[--history PATH] [--report PATH] [--weighting equal|inverse_vol|sharpe_opt] [--benchmark TICKER] \
[--start YYYY-MM-DD] [--today YYYY-MM-DD]";

/// Writes the JSON tear sheet and echoes a summary to stdout.
struct TrackerSink {
    tear_sheet: JsonTearSheet,
}

impl ReportSink for TrackerSink {
    fn render(&mut self, payload: &ReportPayload) -> Result<()> {
        self.tear_sheet.render(payload)?;
        print!("{}", format_summary(payload));
        println!("Report saved to: {}", self.tear_sheet.path().display());
        Ok(())
    }
}

fn format_summary(payload: &ReportPayload) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", payload.title, payload.policy.title);
    let _ = writeln!(out, "Portfolio Weights:");
    for entry in payload.weights.entries() {
        let _ = writeln!(out, "  {:<8} {:.4}", entry.ticker, entry.weight);
    }
    for name in MetricName::ALL {
        let _ = writeln!(out, "{}: {:.4}", name, payload.metrics.get(name));
    }
    if let Some(cmp) = &payload.benchmark_comparison {
        let _ = writeln!(
            out,
            "vs {}: excess return {:.4}, beta {:.4}, tracking error {:.4}",
            cmp.benchmark_symbol, cmp.excess_return, cmp.beta, cmp.tracking_error
        );
    }
    out
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "portfolio_tracker=info,portfolio_manager=info".into());
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first().map(String::as_str) {
        Some(cmd @ ("report" | "update")) => cmd.to_string(),
        Some("-h" | "--help") | None => {
            println!("{}", USAGE);
            return Ok(());
        }
        Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
    };

    let mut config = TrackerConfig::from_env()?;
    config.apply_args(&args[1..])?;
    let today = config.today.unwrap_or_else(|| Local::now().date_naive());
    let settings = config.pipeline_settings();

    tracing::info!(
        command = %command,
        policy = %settings.policy,
        %today,
        "starting portfolio tracker"
    );

    let definition = CsvPortfolioDefinition::new(&config.portfolio_path);
    let source = CsvPriceSource::new(&config.prices_path);
    let mut sink = TrackerSink {
        tear_sheet: JsonTearSheet::new(&config.report_path),
    };

    if command == "report" {
        run_full_report(&definition, &source, &mut sink, &settings, today)?;
        return Ok(());
    }

    let mut store = CsvHistoryStore::new(&config.history_path);
    let outcome = run_incremental_update(&definition, &source, &mut store, &mut sink, &settings, today)?;
    match &outcome {
        UpdateOutcome::Updated { .. } => println!("Update complete: {}", outcome),
        UpdateOutcome::NoNewData { .. } | UpdateOutcome::InsufficientNewData { .. } => {
            println!("{}", outcome)
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use portfolio_core::{AnalyticsConfig, PriceTable, ValueSeries, WeightVector};
    use portfolio_manager::{ReportInputs, ReportPayload};
    use weighting_engine::WeightingPolicy;

    #[test]
    fn test_summary_rounds_to_four_decimals() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let values = ValueSeries::from_pairs(
            [1.0, 1.01, 0.99, 1.02]
                .iter()
                .enumerate()
                .map(|(i, v)| (start + chrono::Duration::days(i as i64), *v)),
        )
        .unwrap();
        let tickers = vec!["AAA".to_string(), "BBB".to_string()];
        let weights = WeightVector::from_pairs(vec![("AAA", 1.0 / 3.0), ("BBB", 2.0 / 3.0)]).unwrap();
        let payload = ReportPayload::build(
            ReportInputs {
                policy: WeightingPolicy::Equal,
                tickers: &tickers,
                weights: &weights,
                values: &values,
                prices: None::<&PriceTable>,
                benchmark_symbol: None,
                generated_on: start,
            },
            &AnalyticsConfig::default(),
        )
        .unwrap();

        let summary = format_summary(&payload);
        assert!(summary.contains("AAA      0.3333"));
        assert!(summary.contains("BBB      0.6667"));
        assert!(summary.contains("Cumulative Return: 0.0200"));
        assert!(summary.contains("Max Drawdown: -0.0198"));
    }
}
