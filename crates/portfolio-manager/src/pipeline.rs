use anyhow::{Context, Result};
use chrono::NaiveDate;
use portfolio_core::{
    AnalyticsConfig, HistoryStore, PortfolioDefinitionStore, PriceSource, PriceTable,
};
use tracing::info;
use weighting_engine::{derive_weights, WeightingPolicy};

use crate::history::{check_fetch_window, check_new_prices, next_fetch_start, reconcile, UpdateOutcome};
use crate::report::{ReportInputs, ReportPayload, ReportSink};
use crate::valuation::build_value_series;

/// Run-level settings shared by both entry points.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub policy: WeightingPolicy,
    /// Start of the full price window, and of an empty history.
    pub history_start: NaiveDate,
    /// Benchmark ticker fetched alongside the portfolio, if any.
    pub benchmark: Option<String>,
    pub analytics: AnalyticsConfig,
}

impl PipelineSettings {
    /// Portfolio tickers plus the benchmark when it is not already held.
    fn request_tickers(&self, tickers: &[String]) -> Vec<String> {
        let mut request = tickers.to_vec();
        if let Some(bench) = &self.benchmark {
            if !request.contains(bench) {
                request.push(bench.clone());
            }
        }
        request
    }
}

/// Recompute the whole portfolio from `history_start` and hand the result to
/// `sink`.
pub fn run_full_report(
    definition: &dyn PortfolioDefinitionStore,
    source: &dyn PriceSource,
    sink: &mut dyn ReportSink,
    settings: &PipelineSettings,
    today: NaiveDate,
) -> Result<ReportPayload> {
    let tickers = definition
        .load_tickers()
        .context("loading portfolio definition")?;
    let request = settings.request_tickers(&tickers);
    let table = source
        .fetch_prices(&request, settings.history_start)
        .with_context(|| format!("fetching prices from {}", settings.history_start))?;
    let portfolio_prices = table.select(&tickers)?;

    let weights = derive_weights(
        settings.policy,
        &tickers,
        Some(&portfolio_prices),
        &settings.analytics,
    )?;
    let values = build_value_series(&portfolio_prices, &weights, settings.analytics.normalization)?;

    let payload = ReportPayload::build(
        ReportInputs {
            policy: settings.policy,
            tickers: &tickers,
            weights: &weights,
            values: &values,
            prices: Some(&table),
            benchmark_symbol: settings.benchmark.as_deref(),
            generated_on: today,
        },
        &settings.analytics,
    )?;
    sink.render(&payload).context("rendering report")?;

    info!(
        policy = %settings.policy,
        points = values.len(),
        "full report complete"
    );
    Ok(payload)
}

/// Value only the dates after the recorded history, merge them in, persist,
/// and report over the merged history.
///
/// The two guard outcomes ([`UpdateOutcome::NoNewData`] and
/// [`UpdateOutcome::InsufficientNewData`]) are returned as `Ok` and leave the
/// store untouched.
pub fn run_incremental_update(
    definition: &dyn PortfolioDefinitionStore,
    source: &dyn PriceSource,
    store: &mut dyn HistoryStore,
    sink: &mut dyn ReportSink,
    settings: &PipelineSettings,
    today: NaiveDate,
) -> Result<UpdateOutcome> {
    let tickers = definition
        .load_tickers()
        .context("loading portfolio definition")?;
    let history = store.load_history().context("loading portfolio history")?;

    let start = next_fetch_start(&history, settings.history_start);
    if let Some(outcome) = check_fetch_window(start, today) {
        return Ok(outcome);
    }

    let request = settings.request_tickers(&tickers);
    let tail_table = source
        .fetch_prices(&request, start)
        .with_context(|| format!("fetching prices from {}", start))?;
    if let Some(outcome) = check_new_prices(&tail_table) {
        return Ok(outcome);
    }
    let tail = tail_table.select(&tickers)?;
    if let Some(outcome) = check_new_prices(&tail) {
        return Ok(outcome);
    }

    // Price-based weights and the benchmark both look at the full window.
    let full_window = if settings.policy.requires_prices() || settings.benchmark.is_some() {
        Some(
            source
                .fetch_prices(&request, settings.history_start)
                .with_context(|| format!("fetching prices from {}", settings.history_start))?,
        )
    } else {
        None
    };
    let weight_prices = full_window
        .as_ref()
        .map(|t| t.select(&tickers))
        .transpose()?;

    let weights = derive_weights(
        settings.policy,
        &tickers,
        weight_prices.as_ref(),
        &settings.analytics,
    )?;
    let new_values = build_value_series(&tail, &weights, settings.analytics.normalization)?;

    let merged = reconcile(&history, &new_values);
    let appended = merged.len() - history.len();
    if appended > 0 {
        store
            .save_history(&merged)
            .context("saving portfolio history")?;
    } else {
        info!("no new dates to append; history unchanged");
    }
    let merged = merged.into_owned();

    let report_prices: PriceTable = match (&full_window, merged.first()) {
        (Some(window), Some(first)) => window.since(first.date),
        _ => tail_table,
    };
    let payload = ReportPayload::build(
        ReportInputs {
            policy: settings.policy,
            tickers: &tickers,
            weights: &weights,
            values: &merged,
            prices: Some(&report_prices),
            benchmark_symbol: settings.benchmark.as_deref(),
            generated_on: today,
        },
        &settings.analytics,
    )?;
    sink.render(&payload).context("rendering report")?;

    info!(appended, total = merged.len(), "incremental update complete");
    Ok(UpdateOutcome::Updated {
        appended,
        history: merged,
    })
}
