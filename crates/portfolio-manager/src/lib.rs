//! Valuation, history reconciliation, reporting and the pipeline entry
//! points that tie the weighting and metrics engines together.

pub mod benchmark;
pub mod history;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod valuation;


pub use benchmark::{BenchmarkComparer, BenchmarkComparison};
pub use history::{
    check_fetch_window, check_new_prices, max_safe_date, next_fetch_start, reconcile,
    UpdateOutcome,
};
pub use pipeline::{run_full_report, run_incremental_update, PipelineSettings};
pub use report::{generate_tear_sheet, JsonTearSheet, PolicySummary, ReportInputs, ReportPayload, ReportSink};
pub use store::{CsvHistoryStore, CsvPortfolioDefinition, CsvPriceSource};
pub use valuation::build_value_series;
