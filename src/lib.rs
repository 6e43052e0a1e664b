//! Momentum stock screener.
//!
//! Fetches quotes for a universe of tickers in batches, ranks them by price
//! momentum and turns an explicit amount of capital into an equal-weight
//! trade list. [`pipeline::run`] is the entry point; every stage is also
//! usable on its own.

pub mod chunk;
pub mod config;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod logging;
pub mod pipeline;
pub mod portfolio;
pub mod scoring;
pub mod selector;
pub mod stocks;
pub mod table;
pub mod universe;

pub use config::ScreenerConfig;
pub use error::{FetchError, Omission, OmissionReason, ScreenerError, ValidationError};
pub use fetcher::{fetch_all, FetchOptions, FetchOutcome, MergedQuotes, RetryPolicy};
pub use pipeline::{plan_from_quotes, run, RunReport, RunSummary};
pub use portfolio::{size_positions, PortfolioPlan, Position};
pub use scoring::{score_percentiles, MissingPeriodPolicy, PercentileKind, ScoringOptions};
pub use selector::{select_top, SortKey};
pub use stocks::{IexCloudProvider, Period, QuoteBatch, QuoteProvider, QuoteRecord};
pub use table::{build_rows, Row, Strategy};
pub use universe::Universe;
