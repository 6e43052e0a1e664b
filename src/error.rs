//! Error and omission types shared by every pipeline stage.
//!
//! Fatal conditions abort the whole run and are returned as [`ScreenerError`].
//! Per-row problems are not errors: the row is dropped and an [`Omission`] is
//! handed back to the caller alongside the result.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::stocks::Period;

/// Bad input detected before or between stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("portfolio capital must be a positive amount, got {0}")]
    InvalidCapital(f64),

    #[error("universe contains no symbols")]
    EmptyUniverse,

    #[error("symbol '{0}' appears more than once in the universe")]
    DuplicateInUniverse(String),

    #[error("'{0}' is not a valid ticker symbol")]
    InvalidSymbol(String),

    #[error("chunk size must be at least 1, got {0}")]
    InvalidChunkSize(usize),

    #[error("top-N must be at least 1, got {0}")]
    InvalidTopN(usize),

    #[error("fetch concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("retry backoff multiplier must be a finite number of at least 1, got {0}")]
    InvalidBackoffMultiplier(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot size {symbol}: price {price} is not positive")]
    NonPositivePrice { symbol: String, price: f64 },
}

/// Failure of a single provider call.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::MalformedResponse(_) => false,
        }
    }
}

/// Transport failures. Client timeouts are mapped to [`FetchError::Timeout`]
/// by the provider, which knows the configured deadline.
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::MalformedResponse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Fatal pipeline errors. Any of these aborts the run and no plan is produced.
#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error("invalid input: {0}")]
    InputValidation(#[from] ValidationError),

    #[error("fetching chunk [{}] failed: {source}", symbols.join(","))]
    DataFetch {
        symbols: Vec<String>,
        #[source]
        source: FetchError,
    },

    #[error("provider returned {symbol} in more than one chunk")]
    DuplicateSymbol { symbol: String },

    #[error("no rows left to size after filtering")]
    EmptyRowSet,
}

/// Field of a quote that a row needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Field {
    Price,
    Return(Period),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Price => write!(f, "price"),
            Field::Return(period) => write!(f, "{} return", period.label()),
        }
    }
}

/// Why a symbol was left out of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum OmissionReason {
    /// The provider returned nothing for the symbol.
    NoData,
    MissingField(Field),
    /// Present but unusable (non-finite, or a non-positive price).
    InvalidField(Field),
    MissingPeriods(Vec<Period>),
}

impl fmt::Display for OmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OmissionReason::NoData => write!(f, "no data returned by provider"),
            OmissionReason::MissingField(field) => write!(f, "missing {field}"),
            OmissionReason::InvalidField(field) => write!(f, "invalid {field}"),
            OmissionReason::MissingPeriods(periods) => {
                let labels: Vec<&str> = periods.iter().map(|p| p.label()).collect();
                write!(f, "missing returns for {}", labels.join(", "))
            }
        }
    }
}

/// A symbol dropped from downstream processing. Non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Omission {
    pub symbol: String,
    pub reason: OmissionReason,
}

impl Omission {
    pub fn new(symbol: impl Into<String>, reason: OmissionReason) -> Self {
        Self {
            symbol: symbol.into(),
            reason,
        }
    }
}

impl fmt::Display for Omission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.symbol, self.reason)
    }
}
