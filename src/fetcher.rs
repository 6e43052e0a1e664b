//! Batch fetching of the whole universe.
//!
//! The universe is split into chunks and each chunk becomes one provider call.
//! Calls run concurrently up to a configured limit; results are merged by the
//! collecting task as they complete, so there is no shared mutable map. The
//! first chunk that fails (after any retries) aborts the run, dropping the
//! fetches still in flight.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::chunk::{chunk, chunk_count};
use crate::error::{FetchError, Omission, OmissionReason, ScreenerError, ValidationError};
use crate::stocks::{QuoteBatch, QuoteProvider, QuoteRecord};

/// Bounded retry with exponential backoff for transient failures.
///
/// `max_attempts == 1` means a single attempt and no retry.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(250),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(4),
        }
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier.max(1.0))
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Knobs for [`fetch_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Maximum provider calls in flight.
    pub concurrency: usize,
    /// Deadline for a single provider call.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::none(),
        }
    }
}

/// Universe-wide symbol → record mapping that remembers universe order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedQuotes {
    records: HashMap<String, QuoteRecord>,
    order: Vec<String>,
}

impl MergedQuotes {
    /// Keep the records for symbols of `universe`, ordered as in `universe`.
    pub fn new(universe: &[String], mut records: HashMap<String, QuoteRecord>) -> Self {
        let order: Vec<String> = universe
            .iter()
            .filter(|s| records.contains_key(s.as_str()))
            .cloned()
            .collect();
        if records.len() > order.len() {
            let keep: HashSet<&str> = order.iter().map(String::as_str).collect();
            records.retain(|symbol, _| keep.contains(symbol.as_str()));
        }
        Self { records, order }
    }

    pub fn get(&self, symbol: &str) -> Option<&QuoteRecord> {
        self.records.get(symbol)
    }

    /// Symbols with data, in universe order.
    pub fn symbols(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuoteRecord)> + '_ {
        self.order
            .iter()
            .filter_map(|s| self.records.get(s).map(|r| (s.as_str(), r)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Result of fetching the whole universe.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub quotes: MergedQuotes,
    /// Universe symbols the provider returned nothing for.
    pub omissions: Vec<Omission>,
    /// Number of provider calls made (one per chunk).
    pub chunks: usize,
}

/// Fetch quotes for every symbol of `universe`, `chunk_size` symbols per call.
pub async fn fetch_all(
    universe: &[String],
    chunk_size: usize,
    provider: &dyn QuoteProvider,
    options: &FetchOptions,
) -> Result<FetchOutcome, ScreenerError> {
    if options.concurrency == 0 {
        return Err(ValidationError::InvalidConcurrency(0).into());
    }
    let multiplier = options.retry.multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(ValidationError::InvalidBackoffMultiplier(multiplier).into());
    }
    let batches = chunk(universe, chunk_size)?;
    let chunks = chunk_count(universe.len(), chunk_size);
    let wanted: HashSet<&str> = universe.iter().map(String::as_str).collect();

    info!(
        provider = provider.name(),
        symbols = universe.len(),
        chunks,
        concurrency = options.concurrency,
        "fetching quotes"
    );

    let mut in_flight = stream::iter(batches.enumerate())
        .map(move |(index, batch)| async move {
            let result = fetch_chunk(provider, batch, options).await;
            (index, batch, result)
        })
        .buffer_unordered(options.concurrency);

    let mut records: HashMap<String, QuoteRecord> = HashMap::with_capacity(universe.len());
    while let Some((index, batch, result)) = in_flight.next().await {
        let quotes = match result {
            Ok(quotes) => quotes,
            Err(source) => {
                error!(chunk = index, error = %source, "chunk fetch failed, aborting run");
                return Err(ScreenerError::DataFetch {
                    symbols: batch.to_vec(),
                    source,
                });
            }
        };
        debug!(
            chunk = index,
            requested = batch.len(),
            returned = quotes.len(),
            "chunk fetched"
        );

        for (symbol, record) in quotes {
            if !wanted.contains(symbol.as_str()) {
                warn!(%symbol, "provider returned a symbol outside the universe, ignoring");
                continue;
            }
            match records.entry(symbol) {
                Entry::Occupied(e) => {
                    return Err(ScreenerError::DuplicateSymbol {
                        symbol: e.key().clone(),
                    })
                }
                Entry::Vacant(v) => {
                    v.insert(record);
                }
            }
        }
    }

    let quotes = MergedQuotes::new(universe, records);
    let omissions: Vec<Omission> = universe
        .iter()
        .filter(|s| quotes.get(s).is_none())
        .map(|s| {
            warn!(symbol = %s, "no data returned by provider, dropping");
            Omission::new(s.clone(), OmissionReason::NoData)
        })
        .collect();

    info!(
        fetched = quotes.len(),
        missing = omissions.len(),
        "quote fetch complete"
    );

    Ok(FetchOutcome {
        quotes,
        omissions,
        chunks,
    })
}

async fn fetch_chunk(
    provider: &dyn QuoteProvider,
    batch: &[String],
    options: &FetchOptions,
) -> Result<QuoteBatch, FetchError> {
    let retry = &options.retry;
    let mut attempt = 1;
    let mut backoff = retry.initial_backoff;

    loop {
        let result = match tokio::time::timeout(options.timeout, provider.fetch_quotes(batch)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(options.timeout)),
        };

        match result {
            Err(err) if err.is_transient() && attempt < retry.max_attempts => {
                warn!(
                    attempt,
                    max_attempts = retry.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "transient fetch failure, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = retry.next_backoff(backoff);
                attempt += 1;
            }
            other => return other,
        }
    }
}
