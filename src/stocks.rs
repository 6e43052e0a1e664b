//! Quote records and the market-data provider seam.
//!
//! This module handles:
//! - The per-symbol quote record produced by a batch fetch
//! - The tracked return horizons
//! - The `QuoteProvider` trait the batch fetcher calls once per chunk
//! - An IEX Cloud implementation using the `stock/market/batch` endpoint

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

/// Trailing window over which a price return is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    OneMonth,
    ThreeMonth,
    SixMonth,
    OneYear,
}

impl Period {
    /// All tracked horizons, longest first (the order they are reported in).
    pub const ALL: [Period; 4] = [
        Period::OneYear,
        Period::SixMonth,
        Period::ThreeMonth,
        Period::OneMonth,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Period::OneMonth => "One-Month",
            Period::ThreeMonth => "Three-Month",
            Period::SixMonth => "Six-Month",
            Period::OneYear => "One-Year",
        }
    }

    /// Key of this horizon in the provider's `stats` payload.
    pub fn provider_field(&self) -> &'static str {
        match self {
            Period::OneMonth => "month1ChangePercent",
            Period::ThreeMonth => "month3ChangePercent",
            Period::SixMonth => "month6ChangePercent",
            Period::OneYear => "year1ChangePercent",
        }
    }
}

/// What the provider knows about one symbol. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub returns: BTreeMap<Period, f64>,
}

impl QuoteRecord {
    pub fn period_return(&self, period: Period) -> Option<f64> {
        self.returns.get(&period).copied()
    }
}

/// Symbol → record mapping for one provider call.
pub type QuoteBatch = HashMap<String, QuoteRecord>;

/// Source of quotes. One call serves one chunk of the universe.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch quotes for every symbol in `symbols` in a single request.
    ///
    /// Symbols the provider has nothing for are simply absent from the result.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<QuoteBatch, FetchError>;
}

/// IEX Cloud batch quote/stats endpoint.
pub struct IexCloudProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl IexCloudProvider {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            token: token.into(),
            timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl QuoteProvider for IexCloudProvider {
    fn name(&self) -> &str {
        "iex-cloud"
    }

    async fn fetch_quotes(&self, symbols: &[String]) -> Result<QuoteBatch, FetchError> {
        let joined = symbols.join(",");
        let url = format!("{}/stock/market/batch", self.base_url);
        debug!(count = symbols.len(), "requesting quote batch");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("types", "stats,quote"),
                ("symbols", joined.as_str()),
                ("token", self.token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;
        parse_batch_response(&json)
    }
}

/// Decode a batch response: an object keyed by symbol, each entry holding a
/// `quote` and a `stats` object.
pub fn parse_batch_response(json: &Value) -> Result<QuoteBatch, FetchError> {
    let entries = json.as_object().ok_or_else(|| {
        FetchError::MalformedResponse("expected an object keyed by symbol".into())
    })?;

    let mut batch = QuoteBatch::with_capacity(entries.len());
    for (symbol, entry) in entries {
        if !entry.is_object() {
            return Err(FetchError::MalformedResponse(format!(
                "entry for {symbol} is not an object"
            )));
        }
        let quote = &entry["quote"];
        let stats = &entry["stats"];

        let returns = Period::ALL
            .iter()
            .filter_map(|p| stats[p.provider_field()].as_f64().map(|v| (*p, v)))
            .collect();

        batch.insert(
            symbol.clone(),
            QuoteRecord {
                price: quote["latestPrice"].as_f64(),
                market_cap: quote["marketCap"].as_f64(),
                returns,
            },
        );
    }
    Ok(batch)
}
