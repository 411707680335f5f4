//! Yahoo Finance chart API data source.
//!
//! Fetches daily OHLCV bars from the unauthenticated v8 chart endpoint,
//! one request per symbol within a batch. Symbols Yahoo does not know are
//! simply absent from the returned map; a transport failure fails the
//! whole batch so the engine can count and skip it.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::debug;

use super::provider::{MarketDataSource, ProviderError};
use super::{PriceBar, PriceSeries};

// ============================================================================
// Constants
// ============================================================================

/// Chart API base URL
const CHART_API_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Per-request timeout
const REQUEST_TIMEOUT_SECS: u64 = 15;

// ============================================================================
// Response Payload
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

/// OHLCV arrays; entries are `null` for sessions with missing data.
#[derive(Debug, Deserialize)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

// ============================================================================
// Yahoo Chart Source
// ============================================================================

/// Daily-bar source backed by the Yahoo Finance chart API.
pub struct YahooChartSource {
    client: reqwest::Client,
    base_url: String,
}

impl Default for YahooChartSource {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooChartSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: CHART_API_BASE.to_string(),
        }
    }

    /// Point the source at a different endpoint (for tests).
    #[cfg(test)]
    fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch bars for one symbol. `Ok(None)` means the symbol is unknown or
    /// has no usable data; the caller treats it as a partial-batch miss.
    async fn fetch_one(
        &self,
        code: &str,
        window_days: u32,
    ) -> Result<Option<PriceSeries>, ProviderError> {
        let url = format!(
            "{}/{}?range={}d&interval=1d",
            self.base_url, code, window_days
        );

        let response = self
            .client
            .get(&url)
            .header("user-agent", "Mozilla/5.0")
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        // 404 means Yahoo does not know the symbol; not a batch failure
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "yahoo returned status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        parse_chart_body(code, &body)
    }
}

/// Parse one chart response body into a price series.
fn parse_chart_body(code: &str, body: &str) -> Result<Option<PriceSeries>, ProviderError> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Unavailable(format!("failed to parse chart payload: {}", e)))?;

    if response.chart.error.as_ref().is_some_and(|e| !e.is_null()) {
        // Symbol-level API error (delisted, unknown); treated as missing
        debug!(code, "chart API reported an error for symbol");
        return Ok(None);
    }

    let Some(result) = response.chart.result.as_ref().and_then(|r| r.first()) else {
        return Ok(None);
    };

    let Some(timestamps) = result.timestamp.as_ref() else {
        return Ok(None);
    };

    let Some(quote) = result.indicators.quote.first() else {
        return Ok(None);
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(date) = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };

        // Only keep sessions with all OHLCV values present
        if let (
            Some(Some(open)),
            Some(Some(high)),
            Some(Some(low)),
            Some(Some(close)),
            Some(Some(volume)),
        ) = (
            quote.open.get(i),
            quote.high.get(i),
            quote.low.get(i),
            quote.close.get(i),
            quote.volume.get(i),
        ) {
            bars.push(PriceBar {
                date,
                open: *open,
                high: *high,
                low: *low,
                close: *close,
                volume: *volume,
            });
        }
    }

    Ok(PriceSeries::new(code, bars))
}

#[async_trait]
impl MarketDataSource for YahooChartSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_batch(
        &self,
        codes: &[String],
        window_days: u32,
    ) -> Result<HashMap<String, PriceSeries>, ProviderError> {
        let mut out = HashMap::with_capacity(codes.len());

        for code in codes {
            match self.fetch_one(code, window_days).await? {
                Some(series) => {
                    out.insert(code.clone(), series);
                }
                None => {
                    debug!(code, "no usable chart data, skipping symbol");
                }
            }
        }

        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
