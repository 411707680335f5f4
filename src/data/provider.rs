//! Data source abstraction for batched OHLCV retrieval.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use super::PriceSeries;

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to external data retrieval.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Provider is temporarily unavailable (bad status, malformed payload)
    Unavailable(String),
    /// Invalid request parameters
    InvalidRequest(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Market Data Source Trait
// ============================================================================

/// Trait for batched daily-bar retrieval.
///
/// The engine tolerates partial batches: codes missing from the returned map
/// are treated as insufficient history, not as a batch failure. An `Err`
/// fails the whole batch.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name for logs (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch daily bars for every code in the batch over the trailing
    /// `window_days` window.
    async fn fetch_batch(
        &self,
        codes: &[String],
        window_days: u32,
    ) -> Result<HashMap<String, PriceSeries>, ProviderError>;
}
