//! Market data types and sources.
//!
//! Daily OHLCV bars per symbol over a trailing window, fetched in batches.
//! The pipeline is retrieval-agnostic: anything implementing
//! [`MarketDataSource`] can feed the scan engine.

mod provider;
mod yahoo;

pub use provider::{MarketDataSource, ProviderError};
pub use yahoo::YahooChartSource;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Core Data Types
// ============================================================================

/// One daily OHLCV bar. Immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading session date
    pub date: NaiveDate,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume in shares
    pub volume: f64,
}

impl PriceBar {
    /// Whether every field is a finite number.
    pub fn is_complete(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }

    /// Whether the session closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Full session range (high - low).
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Chronologically ordered daily bars for one symbol, oldest first.
///
/// Invariant: strictly increasing dates, length >= 1, no NaN bars. Bars
/// with missing values are dropped at construction, matching how the data
/// source drops them before they reach the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    /// Symbol code (e.g., "2330.TW")
    pub code: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series from raw bars: incomplete bars are dropped, the rest
    /// are sorted by date and deduplicated (last bar wins for a date).
    ///
    /// Returns `None` when no complete bar remains.
    pub fn new(code: impl Into<String>, mut bars: Vec<PriceBar>) -> Option<Self> {
        bars.retain(PriceBar::is_complete);
        if bars.is_empty() {
            return None;
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);

        Some(Self {
            code: code.into(),
            bars,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    /// The most recent bar.
    pub fn last(&self) -> &PriceBar {
        self.bars.last().expect("series is never empty")
    }

    /// Lowest low over the trailing `n` bars (fewer if the series is short).
    pub fn min_low(&self, n: usize) -> f64 {
        let start = self.bars.len().saturating_sub(n);
        self.bars[start..]
            .iter()
            .map(|b| b.low)
            .fold(f64::INFINITY, f64::min)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> PriceBar {
        PriceBar {
            date,
            open: close - 0.5,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_series_sorts_and_dedups() {
        let bars = vec![bar(day(3), 103.0), bar(day(1), 101.0), bar(day(3), 104.0)];
        let series = PriceSeries::new("2330.TW", bars).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].date, day(1));
        assert_eq!(series.last().date, day(3));
    }

    #[test]
    fn test_series_drops_nan_bars() {
        let mut bad = bar(day(2), 102.0);
        bad.close = f64::NAN;
        let series = PriceSeries::new("2330.TW", vec![bar(day(1), 101.0), bad]).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_series_all_nan_is_none() {
        let mut bad = bar(day(1), 100.0);
        bad.volume = f64::NAN;
        assert!(PriceSeries::new("2330.TW", vec![bad]).is_none());
        assert!(PriceSeries::new("2330.TW", vec![]).is_none());
    }

    #[test]
    fn test_min_low() {
        let bars = (1..=12).map(|d| bar(day(d), 100.0 + d as f64)).collect();
        let series = PriceSeries::new("2330.TW", bars).unwrap();

        // Trailing 10 bars start at close 103 -> low 102
        assert!((series.min_low(10) - 102.0).abs() < 1e-9);
        // Larger window than series falls back to the whole series
        assert!((series.min_low(100) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_bar_helpers() {
        let b = PriceBar {
            date: day(1),
            open: 10.0,
            high: 12.0,
            low: 9.5,
            close: 11.0,
            volume: 1000.0,
        };
        assert!(b.is_bullish());
        assert!((b.range() - 2.5).abs() < 1e-9);
        assert!(b.is_complete());
    }
}
