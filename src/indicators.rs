//! Indicator engine.
//!
//! Computes the derived feature snapshot for the most recent bar of a price
//! series: moving averages, bias, volume features, Wilder-smoothed ATR with
//! its 20-bar average (the volatility-contraction ratio), and the stochastic
//! oscillator. Pure functions of the input series and fixed window constants;
//! nothing here touches the network or mutates state.

use serde::{Deserialize, Serialize};

use crate::data::{PriceBar, PriceSeries};
use crate::error::ScanError;

// ============================================================================
// Window Constants
// ============================================================================

/// Minimum bars of history before the latest snapshot is trusted.
///
/// The longest-window indicator is the 20-bar average of the 14-period ATR,
/// which needs 33 bars to fully form; 35 leaves the warm-up behind.
pub const MIN_HISTORY: usize = 35;

/// Short moving-average window
const SMA_SHORT: usize = 5;

/// Long moving-average window
const SMA_LONG: usize = 20;

/// Volume moving-average window
const VOL_MA_WINDOW: usize = 5;

/// ATR smoothing period (Wilder)
const ATR_PERIOD: usize = 14;

/// Window for the simple mean of the ATR series
const ATR_MA_WINDOW: usize = 20;

/// Stochastic oscillator look-back
const STOCH_PERIOD: usize = 9;

/// Stochastic %D smoothing window
const STOCH_SIGNAL: usize = 3;

// ============================================================================
// Feature Snapshot
// ============================================================================

/// Derived scalar features for the most recent bar of a series.
///
/// Never persisted; recomputed per scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub today_close: f64,
    pub today_open: f64,
    pub prev_close: f64,
    /// Close-to-close change (%)
    pub change_pct: f64,
    pub sma5: f64,
    pub sma20: f64,
    /// Deviation of close from the 20-bar average (%)
    pub bias_pct: f64,
    /// 5-bar average volume, in shares
    pub vol_ma5: f64,
    /// Today's volume relative to the 5-bar average
    pub volume_ratio: f64,
    /// Stochastic %K (period 9)
    pub stoch_k: f64,
    /// Stochastic %D (3-bar SMA of raw %K)
    pub stoch_d: f64,
    /// 14-period Wilder ATR at the latest bar
    pub atr_now: f64,
    /// Simple mean of the ATR series over the trailing 20 bars
    pub atr_ma20: f64,
    /// atr_now / atr_ma20; values below 1 indicate contraction
    pub vcp_ratio: f64,
}

/// Compute the feature snapshot for the most recent bar.
pub fn compute(series: &PriceSeries) -> Result<FeatureSnapshot, ScanError> {
    let bars = series.bars();
    let n = bars.len();

    if n < MIN_HISTORY {
        return Err(ScanError::InsufficientHistory {
            have: n,
            need: MIN_HISTORY,
        });
    }

    let today = &bars[n - 1];
    let prev = &bars[n - 2];

    if prev.close == 0.0 {
        return Err(ScanError::Computation(
            "previous close is zero".to_string(),
        ));
    }
    let change_pct = (today.close - prev.close) / prev.close * 100.0;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let sma5 = mean(&closes[n - SMA_SHORT..]);
    let sma20 = mean(&closes[n - SMA_LONG..]);
    if sma20 == 0.0 {
        return Err(ScanError::Computation("20-bar average is zero".to_string()));
    }
    let bias_pct = (today.close - sma20) / sma20 * 100.0;

    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let vol_ma5 = mean(&volumes[n - VOL_MA_WINDOW..]);
    if vol_ma5 == 0.0 {
        return Err(ScanError::Computation(
            "5-bar average volume is zero".to_string(),
        ));
    }
    let volume_ratio = today.volume / vol_ma5;

    // Stochastic %K at the latest bar and %D over its last three raw values.
    // A zero-range window anywhere in the signal makes the oscillator
    // undefined, never a silent zero.
    let mut raw_k = [0.0; STOCH_SIGNAL];
    for (j, slot) in raw_k.iter_mut().enumerate() {
        let i = n - STOCH_SIGNAL + j;
        *slot = raw_stoch_k(bars, i).ok_or_else(|| {
            ScanError::Computation("zero-range stochastic window".to_string())
        })?;
    }
    let stoch_k = raw_k[STOCH_SIGNAL - 1];
    let stoch_d = mean(&raw_k);

    let atr = wilder_atr(bars, ATR_PERIOD);
    let atr_now = atr[n - 1];
    let atr_tail = &atr[n - ATR_MA_WINDOW..];
    if atr_tail.iter().any(|v| !v.is_finite()) {
        // Unreachable at MIN_HISTORY bars; kept as a computation guard
        return Err(ScanError::Computation(
            "ATR window not fully formed".to_string(),
        ));
    }
    let atr_ma20 = mean(atr_tail);
    if atr_ma20 <= 0.0 {
        return Err(ScanError::Computation(
            "20-bar ATR average is zero".to_string(),
        ));
    }
    let vcp_ratio = atr_now / atr_ma20;

    Ok(FeatureSnapshot {
        today_close: today.close,
        today_open: today.open,
        prev_close: prev.close,
        change_pct,
        sma5,
        sma20,
        bias_pct,
        vol_ma5,
        volume_ratio,
        stoch_k,
        stoch_d,
        atr_now,
        atr_ma20,
        vcp_ratio,
    })
}

// ============================================================================
// Internals
// ============================================================================

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// True range: max(H-L, |H-prev_close|, |L-prev_close|).
#[inline]
fn true_range(bar: &PriceBar, prev_close: f64) -> f64 {
    let hl = bar.high - bar.low;
    let hc = (bar.high - prev_close).abs();
    let lc = (bar.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Wilder-smoothed ATR series, aligned to the input bars.
///
/// The first `period - 1` entries are NaN warm-up; the seed at index
/// `period - 1` is the simple mean of the first `period` true ranges, then
/// ATR[i] = (ATR[i-1] * (period-1) + TR[i]) / period.
fn wilder_atr(bars: &[PriceBar], period: usize) -> Vec<f64> {
    let n = bars.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let mut tr = vec![0.0; n];
    tr[0] = bars[0].high - bars[0].low; // no previous close for the first bar
    for i in 1..n {
        tr[i] = true_range(&bars[i], bars[i - 1].close);
    }

    let seed = tr[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;
    for i in period..n {
        result[i] = (result[i - 1] * (period - 1) as f64 + tr[i]) / period as f64;
    }

    result
}

/// Raw stochastic %K at bar `i`, or `None` when the look-back window has
/// zero range.
fn raw_stoch_k(bars: &[PriceBar], i: usize) -> Option<f64> {
    let window = &bars[i + 1 - STOCH_PERIOD..=i];
    let low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let high = window
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);

    let range = high - low;
    if range <= 0.0 {
        return None;
    }

    Some((bars[i].close - low) / range * 100.0)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Duration::days(day),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A quiet series: close 100, range 99-101, volume 1000.
    fn flat_bars(n: usize) -> Vec<PriceBar> {
        (0..n)
            .map(|i| make_bar(i as i64, 99.5, 101.0, 99.0, 100.0, 1000.0))
            .collect()
    }

    fn series(bars: Vec<PriceBar>) -> PriceSeries {
        PriceSeries::new("TEST.TW", bars).unwrap()
    }

    #[test]
    fn test_flat_series_snapshot() {
        let snap = compute(&series(flat_bars(40))).unwrap();

        assert!((snap.change_pct - 0.0).abs() < 1e-9);
        assert!((snap.sma5 - 100.0).abs() < 1e-9);
        assert!((snap.sma20 - 100.0).abs() < 1e-9);
        assert!((snap.bias_pct - 0.0).abs() < 1e-9);
        assert!((snap.vol_ma5 - 1000.0).abs() < 1e-9);
        assert!((snap.volume_ratio - 1.0).abs() < 1e-9);
        // TR is 2.0 on every bar, so ATR and its average stay at 2.0
        assert!((snap.atr_now - 2.0).abs() < 1e-9);
        assert!((snap.atr_ma20 - 2.0).abs() < 1e-9);
        assert!((snap.vcp_ratio - 1.0).abs() < 1e-9);
        // Close sits at the middle of the 99-101 range
        assert!((snap.stoch_k - 50.0).abs() < 1e-9);
        assert!((snap.stoch_d - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakout_tail_snapshot() {
        let mut bars = flat_bars(40);
        bars[39] = make_bar(39, 100.5, 103.5, 100.0, 103.0, 9000.0);
        let snap = compute(&series(bars)).unwrap();

        assert!((snap.change_pct - 3.0).abs() < 1e-9);
        assert!((snap.sma5 - 100.6).abs() < 1e-9);
        assert!((snap.sma20 - 100.15).abs() < 1e-9);
        assert!((snap.bias_pct - (103.0 - 100.15) / 100.15 * 100.0).abs() < 1e-9);
        assert!((snap.vol_ma5 - 2600.0).abs() < 1e-9);
        assert!((snap.volume_ratio - 9000.0 / 2600.0).abs() < 1e-9);
        // Breakout bar TR = max(3.5, |103.5-100|, |100-100|) = 3.5
        assert!((snap.atr_now - (2.0 * 13.0 + 3.5) / 14.0).abs() < 1e-9);
        // %K: (103 - 99) / (103.5 - 99) * 100
        assert!((snap.stoch_k - 4.0 / 4.5 * 100.0).abs() < 1e-9);
        // %D averages two flat 50s with the breakout %K
        assert!((snap.stoch_d - (50.0 + 50.0 + 4.0 / 4.5 * 100.0) / 3.0).abs() < 1e-9);
        // Expansion, not contraction
        assert!(snap.vcp_ratio > 1.0);
        assert!(snap.stoch_k > snap.stoch_d);
    }

    #[test]
    fn test_insufficient_history() {
        let err = compute(&series(flat_bars(20))).unwrap_err();
        assert!(matches!(
            err,
            ScanError::InsufficientHistory { have: 20, need: 35 }
        ));
    }

    #[test]
    fn test_boundary_history_is_enough() {
        assert!(compute(&series(flat_bars(35))).is_ok());
        assert!(compute(&series(flat_bars(34))).is_err());
    }

    #[test]
    fn test_zero_range_is_computation_error() {
        // Completely frozen series: no high-low range at all
        let bars: Vec<PriceBar> = (0..40)
            .map(|i| make_bar(i, 100.0, 100.0, 100.0, 100.0, 1000.0))
            .collect();
        let err = compute(&series(bars)).unwrap_err();
        assert!(matches!(err, ScanError::Computation(_)));
    }

    #[test]
    fn test_zero_volume_is_computation_error() {
        let bars: Vec<PriceBar> = (0..40)
            .map(|i| make_bar(i, 99.5, 101.0, 99.0, 100.0, 0.0))
            .collect();
        let err = compute(&series(bars)).unwrap_err();
        assert!(matches!(err, ScanError::Computation(_)));
    }

    #[test]
    fn test_true_range_gaps() {
        let bar = make_bar(0, 110.0, 115.0, 108.0, 112.0, 0.0);
        // Gap up: distance to previous close dominates
        assert!((true_range(&bar, 100.0) - 15.0).abs() < 1e-9);

        let bar = make_bar(0, 90.0, 92.0, 85.0, 88.0, 0.0);
        // Gap down
        assert!((true_range(&bar, 100.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_wilder_atr_seed_and_recursion() {
        let bars = vec![
            make_bar(0, 100.0, 102.0, 98.0, 101.0, 0.0), // TR = 4
            make_bar(1, 101.0, 104.0, 99.0, 103.0, 0.0), // TR = 5
            make_bar(2, 103.0, 106.0, 101.0, 105.0, 0.0), // TR = 5
            make_bar(3, 105.0, 108.0, 103.0, 107.0, 0.0), // TR = 5
        ];
        let atr = wilder_atr(&bars, 3);

        assert!(atr[0].is_nan());
        assert!(atr[1].is_nan());
        // Seed: (4 + 5 + 5) / 3
        assert!((atr[2] - 14.0 / 3.0).abs() < 1e-9);
        // Recursion: (seed * 2 + 5) / 3
        assert!((atr[3] - (14.0 / 3.0 * 2.0 + 5.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_wilder_atr_short_input() {
        let bars = flat_bars(2);
        let atr = wilder_atr(&bars, 5);
        assert!(atr.iter().all(|v| v.is_nan()));
    }
}
