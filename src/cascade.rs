//! Filter cascade.
//!
//! Seven ordered rules evaluated against the latest feature snapshot.
//! The order is fixed and significant: the first failing stage wins, later
//! stages are never evaluated, and the rejection is attributed to that
//! stage's counter.

use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::indicators::FeatureSnapshot;

// ============================================================================
// Filter Stage
// ============================================================================

/// Cascade stage identifier, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterStage {
    /// Daily change below the momentum floor
    Momentum,
    /// Session did not close above its open
    CandleColor,
    /// Close below the 5- or 20-day moving average
    MaPosition,
    /// Too extended above the 20-day average
    Bias,
    /// Average volume below the liquidity floor, or weak relative volume
    Volume,
    /// Volatility not contracting enough
    Vcp,
    /// Stochastic %K below %D or above the ceiling
    Oscillator,
}

impl FilterStage {
    /// All stages in evaluation order.
    pub const ALL: [FilterStage; 7] = [
        Self::Momentum,
        Self::CandleColor,
        Self::MaPosition,
        Self::Bias,
        Self::Volume,
        Self::Vcp,
        Self::Oscillator,
    ];
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Momentum => write!(f, "漲幅"),
            Self::CandleColor => write!(f, "紅K"),
            Self::MaPosition => write!(f, "均線"),
            Self::Bias => write!(f, "乖離"),
            Self::Volume => write!(f, "量能"),
            Self::Vcp => write!(f, "VCP"),
            Self::Oscillator => write!(f, "KD"),
        }
    }
}

// ============================================================================
// Filter Outcome
// ============================================================================

/// Result of running the cascade for one symbol. Exactly one outcome per
/// evaluated symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOutcome {
    /// Every stage succeeded
    Passed,
    /// The first stage that failed
    RejectedAt(FilterStage),
}

impl FilterOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

// ============================================================================
// Filter Cascade
// ============================================================================

/// The seven-stage cascade, parameterized by external thresholds.
pub struct FilterCascade {
    config: FilterConfig,
}

impl FilterCascade {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Evaluate the cascade. Returns the first failing stage, or `Passed`.
    pub fn evaluate(&self, snap: &FeatureSnapshot) -> FilterOutcome {
        for stage in FilterStage::ALL {
            if !self.passes_stage(stage, snap) {
                return FilterOutcome::RejectedAt(stage);
            }
        }
        FilterOutcome::Passed
    }

    fn passes_stage(&self, stage: FilterStage, snap: &FeatureSnapshot) -> bool {
        let c = &self.config;
        match stage {
            FilterStage::Momentum => snap.change_pct >= c.min_change_pct,
            FilterStage::CandleColor => {
                !c.require_red_candle || snap.today_close > snap.today_open
            }
            FilterStage::MaPosition => {
                (!c.require_above_sma5 || snap.today_close >= snap.sma5)
                    && (!c.require_above_sma20 || snap.today_close >= snap.sma20)
            }
            FilterStage::Bias => snap.bias_pct <= c.max_bias_pct,
            FilterStage::Volume => {
                // Volume is in shares; the liquidity floor is in lots of 1000
                snap.vol_ma5 / 1000.0 >= c.min_avg_volume_lots
                    && snap.volume_ratio >= c.min_volume_ratio
            }
            FilterStage::Vcp => snap.vcp_ratio <= c.max_vcp_ratio,
            FilterStage::Oscillator => {
                snap.stoch_k > snap.stoch_d && snap.stoch_k < f64::from(c.max_k)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// A snapshot that passes every stage under the default thresholds.
    fn passing_snapshot() -> FeatureSnapshot {
        FeatureSnapshot {
            today_close: 110.0,
            today_open: 108.0,
            prev_close: 100.0,
            change_pct: 10.0,
            sma5: 105.0,
            sma20: 104.76,
            bias_pct: 5.0,
            vol_ma5: 5_000_000.0,
            volume_ratio: 2.0,
            stoch_k: 60.0,
            stoch_d: 50.0,
            atr_now: 1.8,
            atr_ma20: 2.0,
            vcp_ratio: 0.9,
        }
    }

    fn cascade() -> FilterCascade {
        FilterCascade::new(FilterConfig::default())
    }

    #[test]
    fn test_all_stages_pass() {
        assert_eq!(cascade().evaluate(&passing_snapshot()), FilterOutcome::Passed);
    }

    #[test]
    fn test_momentum_rejection() {
        let mut snap = passing_snapshot();
        snap.change_pct = 1.0;
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Momentum)
        );
    }

    #[test]
    fn test_candle_color_rejection() {
        let mut snap = passing_snapshot();
        snap.today_open = 110.0; // closed flat, not above open
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::CandleColor)
        );
    }

    #[test]
    fn test_candle_color_toggle_off() {
        let mut config = FilterConfig::default();
        config.require_red_candle = false;
        let mut snap = passing_snapshot();
        snap.today_open = 111.0;
        assert_eq!(
            FilterCascade::new(config).evaluate(&snap),
            FilterOutcome::Passed
        );
    }

    #[test]
    fn test_ma_position_rejection_either_average() {
        let mut snap = passing_snapshot();
        snap.sma5 = 111.0; // below short average only
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::MaPosition)
        );

        let mut snap = passing_snapshot();
        snap.sma20 = 111.0; // below long average only
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::MaPosition)
        );
    }

    #[test]
    fn test_bias_rejection() {
        let mut snap = passing_snapshot();
        snap.bias_pct = 9.0;
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Bias)
        );
    }

    #[test]
    fn test_volume_rejection_liquidity_floor() {
        let mut snap = passing_snapshot();
        snap.vol_ma5 = 2_000_000.0; // 2000 lots < 3000
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Volume)
        );
    }

    #[test]
    fn test_volume_rejection_weak_ratio() {
        let mut snap = passing_snapshot();
        snap.volume_ratio = 1.2;
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Volume)
        );
    }

    #[test]
    fn test_vcp_rejection() {
        let mut snap = passing_snapshot();
        snap.vcp_ratio = 1.3;
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Vcp)
        );
    }

    #[test]
    fn test_oscillator_rejection_overbought() {
        // Identical to the passing case except %K breaches the ceiling
        let mut snap = passing_snapshot();
        snap.stoch_k = 85.0;
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Oscillator)
        );
    }

    #[test]
    fn test_oscillator_rejection_k_below_d() {
        let mut snap = passing_snapshot();
        snap.stoch_k = 45.0;
        snap.stoch_d = 50.0;
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Oscillator)
        );
    }

    #[test]
    fn test_short_circuit_earliest_stage_wins() {
        // Fails both momentum and bias; only the earlier stage is reported
        let mut snap = passing_snapshot();
        snap.change_pct = 0.5;
        snap.bias_pct = 12.0;
        assert_eq!(
            cascade().evaluate(&snap),
            FilterOutcome::RejectedAt(FilterStage::Momentum)
        );
    }

    #[test]
    fn test_stage_order_is_fixed() {
        assert_eq!(FilterStage::ALL[0], FilterStage::Momentum);
        assert_eq!(FilterStage::ALL[6], FilterStage::Oscillator);
    }
}
