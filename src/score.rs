//! Scoring and risk-level derivation for symbols that passed every stage.
//!
//! The composite score rewards momentum and relative volume and penalizes
//! extension above the 20-bar average; it is intra-scan relative only, with
//! no normalization against peers. Risk levels pair a volatility-based stop
//! with a structural swing-low floor and a fixed 2:1 target.

use crate::data::PriceSeries;
use crate::indicators::FeatureSnapshot;

/// Swing-low look-back for the structural stop floor.
const SWING_LOW_WINDOW: usize = 10;

/// Buffer below the swing low (1%).
const SWING_LOW_BUFFER: f64 = 0.99;

/// Reward-to-risk multiple for the take-profit level.
const REWARD_RISK_MULTIPLE: f64 = 2.0;

/// Derived risk levels for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct RiskLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Scorer and risk calculator.
pub struct Scorer {
    atr_multiplier: f64,
}

impl Scorer {
    pub fn new(atr_multiplier: f64) -> Self {
        Self { atr_multiplier }
    }

    /// Composite rank score:
    /// `changePct * 0.4 + volumeRatio * 4 + (10 - biasPct)`.
    ///
    /// The bias term goes negative for symbols close to the bias ceiling;
    /// that is the intended penalty, not a clamp candidate.
    pub fn score(&self, snap: &FeatureSnapshot) -> f64 {
        snap.change_pct * 0.4 + snap.volume_ratio * 4.0 + (10.0 - snap.bias_pct)
    }

    /// Stop-loss and take-profit for a passing symbol.
    ///
    /// The stop is the tighter (higher) of the ATR stop and the 10-bar
    /// swing low less a 1% buffer, so it never sits below recent support;
    /// the target is a fixed 2:1 reward-to-risk from the entry price.
    pub fn risk_levels(&self, snap: &FeatureSnapshot, series: &PriceSeries) -> RiskLevels {
        let price = snap.today_close;
        let atr_stop = price - snap.atr_now * self.atr_multiplier;
        let swing_floor = series.min_low(SWING_LOW_WINDOW) * SWING_LOW_BUFFER;

        let stop_loss = atr_stop.max(swing_floor);
        let take_profit = price + (price - stop_loss) * REWARD_RISK_MULTIPLE;

        RiskLevels {
            stop_loss,
            take_profit,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
