//! Scan engine.
//!
//! The central orchestrator for a full universe scan: pulls the symbol
//! universe once, walks it in fixed-size batches, runs the indicator engine
//! and filter cascade per symbol, scores the survivors, and produces the
//! ranked candidate list plus the statistics record.
//!
//! Per-symbol and per-batch failures are recovered locally and converted
//! into statistics; nothing aborts a running scan. The only fatal condition
//! is an invalid configuration, rejected before any network access.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cascade::{FilterCascade, FilterOutcome, FilterStage};
use crate::config::ScanConfig;
use crate::data::MarketDataSource;
use crate::error::ScanError;
use crate::indicators;
use crate::score::Scorer;
use crate::universe::{Universe, UniverseCache, UniverseProvider};

// ============================================================================
// Scan Statistics
// ============================================================================

/// Per-scan counters. Owned exclusively by the engine while the scan runs.
///
/// Invariant: `scanned == fail + rejected_total() + passed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Symbols attempted (including symbols of failed batches)
    pub scanned: u64,
    /// Symbols skipped before the cascade: batch failures, short history,
    /// computation errors
    pub fail: u64,
    /// Symbols that passed every stage
    pub passed: u64,
    /// Stage rejections, one counter per cascade stage
    pub r_momentum: u64,
    pub r_candle: u64,
    pub r_ma: u64,
    pub r_bias: u64,
    pub r_volume: u64,
    pub r_vcp: u64,
    pub r_kd: u64,
}

impl ScanStats {
    /// Attribute a rejection to its stage counter.
    pub fn record_rejection(&mut self, stage: FilterStage) {
        match stage {
            FilterStage::Momentum => self.r_momentum += 1,
            FilterStage::CandleColor => self.r_candle += 1,
            FilterStage::MaPosition => self.r_ma += 1,
            FilterStage::Bias => self.r_bias += 1,
            FilterStage::Volume => self.r_volume += 1,
            FilterStage::Vcp => self.r_vcp += 1,
            FilterStage::Oscillator => self.r_kd += 1,
        }
    }

    /// Rejection count for one stage.
    pub fn stage_count(&self, stage: FilterStage) -> u64 {
        match stage {
            FilterStage::Momentum => self.r_momentum,
            FilterStage::CandleColor => self.r_candle,
            FilterStage::MaPosition => self.r_ma,
            FilterStage::Bias => self.r_bias,
            FilterStage::Volume => self.r_volume,
            FilterStage::Vcp => self.r_vcp,
            FilterStage::Oscillator => self.r_kd,
        }
    }

    /// Total rejections across all cascade stages.
    pub fn rejected_total(&self) -> u64 {
        FilterStage::ALL
            .iter()
            .map(|&stage| self.stage_count(stage))
            .sum()
    }

    /// Whether the conservation invariant holds.
    pub fn is_conserved(&self) -> bool {
        self.scanned == self.fail + self.rejected_total() + self.passed
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// A symbol that passed every filter stage in one scan. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Symbol code (e.g., "2330.TW")
    pub code: String,
    /// Display name
    pub name: String,
    /// Latest close price
    pub price: f64,
    /// Daily change (%)
    pub change_pct: f64,
    /// Deviation from the 20-day average (%)
    pub bias_pct: f64,
    /// Volatility contraction ratio
    pub vcp_ratio: f64,
    /// 5-day average volume, in shares
    pub vol_ma5: f64,
    /// Composite rank score
    pub score: f64,
    /// Stop-loss level
    pub stop_loss: f64,
    /// Take-profit level
    pub take_profit: f64,
}

/// Sort candidates by score descending, ties broken by code ascending, and
/// keep the top `top_n`. The tie-break keeps repeated scans deterministic.
fn rank(mut candidates: Vec<Candidate>, top_n: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.code.cmp(&b.code))
    });
    candidates.truncate(top_n);
    candidates
}

// ============================================================================
// Scan Result
// ============================================================================

/// Result of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Scan ID (timestamp-based)
    pub id: String,
    /// Ranked candidates, at most `top_n`
    pub candidates: Vec<Candidate>,
    /// Statistics record
    pub stats: ScanStats,
    /// Size of the universe the scan walked. Zero distinguishes an
    /// unreachable universe from filters that were simply too strict.
    pub universe_size: usize,
    /// Threshold summary used for this scan
    pub config_summary: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub completed_at: DateTime<Utc>,
    /// Duration in seconds
    pub duration_secs: f64,
}

impl ScanResult {
    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} symbols in {:.1}s: {} passed, {} rejected, {} failed",
            self.stats.scanned,
            self.duration_secs,
            self.stats.passed,
            self.stats.rejected_total(),
            self.stats.fail
        )
    }
}

// ============================================================================
// Scan Engine
// ============================================================================

/// The scan orchestrator.
///
/// Single-threaded, sequential batch processing: batching bounds external
/// request size and isolates fetch failures, it is not a concurrency
/// mechanism.
pub struct ScanEngine<U: UniverseProvider, D: MarketDataSource> {
    config: ScanConfig,
    universe_provider: Arc<U>,
    universe_cache: Arc<UniverseCache>,
    data_source: Arc<D>,
    cascade: FilterCascade,
    scorer: Scorer,
}

impl<U: UniverseProvider, D: MarketDataSource> ScanEngine<U, D> {
    pub fn new(
        config: ScanConfig,
        universe_provider: Arc<U>,
        universe_cache: Arc<UniverseCache>,
        data_source: Arc<D>,
    ) -> Self {
        let cascade = FilterCascade::new(config.filters.clone());
        let scorer = Scorer::new(config.atr_multiplier);

        Self {
            config,
            universe_provider,
            universe_cache,
            data_source,
            cascade,
            scorer,
        }
    }

    /// Run one full scan.
    ///
    /// Fails only on an invalid configuration; every other error is
    /// recovered locally and reflected in the statistics.
    pub async fn run_scan(&self) -> Result<ScanResult, ScanError> {
        self.config.validate()?;

        let started_at = Utc::now();
        let id = format!("scan_{}", started_at.format("%Y%m%d_%H%M%S"));

        info!(scan_id = %id, "Starting breakout scan");

        let universe = self.load_universe().await;
        let codes = universe.codes();
        let names = universe.name_index();

        info!(scan_id = %id, universe = codes.len(), "Universe resolved");

        let mut stats = ScanStats::default();
        let mut candidates = Vec::new();

        let batches: Vec<&[String]> = codes.chunks(self.config.batch_size).collect();
        let batch_count = batches.len();

        for (batch_idx, batch) in batches.into_iter().enumerate() {
            let series_map = match self
                .data_source
                .fetch_batch(batch, self.config.window_days)
                .await
            {
                Ok(map) if !map.is_empty() => map,
                Ok(_) => {
                    warn!(batch = batch_idx, size = batch.len(), "Batch returned no data, skipping");
                    stats.scanned += batch.len() as u64;
                    stats.fail += batch.len() as u64;
                    continue;
                }
                Err(e) => {
                    let err = ScanError::BatchFetch(e.to_string());
                    warn!(batch = batch_idx, size = batch.len(), error = %err, "Batch fetch failed, skipping");
                    stats.scanned += batch.len() as u64;
                    stats.fail += batch.len() as u64;
                    continue;
                }
            };

            for code in batch {
                stats.scanned += 1;

                // A code missing from a partial batch is short history
                let Some(series) = series_map.get(code) else {
                    stats.fail += 1;
                    continue;
                };

                let snap = match indicators::compute(series) {
                    Ok(snap) => snap,
                    Err(e) => {
                        debug!(code, error = %e, "Symbol skipped before cascade");
                        stats.fail += 1;
                        continue;
                    }
                };

                match self.cascade.evaluate(&snap) {
                    FilterOutcome::RejectedAt(stage) => {
                        stats.record_rejection(stage);
                    }
                    FilterOutcome::Passed => {
                        let score = self.scorer.score(&snap);
                        let levels = self.scorer.risk_levels(&snap, series);

                        candidates.push(Candidate {
                            code: code.clone(),
                            name: names
                                .get(code.as_str())
                                .copied()
                                .unwrap_or(code.as_str())
                                .to_string(),
                            price: snap.today_close,
                            change_pct: snap.change_pct,
                            bias_pct: snap.bias_pct,
                            vcp_ratio: snap.vcp_ratio,
                            vol_ma5: snap.vol_ma5,
                            score,
                            stop_loss: levels.stop_loss,
                            take_profit: levels.take_profit,
                        });
                        stats.passed += 1;
                    }
                }
            }

            // Courtesy pause toward the data source; not part of correctness
            if self.config.batch_pause_ms > 0 && batch_idx + 1 < batch_count {
                tokio::time::sleep(Duration::from_millis(self.config.batch_pause_ms)).await;
            }
        }

        let candidates = rank(candidates, self.config.top_n);

        let completed_at = Utc::now();
        let duration_secs = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let result = ScanResult {
            id,
            candidates,
            stats,
            universe_size: codes.len(),
            config_summary: self.config.summary(),
            started_at,
            completed_at,
            duration_secs,
        };

        info!(
            scan_id = %result.id,
            candidates = result.candidates.len(),
            "{}",
            result.summary()
        );

        Ok(result)
    }

    /// Resolve the universe: cache first, then the provider. Provider
    /// failure degrades to an empty universe with a warning.
    async fn load_universe(&self) -> Universe {
        if let Some(universe) = self.universe_cache.get() {
            debug!(size = universe.len(), "Universe served from cache");
            return universe;
        }

        match self.universe_provider.fetch().await {
            Ok(universe) => {
                self.universe_cache.set(universe.clone());
                universe
            }
            Err(e) => {
                warn!(
                    provider = self.universe_provider.name(),
                    error = %ScanError::UniverseUnavailable(e.to_string()),
                    "Universe provider failed, degrading to an empty universe"
                );
                Universe::empty()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
