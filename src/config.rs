//! Configuration for the scanner.
//!
//! All thresholds and toggles are external input: they are loaded once,
//! validated, and passed into the scan engine as immutable values. Nothing
//! in the pipeline reads ambient state.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

// ============================================================================
// Application Configuration
// ============================================================================

/// Top-level configuration loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scan pipeline configuration
    #[serde(default)]
    pub scan: ScanConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// missing sections.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Scan Configuration
// ============================================================================

/// Configuration for one scan. Immutable for the scan's duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Filter thresholds and toggles
    #[serde(default)]
    pub filters: FilterConfig,

    /// ATR multiplier for the volatility-based stop loss
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: f64,

    /// Symbols per OHLCV fetch request. Bounds request size and isolates
    /// fetch failures; not a concurrency knob.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Trailing window of daily bars requested per symbol
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Maximum number of ranked candidates to keep
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Courtesy pause between batch fetches, in milliseconds (0 disables)
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            filters: FilterConfig::default(),
            atr_multiplier: default_atr_multiplier(),
            batch_size: default_batch_size(),
            window_days: default_window_days(),
            top_n: default_top_n(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

impl ScanConfig {
    /// Validate the configuration. Called by the engine before any network
    /// access; an error here is fatal for the scan.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.batch_size == 0 {
            return Err(ScanError::InvalidConfiguration(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(ScanError::InvalidConfiguration(
                "top_n must be at least 1".to_string(),
            ));
        }
        if (self.window_days as usize) < crate::indicators::MIN_HISTORY {
            return Err(ScanError::InvalidConfiguration(format!(
                "window_days {} is below the minimum history of {} bars",
                self.window_days,
                crate::indicators::MIN_HISTORY
            )));
        }
        if !self.atr_multiplier.is_finite() || self.atr_multiplier <= 0.0 {
            return Err(ScanError::InvalidConfiguration(
                "atr_multiplier must be positive".to_string(),
            ));
        }
        self.filters.validate()
    }

    /// One-line summary for reports and logs.
    pub fn summary(&self) -> String {
        let f = &self.filters;
        format!(
            "漲幅>{:.1}% 量比>{:.1} 5日均量>{:.0}張 乖離<{:.1}% K<{} VCP<{:.2}",
            f.min_change_pct,
            f.min_volume_ratio,
            f.min_avg_volume_lots,
            f.max_bias_pct,
            f.max_k,
            f.max_vcp_ratio
        )
    }
}

fn default_atr_multiplier() -> f64 {
    2.0
}

fn default_batch_size() -> usize {
    50
}

fn default_window_days() -> u32 {
    60
}

fn default_top_n() -> usize {
    10
}

fn default_batch_pause_ms() -> u64 {
    500
}

// ============================================================================
// Filter Configuration
// ============================================================================

/// Thresholds and toggles for the seven-stage filter cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum daily change (%) for the momentum stage
    #[serde(default = "default_min_change_pct")]
    pub min_change_pct: f64,

    /// Require the session to close above its open
    #[serde(default = "default_true")]
    pub require_red_candle: bool,

    /// Require the close at or above the 5-day moving average
    #[serde(default = "default_true")]
    pub require_above_sma5: bool,

    /// Require the close at or above the 20-day moving average
    #[serde(default = "default_true")]
    pub require_above_sma20: bool,

    /// Maximum deviation (%) above the 20-day moving average
    #[serde(default = "default_max_bias_pct")]
    pub max_bias_pct: f64,

    /// Minimum 5-day average volume, in lots of 1000 shares
    #[serde(default = "default_min_avg_volume_lots")]
    pub min_avg_volume_lots: f64,

    /// Minimum ratio of today's volume to the 5-day average volume
    #[serde(default = "default_min_volume_ratio")]
    pub min_volume_ratio: f64,

    /// Maximum volatility contraction ratio (ATR / 20-day ATR average)
    #[serde(default = "default_max_vcp_ratio")]
    pub max_vcp_ratio: f64,

    /// Maximum stochastic %K value (0-100)
    #[serde(default = "default_max_k")]
    pub max_k: u8,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_change_pct: default_min_change_pct(),
            require_red_candle: true,
            require_above_sma5: true,
            require_above_sma20: true,
            max_bias_pct: default_max_bias_pct(),
            min_avg_volume_lots: default_min_avg_volume_lots(),
            min_volume_ratio: default_min_volume_ratio(),
            max_vcp_ratio: default_max_vcp_ratio(),
            max_k: default_max_k(),
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.max_k > 100 {
            return Err(ScanError::InvalidConfiguration(format!(
                "max_k {} is outside 0-100",
                self.max_k
            )));
        }
        if self.min_volume_ratio < 0.0 || !self.min_volume_ratio.is_finite() {
            return Err(ScanError::InvalidConfiguration(
                "min_volume_ratio must be non-negative".to_string(),
            ));
        }
        if self.min_avg_volume_lots < 0.0 || !self.min_avg_volume_lots.is_finite() {
            return Err(ScanError::InvalidConfiguration(
                "min_avg_volume_lots must be non-negative".to_string(),
            ));
        }
        if self.max_vcp_ratio <= 0.0 || !self.max_vcp_ratio.is_finite() {
            return Err(ScanError::InvalidConfiguration(
                "max_vcp_ratio must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_min_change_pct() -> f64 {
    2.0
}

fn default_max_bias_pct() -> f64 {
    8.0
}

fn default_min_avg_volume_lots() -> f64 {
    3000.0
}

fn default_min_volume_ratio() -> f64 {
    1.5
}

fn default_max_vcp_ratio() -> f64 {
    1.0
}

fn default_max_k() -> u8 {
    80
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Output configuration for scan results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Discord webhook URL for the textual battle report (optional)
    #[serde(default)]
    pub discord_webhook_url: Option<String>,

    /// Webhook send retries
    #[serde(default = "default_retry_count")]
    pub webhook_retry_count: u32,

    /// Whether to save local report files
    #[serde(default = "default_true")]
    pub local_report_enabled: bool,

    /// Directory for local reports
    #[serde(default = "default_report_dir")]
    pub report_dir: String,

    /// Report formats to generate
    #[serde(default = "default_report_formats")]
    pub report_formats: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            webhook_retry_count: default_retry_count(),
            local_report_enabled: true,
            report_dir: default_report_dir(),
            report_formats: default_report_formats(),
        }
    }
}

fn default_retry_count() -> u32 {
    3
}

fn default_report_dir() -> String {
    "~/.breakout-scanner/reports".to_string()
}

fn default_report_formats() -> Vec<String> {
    vec!["markdown".to_string(), "json".to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScanConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.window_days, 60);
        assert_eq!(config.top_n, 10);
        assert!((config.filters.min_change_pct - 2.0).abs() < 1e-9);
        assert!((config.filters.min_volume_ratio - 1.5).abs() < 1e-9);
        assert!((config.filters.min_avg_volume_lots - 3000.0).abs() < 1e-9);
        assert_eq!(config.filters.max_k, 80);
        assert!(config.filters.require_red_candle);
        assert!(config.filters.require_above_sma5);
        assert!(config.filters.require_above_sma20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = ScanConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScanError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_short_window() {
        let config = ScanConfig {
            window_days: 20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_max_k() {
        let mut config = ScanConfig::default();
        config.filters.max_k = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_atr_multiplier() {
        let config = ScanConfig {
            atr_multiplier: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("filters"));
        assert!(json.contains("batch_size"));

        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.scan.batch_size, config.scan.batch_size);
        assert_eq!(parsed.scan.filters.max_k, config.scan.filters.max_k);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"scan": {"filters": {"min_change_pct": 3.5}}}"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert!((parsed.scan.filters.min_change_pct - 3.5).abs() < 1e-9);
        assert_eq!(parsed.scan.filters.max_k, 80);
        assert_eq!(parsed.scan.batch_size, 50);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"scan": {"top_n": 5}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.scan.top_n, 5);
    }

    #[test]
    fn test_summary_mentions_thresholds() {
        let config = ScanConfig::default();
        let summary = config.summary();
        assert!(summary.contains("2.0%"));
        assert!(summary.contains("K<80"));
    }
}
