//! Error taxonomy for the scan pipeline.
//!
//! Per-symbol and per-batch errors are recovered locally by the scan engine
//! and converted into statistics; the only error that aborts a scan is an
//! invalid configuration, rejected before any network access.

use thiserror::Error;

/// Errors produced by the scan pipeline.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// The symbol universe provider failed. Degraded to an empty universe
    /// with a warning, never fatal.
    #[error("universe unavailable: {0}")]
    UniverseUnavailable(String),

    /// A whole-batch OHLCV fetch failed. The batch is skipped and every
    /// symbol in it is counted as failed.
    #[error("batch fetch failed: {0}")]
    BatchFetch(String),

    /// A price series is shorter than the longest-window indicator needs.
    #[error("insufficient history: have {have} bars, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    /// An indicator could not be computed (e.g. zero-range stochastic
    /// window). The symbol is skipped, never silently zeroed.
    #[error("computation error: {0}")]
    Computation(String),

    /// The scan configuration is invalid. Fatal at scan start.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ScanError {
    /// Whether the error counts against the `fail` statistic rather than
    /// aborting the scan.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidConfiguration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(ScanError::UniverseUnavailable("timeout".into()).is_recoverable());
        assert!(ScanError::BatchFetch("http 500".into()).is_recoverable());
        assert!(ScanError::InsufficientHistory { have: 20, need: 35 }.is_recoverable());
        assert!(ScanError::Computation("zero range".into()).is_recoverable());
        assert!(!ScanError::InvalidConfiguration("batch_size = 0".into()).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = ScanError::InsufficientHistory { have: 20, need: 35 };
        assert!(err.to_string().contains("20 bars"));
        assert!(err.to_string().contains("need 35"));
    }
}
