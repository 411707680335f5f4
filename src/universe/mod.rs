//! Symbol universe: the set of tradable instruments for one scan.
//!
//! The universe is supplied by an external provider and cached process-wide
//! for 24 hours. Provider failure degrades to an empty universe with a
//! warning rather than aborting a scan.

mod cache;
mod twse;

pub use cache::UniverseCache;
pub use twse::TwseIsinProvider;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data::ProviderError;

// ============================================================================
// Symbol
// ============================================================================

/// One tradable instrument. Unique by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Full code with exchange suffix (e.g., "2330.TW")
    pub code: String,
    /// Display name (e.g., "台積電")
    pub name: String,
}

impl Symbol {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Universe
// ============================================================================

/// Deduplicated, code-sorted set of symbols with a code→name index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Universe {
    symbols: Vec<Symbol>,
}

impl Universe {
    /// Build a universe: symbols are deduplicated by code (first entry wins)
    /// and sorted by code ascending.
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by(|a, b| a.code.cmp(&b.code));
        symbols.dedup_by(|a, b| a.code == b.code);
        Self { symbols }
    }

    /// Empty fallback universe for degraded provider conditions.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn codes(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.code.clone()).collect()
    }

    /// Code → display-name mapping.
    pub fn name_index(&self) -> HashMap<&str, &str> {
        self.symbols
            .iter()
            .map(|s| (s.code.as_str(), s.name.as_str()))
            .collect()
    }
}

// ============================================================================
// Universe Provider Trait
// ============================================================================

/// Trait for symbol universe providers.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    /// Provider name for logs (e.g., "twse-isin")
    fn name(&self) -> &'static str;

    /// Fetch the full tradable universe.
    async fn fetch(&self) -> Result<Universe, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
