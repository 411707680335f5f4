//! TWSE ISIN listing provider.
//!
//! Scrapes the exchange's public ISIN listing pages for listed (TWSE) and
//! OTC (TPEx) securities. Each table row carries "code　name" joined by a
//! full-width space; only 4-character codes are ordinary shares.
//!
//! One page failing is tolerated (the other market still screens); both
//! failing is a provider failure the engine degrades from.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::warn;

use super::{Symbol, Universe, UniverseProvider};
use crate::data::ProviderError;

// ============================================================================
// Constants
// ============================================================================

/// Listing pages: (URL, exchange suffix). strMode=2 is the main board,
/// strMode=4 is OTC.
const LISTING_PAGES: &[(&str, &str)] = &[
    ("https://isin.twse.com.tw/isin/C_public.jsp?strMode=2", ".TW"),
    ("https://isin.twse.com.tw/isin/C_public.jsp?strMode=4", ".TWO"),
];

/// Per-request timeout
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Security cells look like `>2330　台積電<`; the separator is the
/// full-width space U+3000.
fn row_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r">([0-9A-Za-z]{4})\u{3000}([^<\u{3000}]+)<").unwrap())
}

// ============================================================================
// Provider
// ============================================================================

/// Universe provider backed by the TWSE ISIN listing pages.
pub struct TwseIsinProvider {
    client: reqwest::Client,
}

impl Default for TwseIsinProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TwseIsinProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }

    async fn fetch_page(&self, url: &str, suffix: &str) -> Result<Vec<Symbol>, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "listing page returned status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(parse_listing_page(&body, suffix))
    }
}

/// Extract "code　name" security rows from one listing page.
fn parse_listing_page(body: &str, suffix: &str) -> Vec<Symbol> {
    row_pattern()
        .captures_iter(body)
        .map(|caps| {
            Symbol::new(
                format!("{}{}", &caps[1], suffix),
                caps[2].trim().to_string(),
            )
        })
        .collect()
}

#[async_trait]
impl UniverseProvider for TwseIsinProvider {
    fn name(&self) -> &'static str {
        "twse-isin"
    }

    async fn fetch(&self) -> Result<Universe, ProviderError> {
        let mut symbols = Vec::new();
        let mut last_error = None;

        for (url, suffix) in LISTING_PAGES {
            match self.fetch_page(url, suffix).await {
                Ok(mut page_symbols) => symbols.append(&mut page_symbols),
                Err(e) => {
                    warn!(url, error = %e, "Failed to fetch listing page");
                    last_error = Some(e);
                }
            }
        }

        if symbols.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                ProviderError::Unavailable("listing pages returned no securities".to_string())
            }));
        }

        Ok(Universe::new(symbols))
    }
}

// ============================================================================
// Tests
// ============================================================================
