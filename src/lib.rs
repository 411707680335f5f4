//! Breakout scanner for Taiwan-listed stocks.
//!
//! Scans the TWSE/TPEx universe for volume-backed breakout setups: a
//! daily-bar indicator engine feeds a fixed seven-stage filter cascade,
//! survivors are scored and ranked, and the top candidates are written out
//! as reports and pushed to a Discord webhook.
//!
//! ## Architecture
//!
//! ```text
//! universe (TWSE ISIN pages, cached)
//!     │
//!     ▼
//! scan engine ──batches──▶ data (Yahoo chart API)
//!     │                        │
//!     │                        ▼
//!     │                   indicators (SMA, bias, KD, ATR, VCP)
//!     │                        │
//!     │                        ▼
//!     │                   cascade (7 stages, first failure wins)
//!     │                        │
//!     ▼                        ▼
//! stats ◀──rejections──── score + risk levels
//!     │
//!     ▼
//! report (Markdown / JSON / webhook) ──▶ notification (Discord)
//! ```
//!
//! A scan never aborts on per-symbol or per-batch failures; everything
//! short of an invalid configuration is folded into the statistics record.

pub mod cascade;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod logging;
pub mod notification;
pub mod report;
pub mod scan;
pub mod score;
pub mod universe;

pub use config::AppConfig;
pub use error::ScanError;
pub use scan::{Candidate, ScanEngine, ScanResult, ScanStats};
